use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aliases::{AWAY_TEAM, AliasMap, HOME_TEAM, TeamNames};
use crate::csv_table::{Cell, ColumnType, ParseOptions, Table};
use crate::error::OddsError;
use crate::predict::PredictionResult;
use crate::probability::{Outcome, Prob3};

// football-data.co.uk column prefixes for individual books.
const FOOTBALL_DATA_BOOKS: [(&str, &str); 6] = [
    ("B365", "Bet365"),
    ("BW", "Bet&Win"),
    ("IW", "Interwetten"),
    ("PS", "Pinnacle"),
    ("WH", "William Hill"),
    ("VC", "VC Bet"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub outcome: Outcome,
    pub decimal_odds: f64,
}

impl OddsQuote {
    pub fn new(outcome: Outcome, decimal_odds: f64) -> Self {
        Self {
            outcome,
            decimal_odds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueBetSignal {
    pub outcome: Outcome,
    pub decimal_odds: f64,
    pub implied_probability: f64,
    pub model_probability: f64,
    pub expected_value: f64,
    pub is_positive_ev: bool,
    /// Model probability minus implied probability.
    pub edge: f64,
    /// Odds with the bookmaker margin removed.
    pub fair_odds: f64,
    /// Fraction of bankroll to stake, already scaled by the configured Kelly fraction.
    pub kelly_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Fractional Kelly multiplier in [0, 1].
    pub kelly_fraction: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginBand {
    Low,
    Moderate,
    High,
}

impl MarginBand {
    pub fn from_overround(overround: f64) -> Self {
        let pct = overround * 100.0;
        if pct < 2.0 {
            MarginBand::Low
        } else if pct <= 5.0 {
            MarginBand::Moderate
        } else {
            MarginBand::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsAnalysis {
    /// Home, draw, away.
    pub signals: [ValueBetSignal; 3],
    pub overround: f64,
    pub margin_band: MarginBand,
    pub no_vig: Prob3,
}

impl OddsAnalysis {
    pub fn signal(&self, outcome: Outcome) -> &ValueBetSignal {
        match outcome {
            Outcome::Home => &self.signals[0],
            Outcome::Draw => &self.signals[1],
            Outcome::Away => &self.signals[2],
        }
    }

    /// Positive-EV signals, best expected value first.
    pub fn value_bets(&self) -> Vec<&ValueBetSignal> {
        let mut out: Vec<&ValueBetSignal> =
            self.signals.iter().filter(|s| s.is_positive_ev).collect();
        out.sort_by(|a, b| {
            b.expected_value
                .partial_cmp(&a.expected_value)
                .unwrap_or(Ordering::Equal)
        });
        out
    }
}

pub fn analyze(
    prediction: &PredictionResult,
    quotes: &[OddsQuote],
    cfg: &AnalyzerConfig,
) -> Result<OddsAnalysis, OddsError> {
    let mut latest: [Option<f64>; 3] = [None; 3];
    for quote in quotes {
        if !quote.decimal_odds.is_finite() || quote.decimal_odds <= 1.0 {
            return Err(OddsError::InvalidOdds {
                outcome: quote.outcome,
                odds: quote.decimal_odds,
            });
        }
        let slot = &mut latest[slot_of(quote.outcome)];
        if slot.is_some() {
            debug!(outcome = quote.outcome.label(), "later quote replaces earlier one");
        }
        *slot = Some(quote.decimal_odds);
    }

    let mut odds = [0.0; 3];
    for outcome in Outcome::ALL {
        odds[slot_of(outcome)] =
            latest[slot_of(outcome)].ok_or(OddsError::MissingOutcome { outcome })?;
    }

    let implied = odds.map(|o| 1.0 / o);
    let book: f64 = implied.iter().sum();
    let overround = book - 1.0;
    let no_vig = Prob3 {
        home: implied[0] / book,
        draw: implied[1] / book,
        away: implied[2] / book,
    };

    let signals = Outcome::ALL.map(|outcome| {
        let i = slot_of(outcome);
        let p = prediction.probability(outcome);
        let expected_value = p * odds[i] - 1.0;
        ValueBetSignal {
            outcome,
            decimal_odds: odds[i],
            implied_probability: implied[i],
            model_probability: p,
            expected_value,
            is_positive_ev: expected_value > 0.0,
            edge: p - implied[i],
            fair_odds: 1.0 / no_vig.get(outcome),
            kelly_fraction: kelly_stake(p, odds[i], cfg.kelly_fraction),
        }
    });

    let margin_band = MarginBand::from_overround(overround);
    debug!(overround, ?margin_band, "analyzed odds");
    Ok(OddsAnalysis {
        signals,
        overround,
        margin_band,
        no_vig,
    })
}

/// Fractional Kelly stake for decimal odds: `f* = (b·p − q) / b` with `b = odds − 1`.
/// Zero when there is no edge.
pub fn kelly_stake(win_prob: f64, decimal_odds: f64, kelly_fraction: f64) -> f64 {
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
        return 0.0;
    }
    let b = decimal_odds - 1.0;
    let p = win_prob;
    let q = 1.0 - p;
    let f = (b * p - q) / b;
    if f <= 0.0 {
        return 0.0;
    }
    (f * kelly_fraction.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

/// Reads decimal ("2.10") or American ("+150", "-200") odds as decimal odds.
pub fn parse_odds(raw: &str) -> Option<f64> {
    let t = raw.trim();
    let decimal = if let Some(rest) = t.strip_prefix('+') {
        let n = rest.parse::<f64>().ok().filter(|n| *n >= 100.0)?;
        n / 100.0 + 1.0
    } else if let Some(rest) = t.strip_prefix('-') {
        let n = rest.parse::<f64>().ok().filter(|n| *n >= 100.0)?;
        100.0 / n + 1.0
    } else {
        t.parse::<f64>().ok()?
    };
    (decimal.is_finite() && decimal > 1.0).then_some(decimal)
}

pub fn format_american(decimal_odds: f64) -> String {
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
        return "N/A".to_string();
    }
    if decimal_odds >= 2.0 {
        format!("+{:.0}", (decimal_odds - 1.0) * 100.0)
    } else {
        format!("-{:.0}", 100.0 / (decimal_odds - 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerLine {
    pub bookmaker: String,
    pub outcome: Outcome,
    pub decimal_odds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pricing {
    #[default]
    Best,
    Average,
    Median,
}

/// One quote per outcome from many books. Outcomes nobody prices are left out.
pub fn consensus_quotes(lines: &[BookmakerLine], pricing: Pricing) -> Vec<OddsQuote> {
    let mut out = Vec::with_capacity(3);
    for outcome in Outcome::ALL {
        let prices: Vec<f64> = lines
            .iter()
            .filter(|l| l.outcome == outcome && l.decimal_odds.is_finite() && l.decimal_odds > 1.0)
            .map(|l| l.decimal_odds)
            .collect();
        let price = match pricing {
            Pricing::Best => prices.iter().copied().reduce(f64::max),
            Pricing::Average => {
                (!prices.is_empty()).then(|| prices.iter().sum::<f64>() / prices.len() as f64)
            }
            Pricing::Median => median_f64(&prices),
        };
        if let Some(price) = price {
            out.push(OddsQuote::new(outcome, price));
        }
    }
    out
}

/// Parse options for odds exports. Prices stay text so American odds keep their sign.
pub fn odds_parse_options() -> ParseOptions {
    ParseOptions::default().declare("price", ColumnType::Text)
}

/// Bookmaker lines for one fixture. Understands long-format odds exports
/// (`Bookmaker, home_team, away_team, label, price`) and football-data
/// season files with per-book `H/D/A` columns.
pub fn quotes_from_table(table: &Table, home: &str, away: &str) -> Vec<BookmakerLine> {
    let long = ["bookmaker", "home_team", "away_team", "label", "price"]
        .map(|c| table.column_index(c));
    if let [Some(book), Some(h), Some(a), Some(label), Some(price)] = long {
        return long_format_lines(table, [book, h, a, label, price], home, away);
    }
    wide_format_lines(table, home, away)
}

fn long_format_lines(table: &Table, cols: [usize; 5], home: &str, away: &str) -> Vec<BookmakerLine> {
    let names = TeamNames::default_football();
    let [book, h, a, label, price] = cols;
    let mut out = Vec::new();
    for row in table.rows() {
        let cells = row.cells();
        if !names.same_team(&cells[h].to_string(), home)
            || !names.same_team(&cells[a].to_string(), away)
        {
            continue;
        }
        let label_text = cells[label].to_string();
        let outcome = if is_draw_label(&label_text) {
            Outcome::Draw
        } else if names.same_team(&label_text, home) {
            Outcome::Home
        } else if names.same_team(&label_text, away) {
            Outcome::Away
        } else {
            warn!(line = row.index(), label = %label_text, "unrecognised odds label");
            continue;
        };
        let Some(decimal_odds) = cell_odds(&cells[price]) else {
            warn!(line = row.index(), price = %cells[price], "unreadable odds price");
            continue;
        };
        out.push(BookmakerLine {
            bookmaker: cells[book].to_string(),
            outcome,
            decimal_odds,
        });
    }
    out
}

fn wide_format_lines(table: &Table, home: &str, away: &str) -> Vec<BookmakerLine> {
    let aliases = AliasMap::default_football();
    let team_col = |want: &str| {
        table.columns().iter().position(|c| {
            aliases
                .canonical_name(&c.name)
                .is_ok_and(|n| n.eq_ignore_ascii_case(want))
        })
    };
    let (Some(h), Some(a)) = (team_col(HOME_TEAM), team_col(AWAY_TEAM)) else {
        debug!("odds table has neither long-format nor team columns");
        return Vec::new();
    };

    let names = TeamNames::default_football();
    // Latest row for the fixture wins.
    let Some(row) = table.rows().rev().find(|r| {
        names.same_team(&r.cells()[h].to_string(), home)
            && names.same_team(&r.cells()[a].to_string(), away)
    }) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (prefix, bookmaker) in FOOTBALL_DATA_BOOKS {
        for (suffix, outcome) in [("H", Outcome::Home), ("D", Outcome::Draw), ("A", Outcome::Away)] {
            let Some(cell) = row.get(&format!("{prefix}{suffix}")) else {
                continue;
            };
            if let Some(decimal_odds) = cell_odds(cell) {
                out.push(BookmakerLine {
                    bookmaker: bookmaker.to_string(),
                    outcome,
                    decimal_odds,
                });
            }
        }
    }
    out
}

fn cell_odds(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Text(s) => parse_odds(s),
        other => other.as_f64().filter(|v| v.is_finite() && *v > 1.0),
    }
}

fn is_draw_label(label: &str) -> bool {
    let n = label.trim().to_ascii_lowercase();
    n == "draw" || n == "tie" || n == "x"
}

fn slot_of(outcome: Outcome) -> usize {
    match outcome {
        Outcome::Home => 0,
        Outcome::Draw => 1,
        Outcome::Away => 2,
    }
}

fn median_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
