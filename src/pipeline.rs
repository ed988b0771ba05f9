use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aliases::{AWAY_TEAM, AliasMap, HOME_TEAM, header_key};
use crate::csv_table::{Cell, Table};
use crate::error::{PipelineError, StatsError};
use crate::odds::{AnalyzerConfig, OddsAnalysis, OddsQuote, analyze};
use crate::predict::{PredictionResult, predict};
use crate::profile::ModelProfile;
use crate::team_stats::{FormConfig, TeamStats, aggregate, league_averages};

/// Everything one prediction run needs. Owned by the caller, never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub home: String,
    pub away: String,
    pub quotes: Option<Vec<OddsQuote>>,
    pub profile: ModelProfile,
    pub form: FormConfig,
    pub analyzer: AnalyzerConfig,
}

impl MatchRequest {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
            quotes: None,
            profile: ModelProfile::default(),
            form: FormConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }

    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_quotes(mut self, quotes: Vec<OddsQuote>) -> Self {
        self.quotes = Some(quotes);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub home: TeamStats,
    pub away: TeamStats,
    pub prediction: PredictionResult,
    pub odds: Option<OddsAnalysis>,
}

/// Aggregate both teams, predict, then price the quotes if any were given.
pub fn run(table: &Table, req: &MatchRequest) -> Result<MatchReport, PipelineError> {
    let home = aggregate(table, &req.home, &req.form)?;
    let away = aggregate(table, &req.away, &req.form)?;

    let profile = if req.profile.calibrate_from_table {
        let averages = league_averages(table)?;
        req.profile.clone().with_league_goals(&averages)
    } else {
        req.profile.clone()
    };

    let prediction = predict(&home, &away, &profile)?;
    let odds = req
        .quotes
        .as_deref()
        .map(|quotes| analyze(&prediction, quotes, &req.analyzer))
        .transpose()?;

    info!(
        home = %home.team,
        away = %away.team,
        profile = %prediction.profile,
        p_home = prediction.home,
        p_draw = prediction.draw,
        p_away = prediction.away,
        value_bets = odds.as_ref().map_or(0, |o| o.value_bets().len()),
        "match report ready"
    );
    Ok(MatchReport {
        home,
        away,
        prediction,
        odds,
    })
}

/// One upcoming match from a fixture list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Lowercased with whitespace removed, e.g. `premierleague`.
    pub league: Option<String>,
    pub home: String,
    pub away: String,
}

#[derive(Debug)]
pub struct FixtureReport {
    pub fixture: Fixture,
    pub result: Result<MatchReport, PipelineError>,
}

const LEAGUE_HEADERS: [&str; 3] = ["league", "div", "competition"];

/// Reads fixtures from a `league,home,away` table. Team headers go through
/// the football aliases, so `HomeTeam`/`AwayTeam` files work too. Rows with
/// an empty field are skipped.
pub fn fixtures_from_table(table: &Table) -> Result<Vec<Fixture>, StatsError> {
    let aliases = AliasMap::default_football();
    let (mut home_col, mut away_col, mut league_col) = (None, None, None);
    for (idx, column) in table.columns().iter().enumerate() {
        let name = header_key(&aliases.canonical_name(&column.name)?);
        if name == header_key(HOME_TEAM) {
            home_col.get_or_insert(idx);
        } else if name == header_key(AWAY_TEAM) {
            away_col.get_or_insert(idx);
        } else if LEAGUE_HEADERS.contains(&name.as_str()) {
            league_col.get_or_insert(idx);
        }
    }
    let home_col = home_col.ok_or(StatsError::MissingColumn(HOME_TEAM))?;
    let away_col = away_col.ok_or(StatsError::MissingColumn(AWAY_TEAM))?;

    let mut out = Vec::new();
    for row in table.rows() {
        let cells = row.cells();
        let league = league_col.map(|i| normalize_league(&cells[i]));
        let (Some(home), Some(away)) = (team_cell(&cells[home_col]), team_cell(&cells[away_col])) else {
            debug!(row = row.index(), "skipping fixture without both teams");
            continue;
        };
        if league.as_ref().is_some_and(|l| l.is_empty()) {
            debug!(row = row.index(), "skipping fixture without a league");
            continue;
        }
        out.push(Fixture {
            league,
            home,
            away,
        });
    }
    Ok(out)
}

fn team_cell(cell: &Cell) -> Option<String> {
    let text = cell.to_string();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn normalize_league(cell: &Cell) -> String {
    cell.to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Runs `template` once per fixture with the teams swapped in. Quotes on the
/// template are dropped since they price a single match. A failing fixture is
/// logged and reported; the rest of the batch still runs.
pub fn run_fixtures(
    table: &Table,
    fixtures: &[Fixture],
    template: &MatchRequest,
) -> Vec<FixtureReport> {
    let reports: Vec<FixtureReport> = fixtures
        .par_iter()
        .map(|fixture| {
            let req = MatchRequest {
                home: fixture.home.clone(),
                away: fixture.away.clone(),
                quotes: None,
                ..template.clone()
            };
            let result = run(table, &req);
            if let Err(err) = &result {
                warn!(home = %fixture.home, away = %fixture.away, %err, "fixture skipped");
            }
            FixtureReport {
                fixture: fixture.clone(),
                result,
            }
        })
        .collect();

    info!(
        fixtures = reports.len(),
        failed = reports.iter().filter(|r| r.result.is_err()).count(),
        "fixture batch done"
    );
    reports
}
