use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use matchday_edge::combine::{CombineOptions, combine};
use matchday_edge::csv_table::{ParseOptions, Table, detect_delimiter, parse};
use matchday_edge::odds::{
    Pricing, consensus_quotes, format_american, odds_parse_options, quotes_from_table,
};
use matchday_edge::pipeline::{MatchReport, MatchRequest, fixtures_from_table, run, run_fixtures};
use matchday_edge::probability::Outcome;
use matchday_edge::profile::ProfileConfig;

const USAGE: &str = "usage: match_report <season.csv>... (--home <team> --away <team> | --fixtures <fixtures.csv>) [--odds <odds.csv>] [--pricing best|average|median]";

enum Target {
    Match { home: String, away: String },
    Fixtures(PathBuf),
}

struct Args {
    seasons: Vec<PathBuf>,
    target: Target,
    odds: Option<PathBuf>,
    pricing: Pricing,
}

fn parse_args() -> Result<Args> {
    let mut seasons = Vec::new();
    let mut home = None;
    let mut away = None;
    let mut odds = None;
    let mut fixtures = None;
    let mut pricing = Pricing::Best;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--home" => home = it.next(),
            "--away" => away = it.next(),
            "--odds" => odds = it.next().map(PathBuf::from),
            "--fixtures" => fixtures = it.next().map(PathBuf::from),
            "--pricing" => {
                pricing = match it.next().as_deref() {
                    Some("best") => Pricing::Best,
                    Some("average") => Pricing::Average,
                    Some("median") => Pricing::Median,
                    other => bail!("unknown pricing {other:?} (best, average, median)"),
                }
            }
            _ => seasons.push(PathBuf::from(arg)),
        }
    }

    let target = match (fixtures, home, away) {
        (Some(path), None, None) => Target::Fixtures(path),
        (None, Some(home), Some(away)) => Target::Match { home, away },
        _ => bail!(USAGE),
    };
    if seasons.is_empty() {
        bail!("at least one season csv is required");
    }
    Ok(Args {
        seasons,
        target,
        odds,
        pricing,
    })
}

fn load_table(path: &Path, opts: ParseOptions) -> Result<Table> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let opts = opts.with_delimiter(detect_delimiter(&raw));
    let parsed = parse(&raw, &opts);
    for skipped in &parsed.skipped {
        warn!(file = %path.display(), %skipped, "skipped line");
    }
    info!(file = %path.display(), rows = parsed.table.len(), "loaded csv");
    Ok(parsed.table)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let profile = ProfileConfig::from_env().resolve()?;

    let tables = args
        .seasons
        .iter()
        .map(|path| load_table(path, ParseOptions::default()))
        .collect::<Result<Vec<_>>>()?;
    let merged = combine(&tables, &CombineOptions::default())?;
    info!(
        rows = merged.table.len(),
        duplicates = merged.duplicates_dropped,
        "combined seasons"
    );

    let (home, away) = match &args.target {
        Target::Match { home, away } => (home, away),
        Target::Fixtures(path) => {
            if args.odds.is_some() {
                warn!("--odds is ignored in fixtures mode");
            }
            let fixtures = fixtures_from_table(&load_table(path, ParseOptions::default())?)?;
            let template = MatchRequest::new("", "").with_profile(profile);
            for report in run_fixtures(&merged.table, &fixtures, &template) {
                let league = report.fixture.league.as_deref().unwrap_or("-");
                match &report.result {
                    Ok(r) => print_report(r),
                    Err(err) => println!(
                        "{} vs {} ({league}): skipped, {err}",
                        report.fixture.home, report.fixture.away
                    ),
                }
            }
            return Ok(());
        }
    };

    let mut request = MatchRequest::new(home, away).with_profile(profile);
    if let Some(path) = &args.odds {
        let odds_table = load_table(path, odds_parse_options())?;
        let lines = quotes_from_table(&odds_table, home, away);
        request = request.with_quotes(consensus_quotes(&lines, args.pricing));
    }

    let report = run(&merged.table, &request)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &MatchReport) {
    let p = &report.prediction;
    let pct = p.percentages();

    println!("{} vs {} ({} profile)", report.home.team, report.away.team, p.profile);
    for stats in [&report.home, &report.away] {
        println!(
            "  {:<24} P{:>3} W{:>3} D{:>3} L{:>3} GF{:>4} GA{:>4} Pts{:>4} form {:.2}",
            stats.team,
            stats.matches_played,
            stats.wins,
            stats.draws,
            stats.losses,
            stats.goals_for,
            stats.goals_against,
            stats.points,
            stats.recent_form,
        );
    }
    println!(
        "  home {:.1}%  draw {:.1}%  away {:.1}%  xG {:.2}-{:.2}  confidence {:?}",
        pct.home, pct.draw, pct.away, p.expected_goals.0, p.expected_goals.1, p.confidence()
    );

    if let Some(odds) = &report.odds {
        println!(
            "  overround {:.2}% ({:?} margin)",
            odds.overround * 100.0,
            odds.margin_band
        );
        for outcome in Outcome::ALL {
            let s = odds.signal(outcome);
            println!(
                "  {:<5} {:>6.2} ({:>5})  model {:.3}  implied {:.3}  EV {:+.3}  kelly {:.3}{}",
                outcome.label(),
                s.decimal_odds,
                format_american(s.decimal_odds),
                s.model_probability,
                s.implied_probability,
                s.expected_value,
                s.kelly_fraction,
                if s.is_positive_ev { "  VALUE" } else { "" }
            );
        }
    }
}
