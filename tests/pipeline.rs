use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use matchday_edge::combine::{CombineOptions, combine};
use matchday_edge::csv_table::{ParseOptions, Table, detect_delimiter, parse, parse_csv};
use matchday_edge::error::{PipelineError, PredictError, StatsError};
use matchday_edge::odds::{MarginBand, Pricing, consensus_quotes, odds_parse_options, quotes_from_table};
use matchday_edge::pipeline::{MatchRequest, fixtures_from_table, run, run_fixtures};
use matchday_edge::probability::Outcome;
use matchday_edge::profile::ModelProfile;
use matchday_edge::team_stats::{FormConfig, aggregate_all};

fn load_fixture(name: &str, opts: ParseOptions) -> Table {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    let opts = opts.with_delimiter(detect_delimiter(&raw));
    parse(&raw, &opts).table
}

fn combined_seasons() -> Table {
    let a = load_fixture("season_2023.csv", ParseOptions::default());
    let b = load_fixture("season_2024.csv", ParseOptions::default());
    combine(&[a, b], &CombineOptions::default())
        .expect("fixtures combine")
        .table
}

#[test]
fn report_for_both_profiles() {
    let table = combined_seasons();
    for profile in [ModelProfile::strength(), ModelProfile::poisson()] {
        let req = MatchRequest::new("Arsenal", "Chelsea").with_profile(profile.clone());
        let report = run(&table, &req).expect("report");

        assert_eq!(report.home.matches_played, 5);
        assert_eq!(report.home.points, 11);
        assert_eq!(report.away.points, 2);
        assert_eq!((report.away.goals_for, report.away.goals_against), (4, 8));

        let p = &report.prediction;
        assert_relative_eq!(p.home + p.draw + p.away, 1.0, epsilon = 1e-6);
        assert!(p.home > p.away, "{}: {p:?}", profile.name);
        assert_eq!(p.profile, profile.name);
        assert!(report.odds.is_none());
    }
}

#[test]
fn identical_requests_give_identical_reports() {
    let table = combined_seasons();
    let req = MatchRequest::new("Liverpool", "Man Utd").with_profile(ModelProfile::poisson());
    let first = run(&table, &req).unwrap();
    let second = run(&table, &req).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.away.team, "Manchester United");
}

#[test]
fn unknown_team_has_insufficient_data() {
    let table = combined_seasons();
    let err = run(&table, &MatchRequest::new("Arsenal", "Everton")).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Predict(PredictError::InsufficientData { ref team }) if team == "Everton"
    ));
}

#[test]
fn name_variants_of_one_club_are_the_same_team() {
    let table = combined_seasons();
    let err = run(&table, &MatchRequest::new("Man Utd", "Manchester United")).unwrap_err();
    assert!(matches!(err, PipelineError::Predict(PredictError::SameTeam(_))));
}

#[test]
fn table_without_scores_is_a_stats_error() {
    let table = parse_csv("Date,HomeTeam,AwayTeam\n2024-08-17,Arsenal,Chelsea\n").table;
    let err = run(&table, &MatchRequest::new("Arsenal", "Chelsea")).unwrap_err();
    assert!(matches!(err, PipelineError::Stats(StatsError::MissingColumn(_))));
}

#[test]
fn report_prices_bookmaker_odds() {
    let table = combined_seasons();
    let odds_table = load_fixture("odds.csv", odds_parse_options());
    let lines = quotes_from_table(&odds_table, "Arsenal", "Liverpool");
    assert_eq!(lines.len(), 6);
    let quotes = consensus_quotes(&lines, Pricing::Best);

    let req = MatchRequest::new("Arsenal", "Liverpool").with_quotes(quotes);
    let report = run(&table, &req).unwrap();
    let odds = report.odds.expect("quotes were supplied");

    assert_relative_eq!(odds.signal(Outcome::Home).decimal_odds, 2.45, epsilon = 1e-12);
    assert_relative_eq!(odds.signal(Outcome::Draw).decimal_odds, 3.60, epsilon = 1e-12);
    assert_relative_eq!(
        odds.overround,
        1.0 / 2.45 + 1.0 / 3.60 + 1.0 / 2.90 - 1.0,
        epsilon = 1e-12
    );
    assert_eq!(odds.margin_band, MarginBand::Moderate);
    for outcome in Outcome::ALL {
        let s = odds.signal(outcome);
        assert_relative_eq!(
            s.expected_value,
            report.prediction.probability(outcome) * s.decimal_odds - 1.0,
            epsilon = 1e-12
        );
        assert_eq!(s.is_positive_ev, s.expected_value > 0.0);
    }
}

#[test]
fn league_table_from_combined_seasons() {
    let table = combined_seasons();
    let standings = aggregate_all(&table, &FormConfig::default()).unwrap();
    let order: Vec<&str> = standings.iter().map(|s| s.team.as_str()).collect();
    assert_eq!(order, vec!["Liverpool", "Arsenal", "Manchester United", "Chelsea"]);
    assert!(standings.iter().all(|s| s.matches_played == 5));
}

#[test]
fn fixture_batch_reports_every_match_and_skips_unknown_teams() {
    let table = combined_seasons();
    let list = load_fixture("fixtures.csv", ParseOptions::default());
    let fixtures = fixtures_from_table(&list).unwrap();
    // The row without a home team is dropped.
    assert_eq!(fixtures.len(), 3);
    assert!(fixtures.iter().all(|f| f.league.as_deref() == Some("premierleague")));

    let template = MatchRequest::new("", "").with_profile(ModelProfile::poisson());
    let reports = run_fixtures(&table, &fixtures, &template);
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[1].fixture.home, "Everton");
    assert!(matches!(
        reports[1].result,
        Err(PipelineError::Predict(PredictError::InsufficientData { ref team })) if team == "Everton"
    ));

    let single = MatchRequest::new("Arsenal", "Chelsea").with_profile(ModelProfile::poisson());
    let first = reports[0].result.as_ref().expect("Arsenal v Chelsea");
    assert_eq!(first, &run(&table, &single).unwrap());
    let last = reports[2].result.as_ref().expect("Man Utd v Arsenal");
    assert_eq!(last.home.team, "Manchester United");
    assert_eq!(last.prediction.profile, "poisson");
}

#[test]
fn fixture_list_needs_team_columns() {
    let table = parse_csv("league,date\nepl,2024-08-17\n").table;
    let err = fixtures_from_table(&table).unwrap_err();
    assert!(matches!(err, StatsError::MissingColumn(_)));
}
