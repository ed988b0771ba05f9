use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use matchday_edge::csv_table::{parse, parse_csv};
use matchday_edge::odds::{
    AnalyzerConfig, OddsQuote, Pricing, analyze, consensus_quotes, odds_parse_options,
    quotes_from_table,
};
use matchday_edge::predict::PredictionResult;
use matchday_edge::probability::Outcome;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn value_bet_worked_example() {
    let prediction = PredictionResult {
        home: 0.55,
        draw: 0.25,
        away: 0.20,
        expected_goals: (1.6, 1.0),
        profile: "strength".to_string(),
    };
    let quotes = [
        OddsQuote::new(Outcome::Home, 2.0),
        OddsQuote::new(Outcome::Draw, 3.5),
        OddsQuote::new(Outcome::Away, 4.0),
    ];
    let a = analyze(&prediction, &quotes, &AnalyzerConfig { kelly_fraction: 1.0 }).unwrap();

    let home = a.signal(Outcome::Home);
    assert_relative_eq!(home.implied_probability, 0.5, epsilon = 1e-12);
    assert_relative_eq!(home.expected_value, 0.10, epsilon = 1e-12);
    assert_relative_eq!(home.edge, 0.05, epsilon = 1e-12);
    assert_relative_eq!(home.kelly_fraction, 0.10, epsilon = 1e-12);
    assert!(home.is_positive_ev);

    let away = a.signal(Outcome::Away);
    assert_relative_eq!(away.expected_value, -0.20, epsilon = 1e-12);
    assert_eq!(away.kelly_fraction, 0.0);
    assert!(!away.is_positive_ev);

    // Fair odds strip the margin, so they are longer than the quoted odds.
    assert!(a.signals.iter().all(|s| s.fair_odds > s.decimal_odds));
}

#[test]
fn long_format_export_mixes_decimal_and_american_prices() {
    let table = parse(&read_fixture("odds.csv"), &odds_parse_options()).table;
    let lines = quotes_from_table(&table, "Arsenal", "Liverpool");
    assert_eq!(lines.len(), 6);
    assert!(lines.iter().all(|l| l.bookmaker == "Bet365" || l.bookmaker == "Pinnacle"));

    let pinnacle_home = lines
        .iter()
        .find(|l| l.bookmaker == "Pinnacle" && l.outcome == Outcome::Home)
        .unwrap();
    assert_relative_eq!(pinnacle_home.decimal_odds, 2.45, epsilon = 1e-12);

    let avg = consensus_quotes(&lines, Pricing::Average);
    assert_eq!(avg.len(), 3);
    assert_relative_eq!(avg[1].decimal_odds, 3.55, epsilon = 1e-12);
}

#[test]
fn football_data_season_columns() {
    let table = parse_csv(&read_fixture("season_2023.csv")).table;
    let lines = quotes_from_table(&table, "Arsenal", "Chelsea");
    assert_eq!(lines.len(), 3);
    let quotes = consensus_quotes(&lines, Pricing::Best);
    assert_eq!(
        quotes,
        vec![
            OddsQuote::new(Outcome::Home, 1.90),
            OddsQuote::new(Outcome::Draw, 3.60),
            OddsQuote::new(Outcome::Away, 4.20),
        ]
    );
    assert!(quotes_from_table(&table, "Arsenal", "Everton").is_empty());
}
