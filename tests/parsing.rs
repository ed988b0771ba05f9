use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use matchday_edge::csv_table::{
    Cell, ColumnType, ParseOptions, detect_delimiter, parse, parse_csv, read_csv_file, write_csv,
};
use matchday_edge::error::RowShapeKind;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

#[test]
fn parses_football_data_season() {
    let out = read_csv_file(&fixture_path("season_2023.csv"), &ParseOptions::default())
        .expect("fixture should load");
    assert!(out.skipped.is_empty());
    assert_eq!(out.table.len(), 6);
    assert_eq!(out.table.columns().len(), 10);

    let ty = |name: &str| out.table.columns()[out.table.column_index(name).unwrap()].ty;
    assert_eq!(ty("Date"), ColumnType::Date);
    assert_eq!(ty("HomeTeam"), ColumnType::Text);
    assert_eq!(ty("FTHG"), ColumnType::Int);
    assert_eq!(ty("B365H"), ColumnType::Float);

    assert_eq!(
        out.table.value(0, "date"),
        Some(&Cell::Date(NaiveDate::from_ymd_opt(2023, 8, 12).unwrap()))
    );
    assert_eq!(out.table.value(1, "AwayTeam"), Some(&Cell::Text("Man United".to_string())));
}

#[test]
fn semicolon_file_reports_short_line_and_keeps_the_rest() {
    let raw = read_fixture("season_2024.csv");
    let delimiter = detect_delimiter(&raw);
    assert_eq!(delimiter, ';');

    let out = parse(&raw, &ParseOptions::default().with_delimiter(delimiter));
    assert_eq!(out.table.len(), 6);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].line, 5);
    assert_eq!(
        out.skipped[0].kind,
        RowShapeKind::FieldCount {
            expected: 6,
            found: 4
        }
    );
    // Mixed date spellings still land in one Date column.
    assert_eq!(out.table.columns()[0].ty, ColumnType::Date);
    // Unplayed fixture keeps empty score cells.
    assert_eq!(out.table.value(5, "HG"), Some(&Cell::Empty));
}

#[test]
fn quoted_fields_keep_inner_whitespace_and_delimiters() {
    let out = parse_csv("Team,Note\n  Arsenal  ,\"  north, london  \"\n");
    assert_eq!(out.table.value(0, "Team"), Some(&Cell::Text("Arsenal".to_string())));
    assert_eq!(
        out.table.value(0, "Note"),
        Some(&Cell::Text("  north, london  ".to_string()))
    );
}

#[test]
fn declared_type_rejects_mistyped_cells() {
    let opts = ParseOptions::default().declare("Goals", ColumnType::Int);
    let out = parse("Team,Goals\nArsenal,2\nChelsea,two\nLiverpool,3\n", &opts);
    assert_eq!(out.table.len(), 2);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].line, 3);
    assert!(matches!(out.skipped[0].kind, RowShapeKind::BadCell { .. }));
}

#[test]
fn empty_and_header_only_input() {
    assert!(parse_csv("").table.columns().is_empty());
    let header_only = parse_csv("Date,HomeTeam,AwayTeam\n");
    assert_eq!(header_only.table.columns().len(), 3);
    assert!(header_only.table.is_empty());
}

#[test]
fn written_csv_parses_back_to_the_same_table() {
    let original = parse_csv(&read_fixture("season_2023.csv")).table;
    let text = write_csv(&original).expect("write should succeed");
    let reparsed = parse_csv(&text).table;
    assert_eq!(reparsed.len(), original.len());
    assert_eq!(reparsed.value(3, "FTAG"), original.value(3, "FTAG"));
    assert_eq!(reparsed.value(0, "Date"), original.value(0, "Date"));
}

#[test]
fn whole_number_float_column_stays_float_after_writing() {
    let opts = ParseOptions::default().declare("xG", ColumnType::Float);
    let original = parse("Team,xG\nArsenal,2\nChelsea,1\n", &opts).table;
    assert_eq!(original.value(0, "xG"), Some(&Cell::Float(2.0)));

    let text = write_csv(&original).expect("write should succeed");
    assert!(text.contains("Arsenal,2.0"));
    let reparsed = parse_csv(&text).table;
    assert_eq!(reparsed.columns()[1].ty, ColumnType::Float);
    assert_eq!(reparsed.value(1, "xG"), Some(&Cell::Float(1.0)));
}
