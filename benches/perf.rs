use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use matchday_edge::combine::{CombineOptions, combine};
use matchday_edge::csv_table::{Table, parse_csv};
use matchday_edge::predict::predict;
use matchday_edge::profile::ModelProfile;
use matchday_edge::team_stats::{FormConfig, aggregate, aggregate_all};

const TEAMS: [&str; 20] = [
    "Arsenal",
    "Aston Villa",
    "Bournemouth",
    "Brentford",
    "Brighton",
    "Burnley",
    "Chelsea",
    "Crystal Palace",
    "Everton",
    "Fulham",
    "Leeds",
    "Liverpool",
    "Man City",
    "Man United",
    "Newcastle",
    "Nott'm Forest",
    "Sunderland",
    "Tottenham",
    "West Ham",
    "Wolves",
];

/// Double round robin with deterministic scores.
fn season_csv(year: i32) -> String {
    let mut out = String::from("Date,HomeTeam,AwayTeam,FTHG,FTAG\n");
    let mut day = 0u32;
    for (h, home) in TEAMS.iter().enumerate() {
        for (a, away) in TEAMS.iter().enumerate() {
            if h == a {
                continue;
            }
            day += 1;
            let month = 8 + (day / 28) % 10;
            let (y, m) = if month > 12 { (year + 1, month - 12) } else { (year, month) };
            out.push_str(&format!(
                "{y}-{m:02}-{:02},{home},{away},{},{}\n",
                1 + day % 28,
                (h * 7 + a * 3) % 4,
                (h * 5 + a * 11) % 3
            ));
        }
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let raw = season_csv(2023);
    c.bench_function("parse_season", |b| {
        b.iter(|| {
            let out = parse_csv(black_box(&raw));
            black_box(out.table.len());
        })
    });
}

fn bench_combine(c: &mut Criterion) {
    let tables: Vec<Table> = (2021..2024).map(|y| parse_csv(&season_csv(y)).table).collect();
    let opts = CombineOptions::default();
    c.bench_function("combine_three_seasons", |b| {
        b.iter(|| {
            let out = combine(black_box(&tables), &opts).unwrap();
            black_box(out.table.len());
        })
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let table = parse_csv(&season_csv(2023)).table;
    let form = FormConfig::default();
    c.bench_function("aggregate_one_team", |b| {
        b.iter(|| black_box(aggregate(&table, black_box("Arsenal"), &form).unwrap()))
    });
    c.bench_function("aggregate_league_table", |b| {
        b.iter(|| black_box(aggregate_all(&table, &form).unwrap().len()))
    });
}

fn bench_predict(c: &mut Criterion) {
    let table = parse_csv(&season_csv(2023)).table;
    let form = FormConfig::default();
    let home = aggregate(&table, "Arsenal", &form).unwrap();
    let away = aggregate(&table, "Chelsea", &form).unwrap();
    for profile in [ModelProfile::strength(), ModelProfile::poisson()] {
        c.bench_function(&format!("predict_{}", profile.name), |b| {
            b.iter(|| black_box(predict(&home, &away, black_box(&profile)).unwrap()))
        });
    }
}

criterion_group!(benches, bench_parse, bench_combine, bench_aggregate, bench_predict);
criterion_main!(benches);
