pub mod aliases;
pub mod combine;
pub mod csv_table;
pub mod error;
pub mod odds;
pub mod pipeline;
pub mod predict;
pub mod probability;
pub mod profile;
pub mod team_stats;

pub use combine::{CombineOptions, CombineOutcome, combine};
pub use csv_table::{Cell, ColumnType, ParseOptions, ParseOutcome, Table, parse, parse_csv};
pub use error::{
    CombineError, OddsError, PipelineError, PredictError, ProfileError, RowShapeError, StatsError,
};
pub use odds::{AnalyzerConfig, OddsAnalysis, OddsQuote, ValueBetSignal, analyze};
pub use pipeline::{
    Fixture, FixtureReport, MatchReport, MatchRequest, fixtures_from_table, run, run_fixtures,
};
pub use predict::{PredictionResult, predict};
pub use probability::{Outcome, Prob3};
pub use profile::ModelProfile;
pub use team_stats::{FormConfig, TeamStats, aggregate};
