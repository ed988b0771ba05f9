use std::fmt;

use thiserror::Error;

use crate::probability::Outcome;

/// Why a single CSV line was skipped. Collected as a diagnostic; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShapeError {
    /// 1-based physical line number in the source text.
    pub line: usize,
    pub kind: RowShapeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowShapeKind {
    FieldCount { expected: usize, found: usize },
    UnterminatedQuote,
    TextAfterQuote { field: usize },
    BadCell { column: String, value: String },
}

impl fmt::Display for RowShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RowShapeKind::FieldCount { expected, found } => write!(
                f,
                "line {}: expected {expected} fields, found {found}",
                self.line
            ),
            RowShapeKind::UnterminatedQuote => {
                write!(f, "line {}: unterminated quoted field", self.line)
            }
            RowShapeKind::TextAfterQuote { field } => write!(
                f,
                "line {}: unexpected text after closing quote in field {}",
                self.line,
                field + 1
            ),
            RowShapeKind::BadCell { column, value } => write!(
                f,
                "line {}: value {value:?} does not fit column {column}",
                self.line
            ),
        }
    }
}

impl std::error::Error for RowShapeError {}

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("column {column:?} matches more than one alias group: {groups:?}")]
    SchemaConflict { column: String, groups: Vec<String> },
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("match table has no {0} column")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Schema(#[from] CombineError),
}

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("not enough match data for {team}")]
    InsufficientData { team: String },
    #[error("home and away team are both {0}")]
    SameTeam(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum OddsError {
    #[error("no odds quoted for outcome {outcome:?}")]
    MissingOutcome { outcome: Outcome },
    #[error("invalid decimal odds {odds} for outcome {outcome:?}")]
    InvalidOdds { outcome: Outcome, odds: f64 },
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown model profile {0:?}")]
    UnknownProfile(String),
    #[error("invalid model profile: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Odds(#[from] OddsError),
}
