use std::fmt;

use crate::model::BatchKind;

#[derive(Debug)]
pub enum ReconError {
    /// A gateway batch arrived with no rows at all.
    EmptyBatch { batch: BatchKind },
    /// Required columns absent from the batch header row.
    MissingColumns {
        batch: BatchKind,
        missing: Vec<String>,
        available: Vec<String>,
    },
    /// A structurally invalid DB row (e.g. an order without a process number).
    MalformedRow { context: &'static str, detail: String },
    /// CSV text could not be read into rows.
    Csv(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config value validation error.
    ConfigValidation(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBatch { batch } => write!(f, "{batch} batch is empty"),
            Self::MissingColumns { batch, missing, available } => write!(
                f,
                "{batch} batch missing required columns: {missing:?}. Available columns: {available:?}"
            ),
            Self::MalformedRow { context, detail } => {
                write!(f, "malformed {context} row: {detail}")
            }
            Self::Csv(msg) => write!(f, "CSV read error: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
