//! The library's error type.
use std::io;

use itertools::Itertools;
use thiserror::Error;

/// Everything that can stop a harmonisation, combination or crosswalk.
///
/// An unrecognised event and a ratio group outside tolerance are *not* here:
/// both are expected outcomes and are reported through
/// [`crate::diag::Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Expected source columns were absent. Lists every one of them.
    #[error("missing expected column(s): {}", .missing.iter().map(|m| format!("`{}`", m)).join(", "))]
    Schema { missing: Vec<String> },
    #[error("no column named `{0}`")]
    UnknownColumn(String),
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("column `{name}` has {found} rows but the table has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// Tables that cannot be bound together even after type coercion.
    #[error("cannot combine tables: {0}")]
    Combine(String),
    #[error("cannot map {from} boundaries onto {to}: no concordance runs backwards in time")]
    InvalidBoundaryCombination { from: String, to: String },
    #[error("no correspondence is available from `{event}` to `{compare_to}`")]
    UnsupportedBoundary { event: String, compare_to: String },
    #[error("`{0}` is not an event known to the reference index")]
    UnknownEvent(String),
    #[error("reference index: {0}")]
    Index(String),
    #[error("fetching {what}: {reason}")]
    Fetch { what: String, reason: String },
    #[error("configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
