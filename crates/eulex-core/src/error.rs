use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::DocumentType;

/// Fatal configuration problems, raised before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fixed mode needs at least one CELEX id or procedure number")]
    EmptySelection,

    #[error("descriptive mode requires {0}")]
    MissingDate(&'static str),

    #[error("{field} {date} is in the future")]
    FutureDate { field: &'static str, date: NaiveDate },

    #[error("start_date {start} is after end_date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("descriptive mode requires at least one document type")]
    NoDocumentTypes,

    #[error("document type {0} cannot be selected in descriptive mode; use regulation, directive, decision or proposal")]
    UnselectableDocumentType(DocumentType),

    #[error("max_threads must be at least 1")]
    ZeroThreads,

    #[error("at least one output format is required")]
    NoFormats,

    #[error("review artifact {path}: {reason}")]
    ReviewArtifact { path: PathBuf, reason: String },
}
