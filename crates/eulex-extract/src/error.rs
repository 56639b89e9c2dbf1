use eulex_core::SegmentKind;
use thiserror::Error;

/// A section that could not be segmented. Never fatal to the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no recognisable {kind} structure")]
    NoStructure { kind: SegmentKind },
}

/// A relation candidate that was dropped. Never fatal to the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    #[error("unparsable relation target {raw:?}")]
    InvalidTarget { raw: String },

    #[error("self-referential relation to {raw:?}")]
    SelfReference { raw: String },
}
