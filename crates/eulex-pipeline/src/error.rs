use eulex_cellar::FetchError;
use eulex_core::{ConfigError, InvalidIdentifierError, ProcedureNumberError};
use eulex_store::{ExportError, StoreError};
use thiserror::Error;

/// A selection entry that produced no identifier. Recorded, never fatal.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifierError),

    #[error(transparent)]
    InvalidProcedure(#[from] ProcedureNumberError),

    #[error("no documents found for procedure {procedure}")]
    ProcedureNotFound { procedure: String },

    #[error("lookup of procedure {procedure} failed: {source}")]
    Lookup {
        procedure: String,
        #[source]
        source: FetchError,
    },
}

impl ResolutionError {
    /// The selection entry the error is about.
    pub fn subject(&self) -> &str {
        match self {
            Self::InvalidIdentifier(e) => &e.input,
            Self::InvalidProcedure(e) => &e.input,
            Self::ProcedureNotFound { procedure } | Self::Lookup { procedure, .. } => procedure,
        }
    }
}

/// Run-level failures. Everything per-document ends up in the run summary
/// instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("descriptive search failed: {0}")]
    Search(#[source] FetchError),

    #[error("concept lookup failed: {0}")]
    Thesaurus(#[source] FetchError),

    #[error("could not create HTTP client: {0}")]
    Client(#[source] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
