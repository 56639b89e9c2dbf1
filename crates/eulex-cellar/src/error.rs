use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("server returned {status} for {url}")]
    Server { url: String, status: u16 },

    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl FetchError {
    /// Classify a non-success status code.
    pub fn from_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        if status == 404 {
            Self::NotFound { url }
        } else {
            Self::Server { url, status }
        }
    }

    /// Timeouts, connection failures, 429 and 5xx are worth retrying.
    /// Not-found, forbidden and other 4xx are definitive.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::NotFound { .. } | Self::Parse { .. } | Self::Client(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
