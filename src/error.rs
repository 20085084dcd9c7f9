//! Error taxonomy for docrag operations
//!
//! Every fallible operation classifies its failures into one of five
//! variants so callers can match on the kind without parsing messages.

use thiserror::Error;

/// Main error type for docrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied invalid input; retrying the same request will fail
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested resource or answer does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external service (embedding API, vector index, completion API)
    /// failed or returned something unusable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A bug or unexpected condition inside this program
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration could not be loaded or is unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for docrag
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message suitable for end users. Validation and not-found errors are
    /// always shown verbatim; upstream and internal details only appear in
    /// verbose mode so provider internals stay out of normal output.
    pub fn user_message(&self, verbose: bool) -> String {
        match self {
            Error::Validation(_) | Error::NotFound(_) | Error::Config(_) => self.to_string(),
            Error::Upstream(_) | Error::Internal(_) => {
                if verbose {
                    self.to_string()
                } else {
                    "An error occurred while processing the request. Run with --verbose for details."
                        .to_string()
                }
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Upstream(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Validation(format!("invalid URL: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("invalid config file: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
