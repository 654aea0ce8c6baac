//! Error types for the signal engine

use thiserror::Error;

/// Signal engine error
#[derive(Debug, Error)]
pub enum Error {
    /// No tool registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments failed the declared input contract
    #[error("Invalid input for {tool}: {reason}")]
    InvalidInput {
        /// Tool that rejected the arguments
        tool: &'static str,
        /// What was wrong with them
        reason: String,
    },

    /// Domain record lookup failed
    #[error("Lookup error: {0}")]
    Lookup(String),
}

impl Error {
    pub(crate) fn invalid_input(tool: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            tool,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Lookup(err.to_string())
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
