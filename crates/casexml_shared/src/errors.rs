//! Error results that can be returned from the casexml crates
use crate::location::Location;
use derive_more::Display;
use thiserror::Error;

/// Parser error that defines an error (message) on the given position
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{message} at {location}")]
pub struct ParseError {
    /// Parse error message
    pub message: String,
    /// Location of the error
    pub location: Location,
}

/// Serious errors and errors from third-party libraries
#[derive(Debug, Error)]
pub enum Error {
    #[error("xml parse error: {0}")]
    Parse(ParseError),

    #[error("query error: {0}")]
    Query(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid value '{value}' for {id}: {reason}")]
    InvalidValue { id: String, value: String, reason: String },

    #[error("no header template found for {0}")]
    MissingHeader(String),

    #[error("{0} is read only")]
    ReadOnly(String),

    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}
