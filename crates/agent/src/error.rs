use thiserror::Error;

/// Why a command was rejected.
///
/// Every variant describes the request itself. Tool and credential
/// failures are never reported here; they come back as response text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    #[error("Command cannot be empty.")]
    EmptyCommand,

    #[error("Unable to map command: {0}")]
    Unmapped(String),

    /// A direct-mode action whose required argument is absent from the text.
    #[error("{0}")]
    MissingArgument(String),
}
