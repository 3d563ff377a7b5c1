use thiserror::Error;

/// Canonical result for rexc.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No internal value type exists for an external type descriptor.
    #[error("Type resolution error: {0}")]
    TypeResolution(String),

    /// The operator or function has no internal equivalent.
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Caller contract violation or a bug in the compiler itself.
    #[error("Internal invariant failed: {0}")]
    Invariant(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Statement documents are parsed in the planner; their errors are mapped
    // here so every layer shares one error type.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Hashing error: {0}")]
    Hash(String),
}

impl Error {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedExpression(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
