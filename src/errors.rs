use std::fmt;

/// Error kinds the engine can surface, per the error-handling design: each
/// variant is fatal and carries a human-readable message. There is no retry
/// path and no partial-result mode.
#[derive(Debug)]
pub enum LancError {
    /// VCF/model/map syntax that does not parse.
    MalformedInput(String),
    /// Inputs disagree with each other (e.g. ancestry order, duplicate sample IDs).
    InconsistentInput(String),
    /// Nothing left to do after filtering (A < 2, no samples, no markers).
    InsufficientData(String),
    /// A non-finite posterior or probability; indicates a bug, always aborts.
    NumericFailure(String),
    /// Unreadable or unwritable file.
    Io(String),
}

impl LancError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        LancError::MalformedInput(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        LancError::InconsistentInput(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        LancError::InsufficientData(msg.into())
    }

    pub fn numeric(msg: impl Into<String>) -> Self {
        LancError::NumericFailure(msg.into())
    }
}

impl fmt::Display for LancError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LancError::MalformedInput(m) => write!(f, "malformed input: {}", m),
            LancError::InconsistentInput(m) => write!(f, "inconsistent input: {}", m),
            LancError::InsufficientData(m) => write!(f, "insufficient data: {}", m),
            LancError::NumericFailure(m) => write!(f, "numeric failure: {}", m),
            LancError::Io(m) => write!(f, "I/O error: {}", m),
        }
    }
}

impl std::error::Error for LancError {}

impl From<std::io::Error> for LancError {
    fn from(e: std::io::Error) -> Self {
        LancError::Io(e.to_string())
    }
}

impl From<rust_htslib::errors::Error> for LancError {
    fn from(e: rust_htslib::errors::Error) -> Self {
        LancError::Io(e.to_string())
    }
}
