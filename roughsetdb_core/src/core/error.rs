use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum FilterError {
    /// The statement was killed while a pack or row loop was running
    Cancelled,
    /// Broken internal invariant, the statement must be aborted
    Internal(String),
    /// The predicate shape is not handled by the requested path
    Unsupported(String),
    /// Allocation of task local state failed or the tuple space is too large
    OutOfMemory(String),
    /// Join retries were exhausted
    JoinFailed(String),
    /// IO errors raised by column providers
    Io(io::Error),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Cancelled => write!(f, "Query cancelled"),
            FilterError::Internal(msg) => write!(f, "Internal error: {}", msg),
            FilterError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            FilterError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            FilterError::JoinFailed(msg) => write!(f, "Join failed: {}", msg),
            FilterError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl Error for FilterError {}

impl From<io::Error> for FilterError {
    fn from(error: io::Error) -> Self {
        FilterError::Io(error)
    }
}

impl FilterError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FilterError::Cancelled)
    }
}

/// Result type of the filter engine
pub type Result<T> = std::result::Result<T, FilterError>;
