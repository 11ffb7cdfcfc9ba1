use core::fmt;

/// Result alias for `cascade`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by event assembly and configuration.
///
/// Hierarchy construction and matching themselves are infallible: degenerate
/// inputs (empty lists, zero primaries, orphaned particles) produce
/// empty-but-valid results rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },
    /// A particle index that does not exist in the event.
    UnknownParticle {
        /// The offending index.
        index: usize,
    },
    /// A hit index that does not exist in the event.
    UnknownHit {
        /// The offending index.
        index: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::UnknownParticle { index } => {
                write!(f, "unknown particle index {index}")
            }
            Error::UnknownHit { index } => write!(f, "unknown hit index {index}"),
        }
    }
}

impl std::error::Error for Error {}
