use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds raised by the analysis stages.
///
/// Every stage checks its own preconditions and returns one of these instead
/// of letting NaN or infinities leak downstream.
#[derive(Debug, Error)]
pub enum AnsError {
    #[error("{stage}: need at least {required} samples, got {actual}")]
    InsufficientData {
        stage: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("need at least 2 beats to form an interval, found {found}")]
    InsufficientBeats { found: usize },

    #[error("LF/HF ratio undefined: {band} band has no usable power")]
    DivisionUndefined { band: &'static str },

    #[error("malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AnsError>;
