//! Error types for the tonal tension engine.
//!
//! One enum per §7 of the spec; every fallible operation in this crate
//! returns `Result<_, TensionError>`.

#[derive(Debug, thiserror::Error)]
pub enum TensionError {
    #[error("invalid chroma: expected {expected} bits, got {got}")]
    InvalidChromaLength { expected: usize, got: usize },

    #[error("invalid chroma: bit {index} must be 0 or 1, got {value}")]
    InvalidChromaBit { index: usize, value: i64 },

    #[error("invalid chroma: all bits are zero")]
    EmptyChroma,

    #[error("invalid chroma text: {0}")]
    InvalidChromaText(String),

    #[error("chord {0:?} not found in index")]
    InvalidChord(String),

    #[error("cannot parse key: {0:?}")]
    InvalidKey(String),

    #[error("progression chord {0:?} not found in index")]
    InvalidProgressionChord(String),

    #[error("progression must end with the current chord")]
    ProgressionMismatch,

    #[error("unknown indicator weight key: {0:?}")]
    UnknownWeightKey(String),

    #[error("indicator weight for {key:?} must be non-negative, got {value}")]
    NegativeWeight { key: String, value: f64 },

    #[error("corrupt or schema-incompatible index: {0}")]
    InvalidIndex(String),

    #[error("either chord or progression must be provided")]
    MissingChord,
}

pub type Result<T> = std::result::Result<T, TensionError>;
