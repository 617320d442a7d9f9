use thiserror::Error;

/// Top-level error type for the SwapVec pipeline.
///
/// Record-level variants (`MalformedRecord`, `Vectorization`, `DuplicateId`)
/// are recovered inside a batch. `StoreFull`, `CapacityExhausted` and
/// `ShuttingDown` are surfaced to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SwapvecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed swap record{}: {reason}", signature_suffix(.signature))]
    MalformedRecord {
        signature: Option<String>,
        reason: String,
    },

    #[error("Vectorization error: {0}")]
    Vectorization(String),

    #[error("Duplicate vector id: {0}")]
    DuplicateId(String),

    #[error("Vector store full: capacity {capacity}")]
    StoreFull { capacity: usize },

    #[error("Vector store capacity {capacity} exhausted after storing {stored} records ({pending} pending)")]
    CapacityExhausted {
        capacity: usize,
        stored: usize,
        pending: usize,
    },

    #[error("Vector not found: {0}")]
    NotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

fn signature_suffix(signature: &Option<String>) -> String {
    signature
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default()
}

impl SwapvecError {
    /// Build a `MalformedRecord` error.
    pub fn malformed(signature: Option<String>, reason: impl Into<String>) -> Self {
        SwapvecError::MalformedRecord {
            signature,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for SwapvecError {
    fn from(err: toml::de::Error) -> Self {
        SwapvecError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SwapvecError {
    fn from(err: toml::ser::Error) -> Self {
        SwapvecError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SwapvecError {
    fn from(err: serde_json::Error) -> Self {
        SwapvecError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for SwapVec operations.
pub type Result<T> = std::result::Result<T, SwapvecError>;
