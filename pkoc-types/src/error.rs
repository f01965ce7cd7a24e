//! Error types for pkoc-types

/// Result type alias for value construction
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Raw input does not form a valid value
    #[error("Invalid {kind}: {reason}")]
    Validation { kind: &'static str, reason: String },
}
