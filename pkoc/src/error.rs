//! High-level error types

use std::time::Duration;

use pkoc_types::ReaderAddress;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] pkoc_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] pkoc_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] pkoc_types::Error),

    #[error("{0} is already initialized")]
    AlreadyInitialized(ReaderAddress),

    #[error("{0} is not initialized")]
    NotInitialized(ReaderAddress),

    #[error("{0} rejected the command")]
    CommandRejected(ReaderAddress),

    #[error("{reader} did not answer within {after:?}")]
    Timeout { reader: ReaderAddress, after: Duration },

    #[error("Request to {0} was cancelled")]
    Cancelled(ReaderAddress),
}

impl Error {
    /// Check if the operation may succeed when retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::CommandRejected(_) => true,
            Self::Core(e) => matches!(e, pkoc_core::Error::RequestInProgress),
            Self::Transport(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_is_recoverable() {
        let reader = ReaderAddress::new(Uuid::nil(), 0);

        assert!(Error::Timeout { reader, after: Duration::from_secs(3) }.is_recoverable());
        assert!(Error::CommandRejected(reader).is_recoverable());
        assert!(Error::from(pkoc_core::Error::RequestInProgress).is_recoverable());
        assert!(Error::from(pkoc_transport::Error::Timeout).is_recoverable());

        assert!(!Error::NotInitialized(reader).is_recoverable());
        assert!(!Error::from(pkoc_transport::Error::NotConnected).is_recoverable());
        assert!(!Error::from(pkoc_core::Error::MissingIncomingData).is_recoverable());
    }

    #[test]
    fn test_display() {
        let reader = ReaderAddress::new(Uuid::nil(), 0x01);
        assert_eq!(
            Error::NotInitialized(reader).to_string(),
            "Reader[00000000-0000-0000-0000-000000000000@0x01] is not initialized"
        );
    }
}
