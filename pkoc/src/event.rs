//! Unsolicited reader events

use pkoc_core::{CardPresentResponse, ReaderErrorResponse};
use pkoc_types::ReaderAddress;

/// Event published by a control panel when a reader speaks on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// A PKOC credential entered the reader's field
    CardPresented {
        reader: ReaderAddress,
        response: CardPresentResponse,
    },

    ReaderErrorReported {
        reader: ReaderAddress,
        response: ReaderErrorResponse,
    },
}

impl PanelEvent {
    /// Reader that produced the event
    pub fn reader(&self) -> ReaderAddress {
        match self {
            Self::CardPresented { reader, .. } | Self::ReaderErrorReported { reader, .. } => *reader,
        }
    }
}
