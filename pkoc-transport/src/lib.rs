//! Transport layer for PKOC
//!
//! PKOC rides on OSDP manufacturer-specific commands and replies. Link
//! management (serial framing, polling, retries) belongs to the OSDP stack;
//! this crate only defines the seam a control panel talks through.

pub mod error;
pub mod mock;

pub use error::{Error, Result};
pub use mock::{MockCall, MockTransport};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pkoc_types::{ReaderAddress, VendorCode};
use tokio::sync::broadcast;

/// Manufacturer-specific reply received from a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerReply {
    pub reader: ReaderAddress,
    pub vendor_code: VendorCode,
    pub payload: Bytes,
}

impl ManufacturerReply {
    pub fn new(reader: ReaderAddress, vendor_code: VendorCode, payload: impl Into<Bytes>) -> Self {
        Self {
            reader,
            vendor_code,
            payload: payload.into(),
        }
    }

    /// Reply tagged with the PKOC vendor code
    pub fn pkoc(reader: ReaderAddress, payload: impl Into<Bytes>) -> Self {
        Self::new(reader, VendorCode::PKOC, payload)
    }
}

/// OSDP stack as seen by a PKOC control panel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a manufacturer-specific command, fragmenting it if needed
    ///
    /// `Ok(false)` means the reader did not accept the command.
    async fn send_manufacturer_command(
        &self,
        reader: ReaderAddress,
        vendor_code: VendorCode,
        payload: Bytes,
        max_fragment_size: u16,
        timeout: Duration,
    ) -> Result<bool>;

    /// Ask the reader to accept replies up to `size` bytes
    async fn set_receive_buffer_size(&self, reader: ReaderAddress, size: u16) -> Result<bool>;

    /// Keep the reader's card session open for `milliseconds`
    async fn set_keep_reader_active(&self, reader: ReaderAddress, milliseconds: u16)
    -> Result<bool>;

    /// Stream of manufacturer-specific replies from every reader
    fn subscribe(&self) -> broadcast::Receiver<ManufacturerReply>;
}
