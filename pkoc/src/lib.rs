//! # pkoc
//!
//! Control-panel side of PKOC (Public Key Open Credential) over OSDP.
//!
//! ## Features
//!
//! - Byte-exact PKOC message codec
//! - Reassembly of fragmented authentication responses
//! - Request/response API with bounded waits on top of an event-driven transport
//! - ECDSA P-256 verification of the credential's signature
//!
//! ## Quick Start
//!
//! ```no_run
//! use pkoc::{ControlPanel, PanelEvent, ReaderAddress, Session};
//! use pkoc_transport::MockTransport;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> pkoc::Result<()> {
//!     let panel = ControlPanel::new(MockTransport::new());
//!     let session = Session::new(ReaderAddress::new(Uuid::new_v4(), 0x00));
//!     panel.initialize(&session).await?;
//!
//!     let mut events = panel.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let PanelEvent::CardPresented { .. } = event {
//!             let response = panel.authentication_request(&session).await?;
//!             println!("Signature valid: {}", response.is_valid_signature());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod panel;

// Re-exports
pub use error::{Error, Result};
pub use event::PanelEvent;
pub use panel::ControlPanel;

// Re-export protocol types
pub use pkoc_core::{
    AuthenticationResponse, CardPresentResponse, ReaderErrorCode, ReaderErrorResponse, Session,
    SessionSettings,
};
pub use pkoc_transport::{ManufacturerReply, Transport};
pub use pkoc_types::{ReaderAddress, VendorCode};
