//! Type definitions for pkoc

pub mod error;
pub mod reader;
pub mod vendor;

pub use error::{Error, Result};
pub use reader::{ConnectionId, ReaderAddress};
pub use vendor::VendorCode;
