//! # pkoc-core
//!
//! Core protocol implementation for PKOC (Public Key Open Credential).
//!
//! This crate provides the I/O-free protocol primitives:
//! - TLV encoding/decoding with the PKOC framing exceptions
//! - Message variants exchanged between panel and reader
//! - ECDSA P-256 signature verification
//! - Per-reader session state
//! - Reassembly of fragmented authentication responses
//! - Protocol constants

pub mod constants;
pub mod error;
pub mod fragment;
pub mod message;
pub mod session;
pub mod signature;
pub mod tlv;

pub use constants::{ReaderError, ReaderErrorCode};
pub use error::{Error, Result};
pub use fragment::FragmentDescriptor;
pub use message::{
    AuthenticationRequest, AuthenticationResponse, CardPresentResponse, Message, MessageId,
    NextTransactionRequest, ReaderErrorResponse, TransactionRefreshResponse,
};
pub use session::{RequestGuard, Session, SessionSettings};
pub use tlv::{Tag, Tlv};
