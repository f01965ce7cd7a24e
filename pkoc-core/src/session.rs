//! Per-reader PKOC session
//!
//! A session represents one physical reader and tracks:
//! - Reader identifier (random, fixed for the session's lifetime)
//! - Current transaction identifier (nonce, redrawn for every request)
//! - Incoming reassembly buffer for the authentication response
//! - Whether an authentication request is in flight

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pkoc_types::ReaderAddress;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

use crate::constants::{
    DEFAULT_CARD_READ_TIMEOUT, DEFAULT_MAX_FRAGMENT_SEND_SIZE, DEFAULT_MAX_RECEIVE_SIZE, NONCE_LEN,
    READER_IDENTIFIER_LEN,
};
use crate::error::{Error, Result};

/// Transport tuning for a session, fixed once the session is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    max_fragment_send_size: u16,
    max_receive_size: u16,
    card_read_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_fragment_send_size: DEFAULT_MAX_FRAGMENT_SEND_SIZE,
            max_receive_size: DEFAULT_MAX_RECEIVE_SIZE,
            card_read_timeout: DEFAULT_CARD_READ_TIMEOUT,
        }
    }
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest fragment used when sending commands to the reader
    pub fn with_max_fragment_send_size(mut self, size: u16) -> Self {
        self.max_fragment_send_size = size;
        self
    }

    /// Receive buffer size requested from the reader
    pub fn with_max_receive_size(mut self, size: u16) -> Self {
        self.max_receive_size = size;
        self
    }

    /// Time budget for a whole authentication exchange
    pub fn with_card_read_timeout(mut self, timeout: Duration) -> Self {
        self.card_read_timeout = timeout;
        self
    }

    pub fn max_fragment_send_size(&self) -> u16 {
        self.max_fragment_send_size
    }

    pub fn max_receive_size(&self) -> u16 {
        self.max_receive_size
    }

    pub fn card_read_timeout(&self) -> Duration {
        self.card_read_timeout
    }

    /// Card read timeout in whole milliseconds, saturated to `u16`
    pub fn card_read_timeout_ms(&self) -> u16 {
        u16::try_from(self.card_read_timeout.as_millis()).unwrap_or(u16::MAX)
    }
}

/// PKOC session for one reader
///
/// Cloning is cheap and every clone shares the same state. Equality and
/// hashing only consider the reader address.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    reader: ReaderAddress,
    settings: SessionSettings,
    reader_identifier: [u8; READER_IDENTIFIER_LEN],

    /// Set while an authentication request owns the session
    in_flight: AtomicBool,

    exchange: Mutex<Exchange>,
}

#[derive(Debug, Default)]
struct Exchange {
    current_nonce: [u8; NONCE_LEN],

    /// `None` until the first fragment of a response arrives
    incoming: Option<Vec<u8>>,
}

impl Session {
    /// Create a session with default settings
    pub fn new(reader: ReaderAddress) -> Self {
        Self::with_settings(reader, SessionSettings::default())
    }

    /// Create a session with custom settings
    pub fn with_settings(reader: ReaderAddress, settings: SessionSettings) -> Self {
        let mut reader_identifier = [0u8; READER_IDENTIFIER_LEN];
        OsRng.fill_bytes(&mut reader_identifier);

        Self {
            inner: Arc::new(SessionInner {
                reader,
                settings,
                reader_identifier,
                in_flight: AtomicBool::new(false),
                exchange: Mutex::new(Exchange::default()),
            }),
        }
    }

    pub fn reader(&self) -> ReaderAddress {
        self.inner.reader
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    pub fn reader_identifier(&self) -> &[u8; READER_IDENTIFIER_LEN] {
        &self.inner.reader_identifier
    }

    /// Nonce issued by the most recent authentication request
    pub fn current_nonce(&self) -> [u8; NONCE_LEN] {
        self.inner.exchange.lock().current_nonce
    }

    /// Start a new exchange: drop any partial response and draw a fresh nonce
    pub fn begin_authentication(&self) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut exchange = self.inner.exchange.lock();
        if let Some(stale) = exchange.incoming.take() {
            debug!(
                "{}: discarding {} byte partial response",
                self.inner.reader,
                stale.len()
            );
        }
        exchange.current_nonce = nonce;

        nonce
    }

    /// Claim the session for one authentication request
    ///
    /// The claim is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestInProgress`] if another request holds the session.
    pub fn try_begin_request(&self) -> Result<RequestGuard> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RequestInProgress)?;

        Ok(RequestGuard {
            session: self.clone(),
        })
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Hand the reassembled response over to the caller, leaving the session idle
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIncomingData`] if nothing has been received.
    pub fn take_incoming(&self) -> Result<Vec<u8>> {
        self.inner
            .exchange
            .lock()
            .incoming
            .take()
            .ok_or(Error::MissingIncomingData)
    }

    /// Run `f` against the incoming buffer under the session lock
    pub(crate) fn with_incoming<R>(&self, f: impl FnOnce(&mut Option<Vec<u8>>) -> R) -> R {
        f(&mut self.inner.exchange.lock().incoming)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.inner.reader == other.inner.reader
    }
}

impl Eq for Session {}

impl Hash for Session {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.reader.hash(state);
    }
}

/// Exclusive claim on a session's authentication exchange
#[must_use = "the request claim is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RequestGuard {
    session: Session,
}

impl RequestGuard {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.session.inner.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn reader(address: u8) -> ReaderAddress {
        ReaderAddress::new(Uuid::from_u128(1), address)
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.max_fragment_send_size(), 128);
        assert_eq!(settings.max_receive_size(), 1024);
        assert_eq!(settings.card_read_timeout(), Duration::from_secs(3));
        assert_eq!(settings.card_read_timeout_ms(), 3000);
    }

    #[test]
    fn test_settings_builder() {
        let settings = SessionSettings::new()
            .with_max_fragment_send_size(64)
            .with_max_receive_size(512)
            .with_card_read_timeout(Duration::from_secs(120));

        assert_eq!(settings.max_fragment_send_size(), 64);
        assert_eq!(settings.max_receive_size(), 512);
        assert_eq!(settings.card_read_timeout_ms(), u16::MAX);
    }

    #[test]
    fn test_reader_identifier_is_random() {
        let a = Session::new(reader(1));
        let b = Session::new(reader(1));

        assert_ne!(a.reader_identifier(), b.reader_identifier());
        assert_ne!(a.reader_identifier(), &[0u8; READER_IDENTIFIER_LEN]);
    }

    #[test]
    fn test_begin_authentication_draws_fresh_nonce() {
        let session = Session::new(reader(1));

        let first = session.begin_authentication();
        assert_eq!(session.current_nonce(), first);

        let second = session.begin_authentication();
        assert_ne!(first, second);
        assert_eq!(session.current_nonce(), second);
    }

    #[test]
    fn test_begin_authentication_clears_incoming() {
        let session = Session::new(reader(1));
        session.with_incoming(|incoming| *incoming = Some(vec![0xAA; 8]));

        session.begin_authentication();
        assert_eq!(session.take_incoming(), Err(Error::MissingIncomingData));
    }

    #[test]
    fn test_take_incoming() {
        let session = Session::new(reader(1));
        session.with_incoming(|incoming| *incoming = Some(vec![0x01, 0x02]));

        assert_eq!(session.take_incoming(), Ok(vec![0x01, 0x02]));
        assert_eq!(session.take_incoming(), Err(Error::MissingIncomingData));
    }

    #[test]
    fn test_request_guard_is_exclusive() {
        let session = Session::new(reader(1));

        let guard = session.try_begin_request().unwrap();
        assert!(session.is_request_in_flight());
        assert!(matches!(
            session.clone().try_begin_request(),
            Err(Error::RequestInProgress)
        ));

        drop(guard);
        assert!(!session.is_request_in_flight());
        assert!(session.try_begin_request().is_ok());
    }

    #[test]
    fn test_identity_is_reader_address() {
        let settings = SessionSettings::new().with_max_receive_size(10);
        let a = Session::new(reader(1));
        let b = Session::with_settings(reader(1), settings);
        let c = Session::new(reader(2));

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert!(set.insert(c));
    }

    #[test]
    fn test_session_clone_shares_state() {
        let session1 = Session::new(reader(1));
        let session2 = session1.clone();

        let nonce = session1.begin_authentication();
        assert_eq!(session2.current_nonce(), nonce);
        assert_eq!(session1.reader_identifier(), session2.reader_identifier());
    }
}
