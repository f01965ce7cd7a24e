//! PKOC control panel
//!
//! Turns the event-driven transport into a request/response API. Replies are
//! routed on a background task: authentication response fragments are
//! reassembled into the owning session and handed to the waiting request,
//! card present and reader error replies are published as [`PanelEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace, warn};

use pkoc_core::constants::PROTOCOL_VERSION;
use pkoc_core::fragment::{self, FragmentDescriptor};
use pkoc_core::{
    AuthenticationRequest, AuthenticationResponse, CardPresentResponse, MessageId,
    ReaderErrorResponse, RequestGuard, Session,
};
use pkoc_transport::{ManufacturerReply, Transport};
use pkoc_types::{ReaderAddress, VendorCode};

use crate::error::{Error, Result};
use crate::event::PanelEvent;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Sequence number sent with every authentication request
const TRANSACTION_SEQUENCE: u8 = 0;

/// PKOC control panel
///
/// # Examples
///
/// ```no_run
/// use pkoc::{ControlPanel, ReaderAddress, Session};
/// use pkoc_transport::MockTransport;
/// use uuid::Uuid;
///
/// #[tokio::main]
/// async fn main() -> pkoc::Result<()> {
///     let panel = ControlPanel::new(MockTransport::new());
///     let session = Session::new(ReaderAddress::new(Uuid::new_v4(), 0));
///
///     if panel.initialize(&session).await? {
///         let response = panel.authentication_request(&session).await?;
///         response.verify()?;
///         println!("Credential {}", hex::encode(response.public_key()));
///     }
///     Ok(())
/// }
/// ```
pub struct ControlPanel<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    router: JoinHandle<()>,
}

struct Shared<T> {
    transport: T,
    registry: Mutex<HashMap<ReaderAddress, Registration>>,

    /// Serializes `initialize` end to end
    init_lock: tokio::sync::Mutex<()>,

    events: broadcast::Sender<PanelEvent>,

    /// Tags each request so a finished one only disarms its own waiter
    next_request: AtomicU64,
}

struct Registration {
    session: Session,

    /// Completion channel of the request in flight, if any
    waiter: Option<Waiter>,
}

struct Waiter {
    request: u64,
    tx: oneshot::Sender<Vec<u8>>,
}

impl<T: Transport + 'static> ControlPanel<T> {
    /// Create a panel and start routing replies from `transport`
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(transport: T) -> Self {
        Self::with_event_capacity(transport, DEFAULT_EVENT_CAPACITY)
    }

    /// Create a panel whose event channel holds up to `capacity` events
    ///
    /// Subscribers that fall further behind miss the oldest events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or if called outside of a Tokio runtime.
    pub fn with_event_capacity(transport: T, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let replies = transport.subscribe();

        let shared = Arc::new(Shared {
            transport,
            registry: Mutex::new(HashMap::new()),
            init_lock: tokio::sync::Mutex::new(()),
            events,
            next_request: AtomicU64::new(0),
        });

        let router = tokio::spawn(route_replies(shared.clone(), replies));

        Self { shared, router }
    }

    /// Configure the reader behind `session` and register the session
    ///
    /// Both transport settings are always sent. Returns `Ok(false)` if the
    /// reader refused either one, in which case the session is not registered.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if a session with the same reader is registered
    /// - [`Error::Transport`] if the transport fails
    pub async fn initialize(&self, session: &Session) -> Result<bool> {
        let _init = self.shared.init_lock.lock().await;
        let reader = session.reader();

        if self.shared.registry.lock().contains_key(&reader) {
            return Err(Error::AlreadyInitialized(reader));
        }

        let settings = session.settings();
        debug!(
            "{}: initializing (receive size {}, keep active {} ms)",
            reader,
            settings.max_receive_size(),
            settings.card_read_timeout_ms()
        );

        let receive_size = self
            .shared
            .transport
            .set_receive_buffer_size(reader, settings.max_receive_size())
            .await?;
        let keep_active = self
            .shared
            .transport
            .set_keep_reader_active(reader, settings.card_read_timeout_ms())
            .await?;

        if !(receive_size && keep_active) {
            warn!(
                "{}: reader refused settings (receive size: {}, keep active: {})",
                reader, receive_size, keep_active
            );
            return Ok(false);
        }

        self.shared.registry.lock().insert(
            reader,
            Registration {
                session: session.clone(),
                waiter: None,
            },
        );

        info!("{}: initialized", reader);
        Ok(true)
    }

    /// Remove a session; a request in flight on it fails with [`Error::Cancelled`]
    pub fn unregister(&self, session: &Session) -> bool {
        let removed = self.shared.registry.lock().remove(&session.reader()).is_some();
        if removed {
            debug!("{}: unregistered", session.reader());
        }
        removed
    }

    pub fn is_initialized(&self, session: &Session) -> bool {
        self.shared.registry.lock().contains_key(&session.reader())
    }

    /// Challenge the credential in front of the reader
    ///
    /// Sends an authentication request carrying a fresh nonce and waits, at
    /// most the session's card read timeout counted from the send, for the
    /// reassembled response. The signature is not checked here; call
    /// [`AuthenticationResponse::verify`] on the result.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is not registered
    /// - [`Error::Core`] with `RequestInProgress` if the session is already busy,
    ///   or a decode error for a malformed response
    /// - [`Error::CommandRejected`] if the reader did not accept the request
    /// - [`Error::Timeout`] if no complete response arrived in time
    /// - [`Error::Cancelled`] if the session was unregistered meanwhile
    pub async fn authentication_request(&self, session: &Session) -> Result<AuthenticationResponse> {
        let reader = session.reader();
        let (tx, rx) = oneshot::channel();

        let pending = {
            let mut registry = self.shared.registry.lock();
            let registration = registry
                .get_mut(&reader)
                .ok_or(Error::NotInitialized(reader))?;

            let claim = registration.session.try_begin_request()?;
            let request = self.shared.next_request.fetch_add(1, Ordering::Relaxed);
            registration.waiter = Some(Waiter { request, tx });

            PendingRequest {
                registry: &self.shared.registry,
                reader,
                request,
                claim,
            }
        };

        let session = pending.claim.session().clone();
        let settings = *session.settings();

        let nonce = session.begin_authentication();
        let nonce = Bytes::copy_from_slice(&nonce);
        let request = AuthenticationRequest::new(
            PROTOCOL_VERSION,
            *session.reader_identifier(),
            Some(nonce.clone()),
            Some(TRANSACTION_SEQUENCE),
        )?;
        let payload = request.encode();

        debug!("{}: sending authentication request", reader);
        trace!("{}: request payload {}", reader, hex::encode_upper(&payload));

        let start = Instant::now();
        let accepted = self
            .shared
            .transport
            .send_manufacturer_command(
                reader,
                VendorCode::PKOC,
                payload,
                settings.max_fragment_send_size(),
                settings.card_read_timeout(),
            )
            .await?;
        if !accepted {
            warn!("{}: authentication request rejected", reader);
            return Err(Error::CommandRejected(reader));
        }

        let buffer = match timeout_at(start + settings.card_read_timeout(), rx).await {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(_)) => return Err(Error::Cancelled(reader)),
            Err(_) => {
                warn!(
                    "{}: no authentication response within {:?}",
                    reader,
                    settings.card_read_timeout()
                );
                return Err(Error::Timeout {
                    reader,
                    after: settings.card_read_timeout(),
                });
            }
        };
        drop(pending);

        let mut message = Vec::with_capacity(1 + buffer.len());
        message.push(MessageId::AuthenticationResponse.into());
        message.extend_from_slice(&buffer);
        trace!("{}: response payload {}", reader, hex::encode_upper(&message));

        let mut response = AuthenticationResponse::decode(&message)?;
        if response.transaction_identifier().is_none() {
            response = response.with_transaction_identifier(nonce)?;
        }

        debug!(
            "{}: authentication response received after {:?}",
            reader,
            start.elapsed()
        );
        Ok(response)
    }

    /// Route one reply as the background task does
    pub fn route_reply(&self, reply: ManufacturerReply) {
        self.shared.route_reply(&reply);
    }

    /// Subscribe to card present and reader error events
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.shared.events.subscribe()
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}

impl<T: Transport + 'static> Drop for ControlPanel<T> {
    fn drop(&mut self) {
        self.router.abort();
    }
}

impl<T: Transport + 'static> std::fmt::Debug for ControlPanel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPanel")
            .field("sessions", &self.shared.registry.lock().len())
            .field("subscribers", &self.shared.events.receiver_count())
            .finish()
    }
}

/// In-flight request: disarms its waiter, then releases the session claim
///
/// The session may have been unregistered and registered again meanwhile,
/// so only a waiter carrying this request's tag is removed.
struct PendingRequest<'a> {
    registry: &'a Mutex<HashMap<ReaderAddress, Registration>>,
    reader: ReaderAddress,
    request: u64,
    claim: RequestGuard,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if let Some(registration) = registry.get_mut(&self.reader) {
            if registration
                .waiter
                .as_ref()
                .is_some_and(|waiter| waiter.request == self.request)
            {
                registration.waiter = None;
            }
        }
    }
}

async fn route_replies<T: Transport>(
    shared: Arc<Shared<T>>,
    mut replies: broadcast::Receiver<ManufacturerReply>,
) {
    loop {
        match replies.recv().await {
            Ok(reply) => shared.route_reply(&reply),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Reply router lagged, {} replies dropped", missed);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Reply stream closed, router stopping");
                break;
            }
        }
    }
}

impl<T> Shared<T> {
    fn route_reply(&self, reply: &ManufacturerReply) {
        let reader = reply.reader;

        if !reply.vendor_code.is_pkoc() {
            trace!("{}: ignoring reply for vendor {}", reader, reply.vendor_code);
            return;
        }

        let Some(&identifier) = reply.payload.first() else {
            trace!("{}: ignoring empty reply", reader);
            return;
        };

        let session = match self.registry.lock().get(&reader) {
            Some(registration) => registration.session.clone(),
            None => {
                trace!("{}: ignoring reply for unknown session", reader);
                return;
            }
        };

        trace!("{}: reply {}", reader, hex::encode_upper(&reply.payload));

        match MessageId::try_from(identifier) {
            Ok(MessageId::CardPresentResponse) => {
                match CardPresentResponse::decode(&reply.payload) {
                    Ok(response) => self.publish(PanelEvent::CardPresented { reader, response }),
                    Err(e) => warn!("{}: discarding card present response: {}", reader, e),
                }
            }
            Ok(MessageId::AuthenticationResponse) => {
                self.accept_fragment(&session, &reply.payload[1..]);
            }
            Ok(MessageId::ReaderErrorResponse) => {
                match ReaderErrorResponse::decode(&reply.payload) {
                    Ok(response) => {
                        warn!("{}: reader error {:02X?}", reader, response.error().as_ref());
                        self.publish(PanelEvent::ReaderErrorReported { reader, response });
                    }
                    Err(e) => warn!("{}: discarding reader error response: {}", reader, e),
                }
            }
            Ok(MessageId::TransactionRefreshResponse) => {
                debug!("{}: transaction refresh requested", reader);
            }
            Ok(other) => trace!("{}: ignoring {}", reader, other),
            Err(_) => trace!("{}: ignoring unknown message 0x{:02X}", reader, identifier),
        }
    }

    fn accept_fragment(&self, session: &Session, body: &[u8]) {
        let reader = session.reader();

        let complete = FragmentDescriptor::decode(body)
            .and_then(|descriptor| fragment::reassemble(session, &descriptor));
        match complete {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!("{}: discarding authentication response fragment: {}", reader, e);
                return;
            }
        }

        let buffer = match session.take_incoming() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("{}: {}", reader, e);
                return;
            }
        };

        let waiter = self
            .registry
            .lock()
            .get_mut(&reader)
            .and_then(|registration| registration.waiter.take());
        match waiter {
            Some(waiter) => {
                if waiter.tx.send(buffer).is_err() {
                    debug!("{}: request gave up before the response completed", reader);
                }
            }
            None => warn!("{}: authentication response with no request waiting", reader),
        }
    }

    fn publish(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}
