//! In-memory transport for testing panels without an OSDP stack
//!
//! Records every call, answers with configurable results and lets a test play
//! the reader by injecting replies, either directly or from a responder
//! closure that runs whenever a manufacturer command is sent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use pkoc_core::{FragmentDescriptor, MessageId};
use pkoc_types::{ReaderAddress, VendorCode};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{Error, Result};
use crate::{ManufacturerReply, Transport};

const REPLY_CAPACITY: usize = 64;

type Responder = dyn Fn(&MockCall) -> Vec<ManufacturerReply> + Send + Sync;

/// A call made through [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ManufacturerCommand {
        reader: ReaderAddress,
        vendor_code: VendorCode,
        payload: Bytes,
        max_fragment_size: u16,
        timeout: Duration,
    },
    ReceiveBufferSize {
        reader: ReaderAddress,
        size: u16,
    },
    KeepReaderActive {
        reader: ReaderAddress,
        milliseconds: u16,
    },
}

/// Mock transport; clones share the same state
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    calls: Mutex<Vec<MockCall>>,
    replies: broadcast::Sender<ManufacturerReply>,

    send_accepted: Mutex<bool>,
    receive_buffer_accepted: Mutex<bool>,
    keep_active_accepted: Mutex<bool>,

    /// Returned by the next call instead of its configured result
    next_error: Mutex<Option<Error>>,

    responder: Mutex<Option<Arc<Responder>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (replies, _) = broadcast::channel(REPLY_CAPACITY);

        Self {
            inner: Arc::new(MockInner {
                calls: Mutex::new(Vec::new()),
                replies,
                send_accepted: Mutex::new(true),
                receive_buffer_accepted: Mutex::new(true),
                keep_active_accepted: Mutex::new(true),
                next_error: Mutex::new(None),
                responder: Mutex::new(None),
            }),
        }
    }

    /// Result returned by `send_manufacturer_command`
    pub fn set_send_accepted(&self, accepted: bool) {
        *self.inner.send_accepted.lock() = accepted;
    }

    /// Result returned by `set_receive_buffer_size`
    pub fn set_receive_buffer_accepted(&self, accepted: bool) {
        *self.inner.receive_buffer_accepted.lock() = accepted;
    }

    /// Result returned by `set_keep_reader_active`
    pub fn set_keep_active_accepted(&self, accepted: bool) {
        *self.inner.keep_active_accepted.lock() = accepted;
    }

    /// Fail the next call, whichever it is, with `error`
    pub fn fail_next(&self, error: Error) {
        *self.inner.next_error.lock() = Some(error);
    }

    /// Play the reader: replies returned by `responder` are delivered after
    /// each accepted manufacturer command
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&MockCall) -> Vec<ManufacturerReply> + Send + Sync + 'static,
    {
        *self.inner.responder.lock() = Some(Arc::new(responder));
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls.lock().clone()
    }

    /// Get recorded manufacturer command payloads
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::ManufacturerCommand { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    /// Inject a reply; returns the number of subscribers that will see it
    pub fn deliver(&self, reply: ManufacturerReply) -> usize {
        trace!(
            "Mock reply from {} [{}]: {:02X?}",
            reply.reader,
            reply.vendor_code,
            reply.payload.as_ref()
        );
        self.inner.replies.send(reply).unwrap_or(0)
    }

    /// Inject an authentication response the way a reader sends it: the
    /// identifier byte of `message` is stripped, the rest is split into
    /// fragments of at most `max_fragment_size` data bytes, and each fragment
    /// is delivered as `0xE2 || fragment header || data`
    ///
    /// # Errors
    ///
    /// Returns the fragmentation error if `message` cannot be split.
    pub fn deliver_fragmented(
        &self,
        reader: ReaderAddress,
        message: &[u8],
        max_fragment_size: usize,
    ) -> pkoc_core::Result<usize> {
        let body = message.get(1..).unwrap_or_default();
        let fragments = fragment_replies(reader, body, max_fragment_size)?;
        let count = fragments.len();
        for reply in fragments {
            self.deliver(reply);
        }
        Ok(count)
    }

    fn record(&self, call: MockCall) -> Result<()> {
        trace!("Mock call: {:?}", call);
        self.inner.calls.lock().push(call);

        match self.inner.next_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.inner.calls.lock().len())
            .field("subscribers", &self.inner.replies.receiver_count())
            .finish()
    }
}

/// Build the fragment replies carrying an authentication response body
pub fn fragment_replies(
    reader: ReaderAddress,
    body: &[u8],
    max_fragment_size: usize,
) -> pkoc_core::Result<Vec<ManufacturerReply>> {
    Ok(FragmentDescriptor::split(body, max_fragment_size)?
        .iter()
        .map(|fragment| {
            let encoded = fragment.encode();
            let mut payload = BytesMut::with_capacity(1 + encoded.len());
            payload.put_u8(MessageId::AuthenticationResponse.into());
            payload.put_slice(&encoded);
            ManufacturerReply::pkoc(reader, payload.freeze())
        })
        .collect())
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_manufacturer_command(
        &self,
        reader: ReaderAddress,
        vendor_code: VendorCode,
        payload: Bytes,
        max_fragment_size: u16,
        timeout: Duration,
    ) -> Result<bool> {
        let call = MockCall::ManufacturerCommand {
            reader,
            vendor_code,
            payload,
            max_fragment_size,
            timeout,
        };
        self.record(call.clone())?;

        let accepted = *self.inner.send_accepted.lock();
        if accepted {
            let responder = self.inner.responder.lock().clone();
            if let Some(responder) = responder {
                for reply in responder(&call) {
                    self.deliver(reply);
                }
            }
        }

        Ok(accepted)
    }

    async fn set_receive_buffer_size(&self, reader: ReaderAddress, size: u16) -> Result<bool> {
        self.record(MockCall::ReceiveBufferSize { reader, size })?;
        Ok(*self.inner.receive_buffer_accepted.lock())
    }

    async fn set_keep_reader_active(
        &self,
        reader: ReaderAddress,
        milliseconds: u16,
    ) -> Result<bool> {
        self.record(MockCall::KeepReaderActive {
            reader,
            milliseconds,
        })?;
        Ok(*self.inner.keep_active_accepted.lock())
    }

    fn subscribe(&self) -> broadcast::Receiver<ManufacturerReply> {
        self.inner.replies.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn reader() -> ReaderAddress {
        ReaderAddress::new(Uuid::from_u128(3), 1)
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mock = MockTransport::new();

        assert!(mock.set_receive_buffer_size(reader(), 1024).await.unwrap());
        assert!(mock.set_keep_reader_active(reader(), 3000).await.unwrap());
        assert!(
            mock.send_manufacturer_command(
                reader(),
                VendorCode::PKOC,
                Bytes::from_static(&[0xE4]),
                128,
                Duration::from_secs(3),
            )
            .await
            .unwrap()
        );

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            MockCall::ReceiveBufferSize {
                reader: reader(),
                size: 1024
            }
        );
        assert_eq!(mock.sent_payloads(), vec![Bytes::from_static(&[0xE4])]);

        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_configured_results() {
        let mock = MockTransport::new();
        mock.set_keep_active_accepted(false);
        mock.set_send_accepted(false);

        assert!(!mock.set_keep_reader_active(reader(), 3000).await.unwrap());
        assert!(
            !mock
                .send_manufacturer_command(
                    reader(),
                    VendorCode::PKOC,
                    Bytes::new(),
                    128,
                    Duration::ZERO
                )
                .await
                .unwrap()
        );

        mock.fail_next(Error::NotConnected);
        assert!(matches!(
            mock.set_receive_buffer_size(reader(), 1).await,
            Err(Error::NotConnected)
        ));
        assert!(mock.set_receive_buffer_size(reader(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_deliver() {
        let mock = MockTransport::new();
        assert_eq!(mock.deliver(ManufacturerReply::pkoc(reader(), vec![0xE4])), 0);

        let mut replies = mock.subscribe();
        assert_eq!(mock.deliver(ManufacturerReply::pkoc(reader(), vec![0xE4])), 1);

        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.vendor_code, VendorCode::PKOC);
        assert_eq!(reply.payload.as_ref(), &[0xE4]);
    }

    #[tokio::test]
    async fn test_mock_deliver_fragmented() {
        let mock = MockTransport::new();
        let mut replies = mock.subscribe();

        let mut message = vec![0xE2];
        message.extend(0u8..10);
        assert_eq!(mock.deliver_fragmented(reader(), &message, 4).unwrap(), 3);

        let first = replies.recv().await.unwrap();
        assert_eq!(
            first.payload.as_ref(),
            &[0xE2, 0x0A, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x01, 0x02, 0x03]
        );

        let second = replies.recv().await.unwrap();
        let fragment = FragmentDescriptor::decode(&second.payload[1..]).unwrap();
        assert_eq!(fragment.offset, 4);

        let third = replies.recv().await.unwrap();
        let fragment = FragmentDescriptor::decode(&third.payload[1..]).unwrap();
        assert!(fragment.is_last());
    }

    #[tokio::test]
    async fn test_mock_responder() {
        let mock = MockTransport::new();
        let mut replies = mock.subscribe();

        mock.respond_with(|call| match call {
            MockCall::ManufacturerCommand { reader, .. } => {
                vec![ManufacturerReply::pkoc(*reader, vec![0xFE, 0x02])]
            }
            _ => Vec::new(),
        });

        mock.send_manufacturer_command(
            reader(),
            VendorCode::PKOC,
            Bytes::from_static(&[0xE1]),
            128,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.reader, reader());
        assert_eq!(reply.payload.as_ref(), &[0xFE, 0x02]);
    }
}
