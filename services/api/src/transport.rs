//! The media transport seam.
//!
//! The rest of the service treats a peer connection as an opaque object that
//! negotiates, emits lifecycle events, yields caller utterances, and accepts
//! outbound audio frames. The loopback implementation below is the in-process
//! transport used by the demo binary and the integration tests; a WebRTC
//! stack plugs in behind the same traits.

use std::sync::{Arc, Mutex as StdMutex};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, broadcast, mpsc};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("connection is closed")]
    Closed,
}

/// An SDP-style session description exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp: String,
    pub kind: String,
}

/// The transport's side of a completed negotiation.
#[derive(Debug, Clone)]
pub struct NegotiatedAnswer {
    pub pc_id: String,
    pub sdp: String,
    pub kind: String,
}

/// Lifecycle notifications a connection broadcasts to its observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Media is flowing; the conversation may begin.
    Connected,
    /// The peer dropped; the session should be torn down.
    Disconnected,
    /// The connection was closed, locally or by the peer.
    Closed,
}

/// One negotiated peer connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identifier for this connection, assigned at creation.
    fn pc_id(&self) -> &str;

    /// Applies the client's offer and prepares an answer. Called once.
    async fn initialize(&self, offer: SessionDescription) -> Result<(), TransportError>;

    /// Applies a fresh offer on an already-established connection.
    async fn renegotiate(&self, offer: SessionDescription) -> Result<(), TransportError>;

    /// The answer produced by the last successful (re)negotiation.
    async fn answer(&self) -> Result<NegotiatedAnswer, TransportError>;

    /// Closes the connection and releases its media resources.
    async fn disconnect(&self);

    /// Subscribes to lifecycle events. Subscribe before `initialize` to
    /// observe the `Connected` event.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// The next complete caller utterance, as raw PCM16 mono audio. Returns
    /// `None` once the connection is closed.
    async fn next_utterance(&self) -> Option<Bytes>;

    /// Queues one outbound audio frame for playback to the caller.
    async fn send_audio(&self, frame: Bytes) -> Result<(), TransportError>;
}

/// Creates connections for incoming offers.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn Connection>, TransportError>;
}

const EVENT_CAPACITY: usize = 16;
const UTTERANCE_CAPACITY: usize = 32;

/// An in-process transport that echoes the offer back as its answer.
///
/// Test code drives the caller side through `push_utterance` and inspects
/// playback through `sent_audio`.
pub struct LoopbackConnection {
    pc_id: String,
    events: broadcast::Sender<ConnectionEvent>,
    utterance_tx: StdMutex<Option<mpsc::Sender<Bytes>>>,
    utterance_rx: Mutex<mpsc::Receiver<Bytes>>,
    answer: StdMutex<Option<SessionDescription>>,
    sent_audio: StdMutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl LoopbackConnection {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (utterance_tx, utterance_rx) = mpsc::channel(UTTERANCE_CAPACITY);
        Self {
            pc_id: Uuid::new_v4().to_string(),
            events,
            utterance_tx: StdMutex::new(Some(utterance_tx)),
            utterance_rx: Mutex::new(utterance_rx),
            answer: StdMutex::new(None),
            sent_audio: StdMutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates one complete caller utterance arriving on the media track.
    pub async fn push_utterance(&self, audio: Bytes) -> Result<(), TransportError> {
        let tx = self
            .utterance_tx
            .lock()
            .expect("lock poisoned")
            .clone()
            .ok_or(TransportError::Closed)?;
        tx.send(audio).await.map_err(|_| TransportError::Closed)
    }

    /// Simulates the peer hanging up.
    pub fn close(&self) {
        self.shutdown_channels();
    }

    /// Audio frames queued for playback so far, in send order.
    pub fn sent_audio(&self) -> Vec<Bytes> {
        self.sent_audio.lock().expect("lock poisoned").clone()
    }

    fn shutdown_channels(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender ends the utterance stream for the pipeline.
        self.utterance_tx.lock().expect("lock poisoned").take();
        let _ = self.events.send(ConnectionEvent::Closed);
    }
}

impl Default for LoopbackConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for LoopbackConnection {
    fn pc_id(&self) -> &str {
        &self.pc_id
    }

    async fn initialize(&self, offer: SessionDescription) -> Result<(), TransportError> {
        if offer.sdp.trim().is_empty() {
            return Err(TransportError::Negotiation(
                "offer contained an empty session description".to_string(),
            ));
        }
        *self.answer.lock().expect("lock poisoned") = Some(SessionDescription {
            sdp: offer.sdp,
            kind: "answer".to_string(),
        });
        let _ = self.events.send(ConnectionEvent::Connected);
        Ok(())
    }

    async fn renegotiate(&self, offer: SessionDescription) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut answer = self.answer.lock().expect("lock poisoned");
        if answer.is_none() {
            return Err(TransportError::Negotiation(
                "renegotiation before initial negotiation".to_string(),
            ));
        }
        *answer = Some(SessionDescription {
            sdp: offer.sdp,
            kind: "answer".to_string(),
        });
        Ok(())
    }

    async fn answer(&self) -> Result<NegotiatedAnswer, TransportError> {
        let answer = self
            .answer
            .lock()
            .expect("lock poisoned")
            .clone()
            .ok_or_else(|| {
                TransportError::Negotiation("no negotiation has completed".to_string())
            })?;
        Ok(NegotiatedAnswer {
            pc_id: self.pc_id.clone(),
            sdp: answer.sdp,
            kind: answer.kind,
        })
    }

    async fn disconnect(&self) {
        self.shutdown_channels();
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn next_utterance(&self) -> Option<Bytes> {
        self.utterance_rx.lock().await.recv().await
    }

    async fn send_audio(&self, frame: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent_audio.lock().expect("lock poisoned").push(frame);
        Ok(())
    }
}

/// Builds loopback connections and keeps a handle to each one created.
pub struct LoopbackFactory {
    created: StdMutex<Vec<Arc<LoopbackConnection>>>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self {
            created: StdMutex::new(Vec::new()),
        }
    }

    /// Connections created so far, in creation order.
    pub fn connections(&self) -> Vec<Arc<LoopbackConnection>> {
        self.created.lock().expect("lock poisoned").clone()
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionFactory for LoopbackFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>, TransportError> {
        let conn = Arc::new(LoopbackConnection::new());
        self.created
            .lock()
            .expect("lock poisoned")
            .push(conn.clone());
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(sdp: &str) -> SessionDescription {
        SessionDescription {
            sdp: sdp.to_string(),
            kind: "offer".to_string(),
        }
    }

    #[tokio::test]
    async fn initialize_echoes_offer_and_emits_connected() {
        let conn = LoopbackConnection::new();
        let mut events = conn.events();

        conn.initialize(offer("v=0 caller")).await.unwrap();

        let answer = conn.answer().await.unwrap();
        assert_eq!(answer.pc_id, conn.pc_id());
        assert_eq!(answer.sdp, "v=0 caller");
        assert_eq!(answer.kind, "answer");
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
    }

    #[tokio::test]
    async fn empty_offer_is_a_negotiation_error() {
        let conn = LoopbackConnection::new();
        let err = conn.initialize(offer("   ")).await.unwrap_err();
        assert!(matches!(err, TransportError::Negotiation(_)));
    }

    #[tokio::test]
    async fn renegotiate_requires_prior_negotiation() {
        let conn = LoopbackConnection::new();
        let err = conn.renegotiate(offer("v=0")).await.unwrap_err();
        assert!(matches!(err, TransportError::Negotiation(_)));

        conn.initialize(offer("v=0 first")).await.unwrap();
        conn.renegotiate(offer("v=0 second")).await.unwrap();
        assert_eq!(conn.answer().await.unwrap().sdp, "v=0 second");
    }

    #[tokio::test]
    async fn close_ends_utterance_stream_and_emits_closed() {
        let conn = LoopbackConnection::new();
        conn.initialize(offer("v=0")).await.unwrap();
        let mut events = conn.events();

        conn.push_utterance(Bytes::from_static(b"hi")).await.unwrap();
        conn.close();

        assert_eq!(conn.next_utterance().await, Some(Bytes::from_static(b"hi")));
        assert_eq!(conn.next_utterance().await, None);
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
        assert!(matches!(
            conn.push_utterance(Bytes::from_static(b"late")).await,
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            conn.send_audio(Bytes::from_static(b"late")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let conn = LoopbackConnection::new();
        conn.initialize(offer("v=0")).await.unwrap();
        let mut events = conn.events();

        conn.disconnect().await;
        conn.disconnect().await;

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
        // Only one Closed event for repeated disconnects.
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn factory_records_created_connections() {
        let factory = LoopbackFactory::new();
        let conn = factory.create().await.unwrap();
        let created = factory.connections();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].pc_id(), conn.pc_id());
    }
}
