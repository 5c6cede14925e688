//! The session lifecycle controller.
//!
//! Routes each incoming offer to renegotiation or session creation, owns the
//! session table, tears sessions down when their transport closes, and drains
//! everything at shutdown. One session is one connection plus one pipeline
//! task; the two are registered and removed together so the registry and the
//! session table never disagree.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{Instrument, info, info_span, warn};

use crate::models::OfferRequest;
use crate::pipeline::{Pipeline, PipelineServices, PipelineState};
use crate::registry::ConnectionRegistry;
use crate::transport::{
    ConnectionEvent, ConnectionFactory, NegotiatedAnswer, SessionDescription, TransportError,
};

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("invalid offer: {0}")]
    InvalidOffer(String),
    #[error("no session with pc_id '{0}'")]
    SessionNotFound(String),
    #[error(transparent)]
    Negotiation(#[from] TransportError),
}

struct SessionEntry {
    task: JoinHandle<()>,
    state: Arc<watch::Sender<PipelineState>>,
}

/// State the close monitors need after the controller handle is gone.
struct Shared {
    registry: ConnectionRegistry,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl Shared {
    /// Removes the session's registry entry and table entry together, then
    /// releases the transport and finalizes the pipeline. Idempotent.
    async fn teardown(&self, pc_id: &str) {
        let entry = self.sessions.lock().expect("lock poisoned").remove(pc_id);
        let conn = self.registry.evict(pc_id);

        if let Some(conn) = conn {
            conn.disconnect().await;
        }
        if let Some(entry) = entry {
            entry.task.abort();
            entry.state.send_replace(PipelineState::Stopped);
            info!(%pc_id, "session torn down");
        }
    }
}

pub struct SessionLifecycle {
    shared: Arc<Shared>,
    factory: Arc<dyn ConnectionFactory>,
    services: PipelineServices,
    system_prompt: String,
    shutdown_timeout: Duration,
}

impl SessionLifecycle {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        services: PipelineServices,
        system_prompt: String,
        shutdown_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                registry: ConnectionRegistry::new(),
                sessions: Mutex::new(HashMap::new()),
            }),
            factory,
            services,
            system_prompt,
            shutdown_timeout,
        })
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.shared.registry
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().expect("lock poisoned").len()
    }

    /// A watch on the named session's pipeline phase, if the session exists.
    pub fn session_state(&self, pc_id: &str) -> Option<watch::Receiver<PipelineState>> {
        self.shared
            .sessions
            .lock()
            .expect("lock poisoned")
            .get(pc_id)
            .map(|entry| entry.state.subscribe())
    }

    /// The single entry point for offers: renegotiates when the offer names
    /// a live session, otherwise creates a fresh one.
    pub async fn handle_offer(&self, offer: OfferRequest) -> Result<NegotiatedAnswer, OfferError> {
        let description = validate(&offer)?;

        if let Some(pc_id) = offer.pc_id.as_deref().filter(|id| !id.trim().is_empty()) {
            let conn = self
                .shared
                .registry
                .lookup(pc_id)
                .ok_or_else(|| OfferError::SessionNotFound(pc_id.to_string()))?;
            conn.renegotiate(description).await?;
            let answer = conn.answer().await?;
            info!(%pc_id, "session renegotiated");
            return Ok(answer);
        }

        self.create_session(description).await
    }

    async fn create_session(
        &self,
        description: SessionDescription,
    ) -> Result<NegotiatedAnswer, OfferError> {
        let conn = self.factory.create().await?;
        // Subscribe before initialize so neither consumer can miss the
        // Connected event.
        let pipeline_events = conn.events();
        let monitor_events = conn.events();

        conn.initialize(description).await?;
        let answer = conn.answer().await?;
        let pc_id = answer.pc_id.clone();

        let pipeline = Pipeline::new(conn.clone(), self.services.clone(), &self.system_prompt);
        let state = pipeline.state_handle();
        let task = tokio::spawn(
            pipeline
                .run(pipeline_events)
                .instrument(info_span!("session", %pc_id)),
        );

        {
            let mut sessions = self.shared.sessions.lock().expect("lock poisoned");
            if let Some(stale) = sessions.insert(pc_id.clone(), SessionEntry { task, state }) {
                warn!(%pc_id, "replacing a stale session entry with the same id");
                stale.task.abort();
                stale.state.send_replace(PipelineState::Stopped);
            }
        }
        self.shared.registry.register(conn.clone());
        spawn_close_monitor(self.shared.clone(), pc_id.clone(), monitor_events);

        info!(%pc_id, "session created");
        Ok(answer)
    }

    /// Forcibly tears one session down.
    pub async fn teardown(&self, pc_id: &str) {
        self.shared.teardown(pc_id).await;
    }

    /// Drains every session: transports are asked to close concurrently
    /// under the shutdown deadline, then pipeline tasks are finalized.
    pub async fn shutdown(&self) {
        let conns = self.shared.registry.drain();
        let entries: Vec<SessionEntry> = self
            .shared
            .sessions
            .lock()
            .expect("lock poisoned")
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        info!(sessions = entries.len(), "draining sessions");

        let closing = futures_util::future::join_all(conns.iter().map(|conn| conn.disconnect()));
        if timeout(self.shutdown_timeout, closing).await.is_err() {
            warn!("timed out waiting for transports to close");
        }

        for entry in entries {
            entry.task.abort();
            entry.state.send_replace(PipelineState::Stopped);
        }
    }
}

fn validate(offer: &OfferRequest) -> Result<SessionDescription, OfferError> {
    let sdp = offer
        .sdp
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OfferError::InvalidOffer("missing session description".to_string()))?;
    let kind = offer
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OfferError::InvalidOffer("missing offer type".to_string()))?;
    Ok(SessionDescription {
        sdp: sdp.to_string(),
        kind: kind.to_string(),
    })
}

fn spawn_close_monitor(
    shared: Arc<Shared>,
    pc_id: String,
    mut events: broadcast::Receiver<ConnectionEvent>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Closed | ConnectionEvent::Disconnected) => break,
                Ok(ConnectionEvent::Connected) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
        shared.teardown(&pc_id).await;
    });
}
