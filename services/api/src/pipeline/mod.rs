//! The per-session conversational pipeline.
//!
//! One pipeline task owns one connection's conversation: it waits for media,
//! speaks a greeting, then loops turning caller utterances into spoken
//! replies until the connection goes away. Its phase is published through a
//! watch channel so the lifecycle layer can observe and finalize it.

mod cycle;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use voxbridge_core::context::ConversationContext;
use voxbridge_core::reasoner::Reasoner;
use voxbridge_core::tools::ToolBridge;

use crate::pipeline::cycle::TurnInput;
use crate::services::{Synthesizer, Transcriber};
use crate::transport::{Connection, ConnectionEvent};

/// The phase of one session's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, waiting for media to start flowing.
    Idle,
    /// Conversing.
    Running,
    /// Winding down after a close or disconnect was observed.
    Cancelling,
    /// Fully finished. Terminal.
    Stopped,
}

/// The shared service handles every pipeline runs against.
#[derive(Clone)]
pub struct PipelineServices {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub reasoner: Arc<dyn Reasoner>,
    pub tools: Arc<ToolBridge>,
    /// Per-call deadline for each external service within a turn.
    pub call_timeout: Duration,
}

enum Wake {
    Ignore,
    Close,
    Utterance(Bytes),
}

pub struct Pipeline {
    conn: Arc<dyn Connection>,
    services: PipelineServices,
    ctx: ConversationContext,
    state: Arc<watch::Sender<PipelineState>>,
}

impl Pipeline {
    pub fn new(conn: Arc<dyn Connection>, services: PipelineServices, system_prompt: &str) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            conn,
            services,
            ctx: ConversationContext::new(system_prompt),
            state: Arc::new(state),
        }
    }

    /// A handle the lifecycle layer uses to observe this pipeline's phase
    /// and to force it to `Stopped` when the task is aborted.
    pub fn state_handle(&self) -> Arc<watch::Sender<PipelineState>> {
        self.state.clone()
    }

    /// Drives the session to completion. Always leaves the published state
    /// at `Stopped` before returning.
    pub async fn run(mut self, mut events: broadcast::Receiver<ConnectionEvent>) {
        if !wait_for_connected(&mut events).await {
            info!("connection ended before media started");
            self.state.send_replace(PipelineState::Stopped);
            return;
        }
        self.state.send_replace(PipelineState::Running);
        info!("media connected, starting conversation");

        if self.guarded_turn(&mut events, TurnInput::Greeting).await {
            loop {
                let wake = tokio::select! {
                    event = events.recv() => match event {
                        Ok(ConnectionEvent::Closed | ConnectionEvent::Disconnected) => Wake::Close,
                        Ok(ConnectionEvent::Connected) => Wake::Ignore,
                        Err(broadcast::error::RecvError::Closed) => Wake::Close,
                        Err(broadcast::error::RecvError::Lagged(_)) => Wake::Ignore,
                    },
                    utterance = self.conn.next_utterance() => match utterance {
                        Some(audio) => Wake::Utterance(audio),
                        None => Wake::Close,
                    },
                };
                match wake {
                    Wake::Ignore => {}
                    Wake::Close => {
                        self.state.send_replace(PipelineState::Cancelling);
                        break;
                    }
                    Wake::Utterance(audio) => {
                        if !self
                            .guarded_turn(&mut events, TurnInput::Utterance(audio))
                            .await
                        {
                            break;
                        }
                    }
                }
            }
        }

        self.state.send_replace(PipelineState::Stopped);
        info!("pipeline stopped");
    }

    /// Runs one turn, abandoning it mid-flight if the connection closes.
    /// Returns false once the pipeline should wind down.
    async fn guarded_turn(
        &mut self,
        events: &mut broadcast::Receiver<ConnectionEvent>,
        input: TurnInput,
    ) -> bool {
        let Pipeline {
            conn,
            services,
            ctx,
            state,
        } = self;
        tokio::select! {
            _ = wait_for_close(events) => {
                state.send_replace(PipelineState::Cancelling);
                false
            }
            result = cycle::run_turn(services, conn.as_ref(), ctx, input) => {
                if let Err(e) = result {
                    warn!(error = %e, "turn aborted");
                }
                true
            }
        }
    }
}

/// Waits for the first `Connected` event. Returns false if the connection
/// ended first.
async fn wait_for_connected(events: &mut broadcast::Receiver<ConnectionEvent>) -> bool {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Connected) => return true,
            Ok(ConnectionEvent::Closed | ConnectionEvent::Disconnected) => return false,
            Err(broadcast::error::RecvError::Closed) => return false,
            Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
}

/// Resolves once the connection closes or disconnects.
async fn wait_for_close(events: &mut broadcast::Receiver<ConnectionEvent>) {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Closed | ConnectionEvent::Disconnected) => return,
            Ok(ConnectionEvent::Connected) => {}
            Err(broadcast::error::RecvError::Closed) => return,
            Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;

    use voxbridge_core::reasoner::ReasonerOutcome;
    use voxbridge_core::tools::ToolSpec;

    use crate::services::{SynthesisError, TranscriptionError};
    use crate::transport::LoopbackConnection;

    struct Silent;

    #[async_trait]
    impl Transcriber for Silent {
        async fn transcribe(&self, _audio: Bytes) -> Result<String, TranscriptionError> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl Synthesizer for Silent {
        async fn synthesize(&self, _text: &str) -> Result<Bytes, SynthesisError> {
            Ok(Bytes::new())
        }
    }

    #[async_trait]
    impl Reasoner for Silent {
        async fn decide(
            &self,
            _ctx: &ConversationContext,
            _tools: &[ToolSpec],
        ) -> anyhow::Result<ReasonerOutcome> {
            Ok(ReasonerOutcome::Answer("ok".to_string()))
        }

        async fn conclude(&self, _ctx: &ConversationContext) -> anyhow::Result<String> {
            Ok("ok".to_string())
        }
    }

    fn silent_services() -> PipelineServices {
        PipelineServices {
            transcriber: Arc::new(Silent),
            synthesizer: Arc::new(Silent),
            reasoner: Arc::new(Silent),
            tools: Arc::new(ToolBridge::new(Vec::new(), HashMap::new()).unwrap()),
            call_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn stops_if_connection_closes_before_media() {
        let conn = Arc::new(LoopbackConnection::new());
        let pipeline = Pipeline::new(conn.clone(), silent_services(), "sys");
        let mut state = pipeline.state_handle().subscribe();
        let events = conn.events();

        conn.close();
        pipeline.run(events).await;

        assert_eq!(*state.borrow_and_update(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn close_after_connect_stops_the_loop() {
        let conn = Arc::new(LoopbackConnection::new());
        let pipeline = Pipeline::new(conn.clone(), silent_services(), "sys");
        let state = pipeline.state_handle().subscribe();
        let events = conn.events();

        conn.initialize(crate::transport::SessionDescription {
            sdp: "v=0".to_string(),
            kind: "offer".to_string(),
        })
        .await
        .unwrap();

        let task = tokio::spawn(pipeline.run(events));
        conn.close();
        task.await.unwrap();

        assert_eq!(*state.borrow(), PipelineState::Stopped);
    }
}
