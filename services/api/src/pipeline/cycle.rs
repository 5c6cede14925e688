//! One conversational turn: transcribe, reason (with at most one tool
//! round-trip), record, synthesize, play.

use anyhow::{Context as _, Result};
use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use voxbridge_core::context::ConversationContext;
use voxbridge_core::reasoner::ReasonerOutcome;
use voxbridge_core::tools::ToolError;

use crate::audio;
use crate::pipeline::PipelineServices;
use crate::transport::Connection;

/// Spoken when the reasoning service fails or times out mid-turn.
const APOLOGY_REPLY: &str = "I'm sorry, I'm having trouble thinking right now. \
Could you say that again?";

/// Recorded as the tool output when an invocation fails, so the reasoner can
/// acknowledge the failure without seeing backend details.
const TOOL_FAILURE_RESULT: &str =
    "The tool could not complete the request. Tell the caller you could not look that up.";

/// What triggered this turn.
pub(crate) enum TurnInput {
    Greeting,
    Utterance(Bytes),
}

/// Runs one full turn. Recoverable stage failures are logged and swallowed
/// so the session survives them; only transport failures propagate.
pub(crate) async fn run_turn(
    services: &PipelineServices,
    conn: &dyn Connection,
    ctx: &mut ConversationContext,
    input: TurnInput,
) -> Result<()> {
    // A greeting turn reasons over the system prompt alone, so the
    // assistant speaks without a preceding user turn.
    if let TurnInput::Utterance(audio) = input {
        let transcribed = timeout(
            services.call_timeout,
            services.transcriber.transcribe(audio),
        )
        .await;
        let user_text = match transcribed {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "transcription failed, skipping utterance");
                return Ok(());
            }
            Err(_) => {
                warn!("transcription timed out, skipping utterance");
                return Ok(());
            }
        };

        if user_text.trim().is_empty() {
            debug!("utterance transcribed to nothing, skipping turn");
            return Ok(());
        }
        ctx.push_user(user_text);
    }

    let reply = reason(services, ctx).await;
    // The text turn is committed before synthesis so a synthesis failure
    // never loses what the assistant decided to say.
    ctx.push_assistant(reply.clone());

    let pcm = match timeout(services.call_timeout, services.synthesizer.synthesize(&reply)).await {
        Ok(Ok(pcm)) => pcm,
        Ok(Err(e)) => {
            warn!(error = %e, "synthesis failed, turn stays text-only");
            return Ok(());
        }
        Err(_) => {
            warn!("synthesis timed out, turn stays text-only");
            return Ok(());
        }
    };

    for frame in audio::frames(&pcm) {
        conn.send_audio(frame)
            .await
            .context("sending synthesized audio to transport")?;
    }
    Ok(())
}

/// Produces the assistant's reply text, running at most one tool round-trip.
async fn reason(services: &PipelineServices, ctx: &mut ConversationContext) -> String {
    let tools = services.tools.declarations();
    let outcome = match timeout(services.call_timeout, services.reasoner.decide(ctx, tools)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(error = %e, "reasoning failed");
            return APOLOGY_REPLY.to_string();
        }
        Err(_) => {
            warn!("reasoning timed out");
            return APOLOGY_REPLY.to_string();
        }
    };

    let call = match outcome {
        ReasonerOutcome::Answer(text) => return text,
        ReasonerOutcome::ToolRequest(call) => call,
    };

    info!(tool = %call.name, "reasoner requested a tool invocation");
    let output = match timeout(
        services.call_timeout,
        services.tools.invoke(&call.name, &call.query),
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(ToolError::Unknown(name))) => {
            // Construction-time checks make this a configuration bug.
            error!(tool = %name, "reasoner requested a tool that is not registered");
            TOOL_FAILURE_RESULT.to_string()
        }
        Ok(Err(e @ ToolError::Execution { .. })) => {
            warn!(error = %e, "tool invocation failed");
            TOOL_FAILURE_RESULT.to_string()
        }
        Err(_) => {
            warn!(tool = %call.name, "tool invocation timed out");
            TOOL_FAILURE_RESULT.to_string()
        }
    };
    ctx.push_tool_result(call, output);

    match timeout(services.call_timeout, services.reasoner.conclude(ctx)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "reasoning after tool round-trip failed");
            APOLOGY_REPLY.to_string()
        }
        Err(_) => {
            warn!("reasoning after tool round-trip timed out");
            APOLOGY_REPLY.to_string()
        }
    }
}
