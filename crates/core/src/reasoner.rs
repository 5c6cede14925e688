//! The reasoning collaborator: decides, per user turn, whether to answer
//! directly or to request one tool invocation first.
//!
//! The follow-up call after a tool round-trip offers no tools, so a single
//! user turn can never trigger more than one round-trip.

use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use tracing::debug;

use crate::context::{ConversationContext, ToolCall, Turn};
use crate::tools::ToolSpec;

/// The two possible outcomes of the reasoner's first pass over a user turn.
#[derive(Debug, Clone)]
pub enum ReasonerOutcome {
    /// A final assistant message, ready for synthesis.
    Answer(String),
    /// A tool must be invoked before the reasoner can answer.
    ToolRequest(ToolCall),
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// First pass: sees the full context and the registered tool
    /// declarations, and either answers or requests a tool invocation.
    async fn decide(
        &self,
        ctx: &ConversationContext,
        tools: &[ToolSpec],
    ) -> Result<ReasonerOutcome>;

    /// Follow-up pass once the tool-result turn has been appended. Must
    /// produce a final assistant message.
    async fn conclude(&self, ctx: &ConversationContext) -> Result<String>;
}

/// A `Reasoner` over any OpenAI-compatible chat completion API.
pub struct OpenAiReasoner {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReasoner {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn decide(
        &self,
        ctx: &ConversationContext,
        tools: &[ToolSpec],
    ) -> Result<ReasonerOutcome> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(to_chat_messages(ctx)?);
        if !tools.is_empty() {
            builder.tools(to_chat_tools(tools)?).tool_choice("auto");
        }
        let request = builder.build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;

        if let Some(call) = choice
            .message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
        {
            debug!(tool = %call.function.name, "model requested a tool call");
            return Ok(ReasonerOutcome::ToolRequest(ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                query: query_from_arguments(&call.function.arguments),
            }));
        }

        choice
            .message
            .content
            .clone()
            .map(ReasonerOutcome::Answer)
            .ok_or_else(|| anyhow!("chat completion had neither content nor tool calls"))
    }

    async fn conclude(&self, ctx: &ConversationContext) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_chat_messages(ctx)?)
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("chat completion after tool round-trip had no content"))
    }
}

/// Translates the context's turn log into chat messages. A tool-result turn
/// becomes the assistant-tool-call / tool-message pair the API expects.
fn to_chat_messages(ctx: &ConversationContext) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(ctx.len() + 1);
    for turn in ctx.turns() {
        match turn {
            Turn::System { content } => messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(content.clone())
                    .build()?
                    .into(),
            ),
            Turn::User { content } => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(content.clone())
                    .build()?
                    .into(),
            ),
            Turn::Assistant { content } => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.clone())
                    .build()?
                    .into(),
            ),
            Turn::ToolResult { call, output } => {
                let tool_call = ChatCompletionMessageToolCall {
                    id: call.id.clone(),
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: serde_json::json!({ "query": call.query }).to_string(),
                    },
                };
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .tool_calls(vec![tool_call])
                        .build()?
                        .into(),
                );
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(output.clone())
                        .build()?
                        .into(),
                );
            }
        }
    }
    Ok(messages)
}

fn to_chat_tools(tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|spec| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(spec.name.clone())
                        .description(spec.description.clone())
                        .parameters(spec.parameters.clone())
                        .build()?,
                )
                .build()?)
        })
        .collect()
}

/// The declared parameter schema has a single "query" string; fall back to
/// the raw argument text if the model sent something else.
fn query_from_arguments(arguments: &str) -> String {
    serde_json::from_str::<serde_json::Value>(arguments)
        .ok()
        .and_then(|value| {
            value
                .get("query")
                .and_then(|q| q.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| arguments.to_string())
}
