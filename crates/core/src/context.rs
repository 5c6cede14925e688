//! The conversation context: an ordered turn log for one voice session.
//!
//! The context is owned by a single session's pipeline task and mutated only
//! by pipeline stages, so no synchronization lives here.

use serde::{Deserialize, Serialize};

/// A structured tool invocation requested by the reasoner mid-turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the reasoning service.
    pub id: String,
    /// Name of the requested tool. Must match a registered tool.
    pub name: String,
    /// The free-text query the tool should answer.
    pub query: String,
}

/// One atomic contribution to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    /// The resolved result of a tool call, inserted between the reasoning
    /// request that triggered it and the assistant turn that consumes it.
    ToolResult { call: ToolCall, output: String },
}

/// The ordered turn log for one session.
///
/// Exactly one system turn exists, inserted at construction; the API offers
/// no way to add another. All other turns append in chronological order and
/// are never reordered.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            turns: vec![Turn::System {
                content: system_prompt.to_string(),
            }],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::User {
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::Assistant {
            content: content.into(),
        });
    }

    pub fn push_tool_result(&mut self, call: ToolCall, output: impl Into<String>) {
        self.turns.push(Turn::ToolResult {
            call,
            output: output.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_call() -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "search_knowledge_base".to_string(),
            query: "entropy".to_string(),
        }
    }

    #[test]
    fn starts_with_exactly_one_system_turn() {
        let ctx = ConversationContext::new("Be concise.");
        assert_eq!(ctx.len(), 1);
        assert_eq!(
            ctx.turns()[0],
            Turn::System {
                content: "Be concise.".to_string()
            }
        );
    }

    #[test]
    fn appends_turns_in_chronological_order() {
        let mut ctx = ConversationContext::new("sys");
        ctx.push_user("hello");
        ctx.push_assistant("hi there");
        ctx.push_user("what is entropy?");

        let roles: Vec<&str> = ctx
            .turns()
            .iter()
            .map(|t| match t {
                Turn::System { .. } => "system",
                Turn::User { .. } => "user",
                Turn::Assistant { .. } => "assistant",
                Turn::ToolResult { .. } => "tool_result",
            })
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn tool_result_interleaves_between_user_and_assistant() {
        let mut ctx = ConversationContext::new("sys");
        ctx.push_user("look this up");
        ctx.push_tool_result(sample_call(), "found it");
        ctx.push_assistant("here is what I found");

        assert!(matches!(ctx.turns()[1], Turn::User { .. }));
        assert!(matches!(ctx.turns()[2], Turn::ToolResult { .. }));
        assert!(matches!(ctx.turns()[3], Turn::Assistant { .. }));

        let system_turns = ctx
            .turns()
            .iter()
            .filter(|t| matches!(t, Turn::System { .. }))
            .count();
        assert_eq!(system_turns, 1);
    }

    #[test]
    fn empty_tool_output_is_preserved() {
        let mut ctx = ConversationContext::new("sys");
        ctx.push_tool_result(sample_call(), "");
        match ctx.last() {
            Some(Turn::ToolResult { output, .. }) => assert!(output.is_empty()),
            other => panic!("expected tool result turn, got {other:?}"),
        }
    }
}
