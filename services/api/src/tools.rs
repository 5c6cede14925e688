//! The tools offered to the reasoner.
//!
//! One tool is registered today: a knowledge-base search whose backing store
//! is not wired up yet, so it returns an empty result. The empty string is a
//! valid tool output and the system prompt tells the reasoner to say so.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use voxbridge_core::tools::{ToolBridge, ToolHandler, ToolSetupError, ToolSpec};

pub const KNOWLEDGE_SEARCH_TOOL: &str = "search_knowledge_base";

/// Searches the caller's uploaded materials.
///
/// TODO: back this with the document store once ingestion lands.
pub struct KnowledgeSearch;

#[async_trait]
impl ToolHandler for KnowledgeSearch {
    async fn call(&self, _query: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// The default tool set the service starts with.
pub fn default_tool_bridge() -> Result<ToolBridge, ToolSetupError> {
    let specs = vec![ToolSpec::new(
        KNOWLEDGE_SEARCH_TOOL,
        "Search the caller's uploaded materials for passages relevant to a question.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for, phrased as a question or key phrase."
                }
            },
            "required": ["query"]
        }),
    )];
    let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
    handlers.insert(KNOWLEDGE_SEARCH_TOOL.to_string(), Arc::new(KnowledgeSearch));
    ToolBridge::new(specs, handlers)
}
