//! The tool invocation bridge.
//!
//! Tools are declared once at construction as a fixed set of `{name,
//! description, parameter-schema}` specs plus a name-to-handler map. The two
//! must agree both ways; a mismatch is a construction-time configuration
//! error, not something discovered mid-session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// A tool declaration passed verbatim to the reasoner.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// An external capability invoked by name with a free-text query.
///
/// An empty result string is valid and signals "no match" or "not yet
/// implemented"; the reasoner is expected to handle it gracefully.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, query: &str) -> anyhow::Result<String>;
}

/// Declarations and handlers disagree; fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ToolSetupError {
    #[error("tool '{0}' is declared but has no handler")]
    MissingHandler(String),
    #[error("tool '{0}' has a handler but no declaration")]
    UndeclaredHandler(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The requested name is not in the registered set. Construction-time
    /// checks should make this unreachable; kept as defense in depth.
    #[error("unknown tool '{0}'")]
    Unknown(String),
    #[error("tool '{name}' failed: {message}")]
    Execution { name: String, message: String },
}

/// Dispatches tool calls from the reasoning stage to registered handlers.
///
/// Holds no state beyond the static name-to-handler mapping.
pub struct ToolBridge {
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBridge")
            .field("specs", &self.specs)
            .field("handlers", &self.handlers.keys())
            .finish()
    }
}

impl ToolBridge {
    /// Builds the bridge, verifying that every declared tool has a handler
    /// and every handler a declaration.
    pub fn new(
        specs: Vec<ToolSpec>,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<Self, ToolSetupError> {
        for spec in &specs {
            if !handlers.contains_key(&spec.name) {
                return Err(ToolSetupError::MissingHandler(spec.name.clone()));
            }
        }
        for name in handlers.keys() {
            if !specs.iter().any(|s| &s.name == name) {
                return Err(ToolSetupError::UndeclaredHandler(name.clone()));
            }
        }
        Ok(Self { specs, handlers })
    }

    /// The declarations offered to the reasoner.
    pub fn declarations(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub async fn invoke(&self, name: &str, query: &str) -> Result<String, ToolError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        handler
            .call(query)
            .await
            .map_err(|e| ToolError::Execution {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}
