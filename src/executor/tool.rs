// Tool trait and description loading

use crate::executor::{Result, ToolDefinition};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Internal trait for tool implementations
#[async_trait]
pub trait ToolImpl: Send + Sync {
    /// Get the tool definition (name, description, schemas)
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with JSON input, returning its structured result
    async fn run(&self, input: serde_json::Value) -> Result<serde_json::Value>;

    /// Get tool name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// One `[tool]` table in tools.toml
#[derive(Debug, Deserialize)]
struct ToolEntry {
    description: Option<String>,
}

/// Load tool description overrides from TOML config file
pub fn load_tool_descriptions(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "tools.toml not found, using default descriptions");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let entries: HashMap<String, ToolEntry> = toml::from_str(&content)?;

    let descriptions: HashMap<String, String> = entries
        .into_iter()
        .filter_map(|(name, entry)| entry.description.map(|d| (name, d)))
        .collect();

    debug!(path = %path.display(), tool_count = descriptions.len(), "loaded tool descriptions from config");
    Ok(descriptions)
}
