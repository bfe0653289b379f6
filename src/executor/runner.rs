// Tool registry

use crate::executor::command::CommandExecutor;
use crate::executor::config::ExecutorConfig;
use crate::executor::error::{ExecutorError, Result};
use crate::executor::run_command::{
    RUN_COMMAND_TOOL, RunCommandTool, default_run_command_description,
};
use crate::executor::tool::{ToolImpl, load_tool_descriptions};
use crate::executor::types::ToolDefinition;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registered tools, dispatched by name
pub struct Executor {
    tools: HashMap<String, Arc<dyn ToolImpl>>,
}

impl Executor {
    /// Initialize with registered tools
    pub fn init(config: ExecutorConfig) -> Self {
        debug!(
            shell = %config.shell,
            shell_arg = %config.shell_arg,
            "initializing executor"
        );

        let mut descriptions = match load_tool_descriptions(&config.tools_toml_path) {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    path = %config.tools_toml_path.display(),
                    error = %e,
                    "failed to load tool descriptions, using defaults"
                );
                HashMap::new()
            }
        };

        let description = descriptions
            .remove(RUN_COMMAND_TOOL)
            .unwrap_or_else(default_run_command_description);

        let mut executor = Self {
            tools: HashMap::new(),
        };
        executor.register(Arc::new(RunCommandTool::new(
            description,
            CommandExecutor::from_config(&config),
        )));

        info!(tool_count = executor.tools.len(), "executor initialized with tools");
        executor
    }

    /// Register a tool under its definition name, replacing any previous one
    pub fn register(&mut self, tool: Arc<dyn ToolImpl>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Discovery metadata for every registered tool, sorted by name
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with JSON input
    pub async fn execute(&self, tool_name: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        debug!(tool_name = %tool_name, "looking up tool");

        let tool = self
            .tools
            .get(tool_name)
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownTool(tool_name.to_string()))?;

        info!(tool_name = %tool_name, "executing tool");
        tool.run(input).await
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::init(ExecutorConfig::default())
    }
}
