// run_command tool

use crate::executor::command::CommandExecutor;
use crate::executor::{ExecutorError, Result, ToolDefinition, ToolImpl};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub const RUN_COMMAND_TOOL: &str = "run_command";

/// run_command input parameters
#[derive(Debug, Deserialize)]
struct RunCommandInput {
    command: String,
}

/// Tool running a terminal command and returning stdout, stderr and return code
pub struct RunCommandTool {
    description: String,
    executor: CommandExecutor,
}

impl RunCommandTool {
    pub fn new(description: impl Into<String>, executor: CommandExecutor) -> Self {
        Self {
            description: description.into(),
            executor,
        }
    }
}

#[async_trait]
impl ToolImpl for RunCommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RUN_COMMAND_TOOL.to_string(),
            description: self.description.clone(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The command to execute in the terminal."
                    }
                },
                "required": ["command"]
            }),
            output_schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "stdout": { "type": "string" },
                    "stderr": { "type": "string" },
                    "return_code": { "type": "integer" }
                },
                "required": ["stdout", "stderr", "return_code"]
            })),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<serde_json::Value> {
        let RunCommandInput { command } = serde_json::from_value(input)
            .map_err(|e| ExecutorError::InvalidInput(RUN_COMMAND_TOOL.to_string(), e.to_string()))?;

        let result = self.executor.execute(&command).await;
        debug!(
            return_code = result.return_code,
            invocation_failure = result.is_invocation_failure(),
            "run_command finished"
        );
        Ok(serde_json::to_value(result)?)
    }
}

/// Default run_command description
pub fn default_run_command_description() -> String {
    "Run a terminal command and return the output.\n\
     Returns a mapping containing stdout, stderr, and return_code."
        .to_string()
}
