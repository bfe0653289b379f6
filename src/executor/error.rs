// Error types for Executor module

use thiserror::Error;

/// Registry and tool input errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input for tool '{0}': {1}")]
    InvalidInput(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Faults raised while running a single command
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect process output: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to decode {stream}: {source}")]
    Decode {
        stream: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
