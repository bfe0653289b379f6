// Executor module - shell command tool and tool registry
#![allow(unused_imports)]

pub mod command;
pub mod config;
pub mod error;
pub mod run_command;
pub mod runner;
pub mod tool;
pub mod types;

pub use command::CommandExecutor;
pub use config::ExecutorConfig;
pub use error::{ExecutionError, ExecutorError, Result};
pub use run_command::RUN_COMMAND_TOOL;
pub use runner::Executor;
pub use tool::ToolImpl;
pub use types::{ERROR_PREFIX, ERROR_RETURN_CODE, ExecutionResult, ToolDefinition};
