// Comm module - UDP transport for tool calls and discovery

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod types;

pub use config::CommConfig;
pub use error::{CommError, CommInitError};
pub use server::Comm;
#[allow(unused_imports)]
pub use types::{ToolCall, ToolReply};
