use crate::executor::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Message types for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Client → daemon: invoke a tool
    Request = 0x01,
    /// Daemon → client: the request was received
    RequestAck = 0x02,
    /// Daemon → client: the tool result
    Response = 0x03,
    /// Client → daemon: ask for the registered tools
    ListTools = 0x04,
    /// Daemon → client: the registered tools
    ToolList = 0x05,
    /// Daemon → client: one piece of a response too large for one datagram
    ResponseChunk = 0x06,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::RequestAck),
            0x03 => Some(Self::Response),
            0x04 => Some(Self::ListTools),
            0x05 => Some(Self::ToolList),
            0x06 => Some(Self::ResponseChunk),
            _ => None,
        }
    }
}

/// Tool call payload from client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Name of the tool to invoke
    pub tool: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

/// Tool result payload sent to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Structured tool result, or an error message string
    pub content: serde_json::Value,
    /// Whether the call was rejected before the tool produced a result
    pub is_error: bool,
}

/// Discovery payload sent to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolListPayload {
    /// Server identifier
    pub server_name: String,
    /// Registered tools
    pub tools: Vec<ToolDefinition>,
}

/// Tool call forwarded from Comm to the daemon loop
#[derive(Debug)]
pub struct ToolCall {
    /// Tool name
    pub tool: String,
    /// JSON arguments
    pub arguments: serde_json::Value,
    /// Channel to send the reply back to Comm
    pub reply: oneshot::Sender<ToolReply>,
    /// Client source address
    pub source_addr: SocketAddr,
}

/// Reply sent from the daemon loop to Comm
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply {
    /// Structured tool result or error message
    pub content: serde_json::Value,
    /// Whether this is an error reply
    pub is_error: bool,
}

impl ToolReply {
    pub fn new(content: serde_json::Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: serde_json::Value::String(message.into()),
            is_error: true,
        }
    }
}

impl From<ToolReply> for ResponsePayload {
    fn from(reply: ToolReply) -> Self {
        Self {
            content: reply.content,
            is_error: reply.is_error,
        }
    }
}
