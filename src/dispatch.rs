// Routes tool calls from Comm to the Executor

use crate::comm::{ToolCall, ToolReply};
use crate::executor::Executor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run one tool call and send its reply back to Comm
pub async fn handle_tool_call(executor: &Executor, call: ToolCall) {
    let ToolCall {
        tool,
        arguments,
        reply,
        source_addr,
    } = call;

    info!(addr = %source_addr, tool = %tool, "Handling tool call");

    let response = match executor.execute(&tool, arguments).await {
        Ok(content) => ToolReply::new(content),
        Err(e) => {
            warn!(tool = %tool, error = %e, "Tool call rejected");
            ToolReply::error(e.to_string())
        }
    };

    if reply.send(response).is_err() {
        warn!(addr = %source_addr, "Failed to send reply to comm");
    }
}

/// Spawn one task per tool call until the channel closes
pub async fn serve(executor: Arc<Executor>, mut calls: mpsc::Receiver<ToolCall>) {
    while let Some(call) = calls.recv().await {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            handle_tool_call(&executor, call).await;
        });
    }
    info!("Tool call channel closed");
}
