mod comm;
mod dispatch;
mod executor;

use comm::{Comm, CommConfig};
use executor::{Executor, ExecutorConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{Level, error, info};
use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting terminal server...");

    let comm_config = CommConfig::from_env();
    let executor_config = ExecutorConfig::from_env();

    info!(
        listen_addr = %comm_config.listen_addr,
        listen_port = comm_config.listen_port,
        shell = %executor_config.shell,
        "Configuration loaded"
    );

    let executor = Arc::new(Executor::init(executor_config));
    let tools = executor.tool_definitions();
    info!(tools = tools.len(), "Executor initialized");

    let (comm, call_rx) = Comm::new(comm_config, tools).await?;
    info!(addr = %comm.local_addr()?, "Comm initialized");

    let comm_handle = tokio::spawn(async move {
        if let Err(e) = comm.run().await {
            error!(error = %e, "Comm server error");
        }
    });

    let dispatch_handle = tokio::spawn(dispatch::serve(executor, call_rx));

    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    } else {
        info!("Received shutdown signal");
    }

    info!("Shutting down...");
    comm_handle.abort();
    dispatch_handle.abort();

    info!("Goodbye!");
    Ok(())
}
