// Integration tests for Executor module
// This file should be run with cargo test --test test_executor
#![cfg(unix)]

#[path = "../src/executor/mod.rs"]
mod executor;

use std::sync::Arc;
use std::time::Instant;

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

fn create_executor() -> crate::executor::Executor {
    let config = crate::executor::ExecutorConfig {
        tools_toml_path: std::path::PathBuf::from("/nonexistent/tools.toml"),
        ..Default::default()
    };
    crate::executor::Executor::init(config)
}

fn run_command_input(command: &str) -> serde_json::Value {
    serde_json::json!({ "command": command })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandExecutor, ExecutionResult};

    /// Fixed text on stdout, exit 0
    #[tokio::test]
    async fn test_echo_hello() {
        init_tracing();

        let result = CommandExecutor::default().execute("echo hello").await;

        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.return_code, 0);
    }

    /// Nonzero exit is reported as-is, not through the sentinel path
    #[tokio::test]
    async fn test_explicit_exit_status() {
        init_tracing();

        let result = CommandExecutor::default().execute("echo failing >&2; exit 1").await;

        assert_eq!(result.return_code, 1);
        assert_eq!(result.stderr, "failing\n");
        assert!(!result.stderr.starts_with("Error executing command: "));
    }

    /// The shell reports a missing program itself
    #[tokio::test]
    async fn test_nonexistent_program() {
        init_tracing();

        let result = CommandExecutor::default()
            .execute("definitely-not-a-real-program-xyz")
            .await;

        assert_eq!(result.return_code, 127);
        assert!(!result.stderr.is_empty());
        assert!(!result.is_invocation_failure());
    }

    #[tokio::test]
    async fn test_no_output() {
        init_tracing();

        let result = CommandExecutor::default().execute("true").await;

        assert_eq!(
            result,
            ExecutionResult::completed(String::new(), String::new(), 0)
        );
    }

    #[tokio::test]
    async fn test_empty_command() {
        init_tracing();

        let result = CommandExecutor::default().execute("").await;

        assert_eq!(result.return_code, 0);
        assert_eq!(result.stdout, "");
    }

    #[tokio::test]
    async fn test_syntax_error_reported_by_shell() {
        init_tracing();

        let result = CommandExecutor::default().execute("if then fi (").await;

        assert_ne!(result.return_code, 0);
        assert_ne!(result.return_code, -1);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_pipes_and_chaining() {
        init_tracing();

        let result = CommandExecutor::default()
            .execute("echo line1 && printf 'b\\na\\n' | sort")
            .await;

        assert_eq!(result.stdout, "line1\na\nb\n");
        assert_eq!(result.return_code, 0);
    }

    /// Spawn failure before a process handle exists
    #[tokio::test]
    async fn test_missing_shell_binary() {
        init_tracing();

        let config = crate::executor::ExecutorConfig {
            shell: "/nonexistent/bin/sh".to_string(),
            tools_toml_path: std::path::PathBuf::from("/nonexistent/tools.toml"),
            ..Default::default()
        };
        let executor = crate::executor::Executor::init(config);

        let output = executor
            .execute("run_command", run_command_input("echo hello"))
            .await
            .unwrap();

        assert_eq!(output["stdout"], "");
        assert_eq!(output["return_code"], -1);
        assert!(
            output["stderr"]
                .as_str()
                .unwrap()
                .starts_with("Error executing command: ")
        );
    }

    #[tokio::test]
    async fn test_same_command_twice_is_identical() {
        init_tracing();

        let executor = CommandExecutor::default();
        let first = executor.execute("echo same; echo err >&2").await;
        let second = executor.execute("echo same; echo err >&2").await;

        assert_eq!(first, second);
    }

    /// A slow command does not hold up a fast one
    #[tokio::test]
    async fn test_concurrent_commands_complete_independently() {
        init_tracing();

        let executor = Arc::new(CommandExecutor::default());

        let slow = {
            let executor = Arc::clone(&executor);
            async move {
                let result = executor.execute("sleep 2; echo slow").await;
                (result, Instant::now())
            }
        };
        let fast = {
            let executor = Arc::clone(&executor);
            async move {
                let result = executor.execute("echo fast").await;
                (result, Instant::now())
            }
        };

        let ((slow_result, slow_done), (fast_result, fast_done)) =
            futures::future::join(slow, fast).await;

        assert_eq!(slow_result.stdout, "slow\n");
        assert_eq!(fast_result.stdout, "fast\n");
        assert!(fast_done < slow_done);
    }

    /// Registry returns the result mapping
    #[tokio::test]
    async fn test_run_command_tool_output() {
        init_tracing();

        let executor = create_executor();

        let output = executor
            .execute("run_command", run_command_input("echo hello"))
            .await
            .unwrap();

        assert_eq!(
            output,
            serde_json::json!({ "stdout": "hello\n", "stderr": "", "return_code": 0 })
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        init_tracing();

        let executor = create_executor();

        let result = executor
            .execute("nonexistent", run_command_input("echo test"))
            .await;
        assert!(matches!(result, Err(crate::executor::ExecutorError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        init_tracing();

        let executor = create_executor();

        let missing = executor
            .execute("run_command", serde_json::json!({ "wrong_field": "value" }))
            .await;
        assert!(matches!(missing, Err(crate::executor::ExecutorError::InvalidInput(_, _))));

        let wrong_type = executor
            .execute("run_command", serde_json::json!({ "command": 42 }))
            .await;
        assert!(matches!(wrong_type, Err(crate::executor::ExecutorError::InvalidInput(_, _))));
    }

    #[tokio::test]
    async fn test_tool_definitions() {
        init_tracing();

        let executor = create_executor();

        let defs = executor.tool_definitions();
        assert_eq!(defs.len(), 1);

        let def = &defs[0];
        assert_eq!(def.name, "run_command");
        assert!(!def.description.is_empty());
        assert_eq!(def.input_schema["required"], serde_json::json!(["command"]));
        assert_eq!(def.input_schema["properties"]["command"]["type"], "string");

        let output_schema = def.output_schema.as_ref().unwrap();
        assert_eq!(
            output_schema["required"],
            serde_json::json!(["stdout", "stderr", "return_code"])
        );
    }

    #[tokio::test]
    async fn test_description_override_from_toml() {
        init_tracing();

        let path = std::env::temp_dir().join(format!(
            "terminal-server-test-tools-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[run_command]\ndescription = \"Custom description\"\n").unwrap();

        let executor = crate::executor::Executor::init(crate::executor::ExecutorConfig {
            tools_toml_path: path.clone(),
            ..Default::default()
        });
        std::fs::remove_file(&path).ok();

        assert_eq!(executor.tool_definitions()[0].description, "Custom description");
    }
}
