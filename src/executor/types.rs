// Data types for Executor module

use serde::{Deserialize, Serialize};

/// Return code reported when the command could not be run to completion
pub const ERROR_RETURN_CODE: i32 = -1;

/// Prefix of the stderr message reported on invocation failure
pub const ERROR_PREFIX: &str = "Error executing command: ";

/// Outcome of one command execution
///
/// Serializes as a mapping with exactly the keys `stdout`, `stderr` and
/// `return_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Captured standard output, empty if none was produced
    pub stdout: String,
    /// Captured standard error, or the failure message
    pub stderr: String,
    /// Exit status of the child, or `ERROR_RETURN_CODE`
    pub return_code: i32,
}

impl ExecutionResult {
    pub fn completed(stdout: String, stderr: String, return_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            return_code,
        }
    }

    /// Result reported when the command could not be run
    pub fn failed(fault: impl std::fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("{ERROR_PREFIX}{fault}"),
            return_code: ERROR_RETURN_CODE,
        }
    }

    /// Whether this result came from an invocation failure rather than the command itself
    pub fn is_invocation_failure(&self) -> bool {
        self.return_code == ERROR_RETURN_CODE && self.stderr.starts_with(ERROR_PREFIX)
    }
}

/// Tool metadata published for discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name used to invoke it
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema of the input arguments
    pub input_schema: serde_json::Value,
    /// JSON Schema of the structured result
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_wire_keys() {
        let result = ExecutionResult::completed("hello\n".to_string(), String::new(), 0);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "stdout": "hello\n", "stderr": "", "return_code": 0 })
        );
    }

    #[test]
    fn test_failed_shape() {
        let result = ExecutionResult::failed("No such file or directory (os error 2)");

        assert_eq!(result.stdout, "");
        assert_eq!(result.return_code, -1);
        assert_eq!(
            result.stderr,
            "Error executing command: No such file or directory (os error 2)"
        );
        assert!(result.is_invocation_failure());
    }

    #[test]
    fn test_nonzero_exit_is_not_invocation_failure() {
        let result = ExecutionResult::completed(String::new(), "boom\n".to_string(), 1);
        assert!(!result.is_invocation_failure());
    }
}
