// Executor configuration

use std::path::PathBuf;

#[cfg(unix)]
const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(unix)]
const DEFAULT_SHELL_ARG: &str = "-c";

#[cfg(windows)]
const DEFAULT_SHELL: &str = "cmd";
#[cfg(windows)]
const DEFAULT_SHELL_ARG: &str = "/C";

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Path to tools.toml configuration file
    pub tools_toml_path: PathBuf,
    /// Shell used to interpret commands
    pub shell: String,
    /// Flag passing the command string to the shell
    pub shell_arg: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tools_toml_path: PathBuf::from("tools.toml"),
            shell: String::from(DEFAULT_SHELL),
            shell_arg: String::from(DEFAULT_SHELL_ARG),
        }
    }
}

impl ExecutorConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = ExecutorConfig::default();

        if let Ok(shell) = std::env::var("TERMINAL_SHELL") {
            config.shell = shell;
        }
        if let Ok(shell_arg) = std::env::var("TERMINAL_SHELL_ARG") {
            config.shell_arg = shell_arg;
        }
        if let Ok(path) = std::env::var("TERMINAL_TOOLS_TOML") {
            config.tools_toml_path = PathBuf::from(path);
        }

        config
    }
}
