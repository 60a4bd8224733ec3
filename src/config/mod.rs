/// Configuration management for the docflow service
///
/// Handles server binding, database location, and workflow behaviour knobs.
/// Every value can be overridden through environment variables for container
/// deployments.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Workflow persistence behaviour
    pub workflow: WorkflowConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the workflow database (default: "data")
    /// Creates: {data_dir}/workflows.db
    pub data_dir: String,
}

/// Workflow persistence behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// How many checkpoints a listing returns, newest first
    pub checkpoint_list_limit: u32,
    /// Delete the live record once a run completes
    pub clear_on_complete: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            checkpoint_list_limit: 10,
            clear_on_complete: true,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let workflow_defaults = WorkflowConfig::default();
        Self {
            server: ServerConfig {
                host: std::env::var("DOCFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("DOCFLOW_PORT", 3004),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("DOCFLOW_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            workflow: WorkflowConfig {
                checkpoint_list_limit: env_or(
                    "DOCFLOW_CHECKPOINT_LIMIT",
                    workflow_defaults.checkpoint_list_limit,
                ),
                clear_on_complete: env_or(
                    "DOCFLOW_CLEAR_ON_COMPLETE",
                    workflow_defaults.clear_on_complete,
                ),
            },
        }
    }
}

// Unparseable values fall back to the default rather than aborting startup.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
