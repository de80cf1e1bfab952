//! Abstract task description and the optional capabilities a task may carry.

use std::collections::BTreeMap;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::image::AuthConfig;

/// One unit of work to run in a sandbox. Read-only to the driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    /// Unique task id. Also used as the container name.
    pub id: String,
    pub image: String,
    /// Whitespace-separated command line. Empty uses the image default.
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMapping>,
    pub working_dir: String,
    pub logger: LoggerConfig,
    /// Memory limit in bytes (0 = unlimited).
    pub memory: u64,
    /// CPU request in milli-CPUs (0 = unlimited).
    pub cpus: u64,
    /// Ephemeral storage size in MB (0 = runtime default).
    pub fs_size: u64,
    /// `/tmp` tmpfs size in MB (0 = no explicit size).
    pub tmpfs_size: u64,
    /// Process count limit (0 = unlimited).
    pub pids: u64,
    pub open_files: Option<u64>,
    pub locked_memory: Option<u64>,
    pub pending_signals: Option<u64>,
    pub message_queue: Option<u64>,
    pub read_only_root: bool,
    pub disable_net: bool,
    /// Host unix socket exposed to the container.
    pub socket: Option<SocketMount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMapping {
    pub host_dir: String,
    pub container_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketMount {
    pub host_path: String,
    pub container_path: String,
}

/// Remote log sink for container output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Syslog endpoint, e.g. `tcp://logs.internal:514`. Empty disables logging.
    pub url: String,
    pub tags: Vec<LogTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTag {
    pub name: String,
    pub value: String,
}

/// Custom registry authentication supplied by a task.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve credentials for `image`. `Ok(None)` keeps the driver's static
    /// credentials.
    async fn docker_auth(&self, image: &str) -> anyhow::Result<Option<AuthConfig>>;
}

/// A task the driver can launch.
pub trait ContainerTask: Send + Sync {
    fn spec(&self) -> &TaskSpec;

    /// Probe for the custom-auth capability.
    fn authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }
}

impl ContainerTask for TaskSpec {
    fn spec(&self) -> &TaskSpec {
        self
    }
}

/// Outcome of a container run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Killed,
    Oom,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Error => f.write_str("error"),
            Self::Killed => f.write_str("killed"),
            Self::Oom => f.write_str("oom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitResult {
    pub exit_code: i64,
    pub status: RunStatus,
}

impl WaitResult {
    /// Classify a raw exit. OOM wins over the exit code; 137 is SIGKILL.
    #[must_use]
    pub fn from_exit(exit_code: i64, oom_killed: bool) -> Self {
        let status = match (oom_killed, exit_code) {
            (true, _) => RunStatus::Oom,
            (false, 0) => RunStatus::Success,
            (false, 137) => RunStatus::Killed,
            (false, _) => RunStatus::Error,
        };
        Self { exit_code, status }
    }
}
