//! Runtime-facing launch configuration derived from a [`TaskSpec`](crate::task::TaskSpec).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};

/// Everything the runtime needs to create one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaunchConfig {
    pub process: ProcessOptions,
    pub host: HostOptions,
}

/// Options describing the process inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessOptions {
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    /// Declared container-side volume paths.
    pub volumes: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
}

/// Options describing the host-side sandbox around the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostOptions {
    pub memory: Option<i64>,
    pub memory_swap: Option<i64>,
    pub kernel_memory: Option<i64>,
    pub memory_swappiness: Option<i64>,
    pub storage_opt: BTreeMap<String, String>,
    pub pids_limit: Option<i64>,
    pub ulimits: Vec<Ulimit>,
    pub tmpfs: BTreeMap<String, String>,
    pub readonly_rootfs: bool,
    /// `host:container` bind mounts. Append-only.
    pub binds: Vec<String>,
    pub network_mode: Option<NetworkMode>,
    pub log_config: Option<LogConfig>,
    pub cap_drop: Vec<String>,
    pub security_opt: Vec<String>,
    pub cpu_quota: Option<i64>,
    pub cpu_period: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ulimit {
    pub name: String,
    pub soft: i64,
    pub hard: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: BTreeMap<String, String>,
}

impl LogConfig {
    /// Log driver that discards container output.
    #[must_use]
    pub fn none() -> Self {
        Self {
            kind: "none".into(),
            config: BTreeMap::new(),
        }
    }
}

/// Network attachment for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// No networking at all.
    Disabled,
    /// Join another container's namespaces (a pool grant).
    Container(String),
    /// Attach to a pre-existing named network.
    Named(String),
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("none"),
            Self::Container(id) => write!(f, "container:{id}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for NetworkMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl LaunchConfig {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            process: ProcessOptions {
                image: image.into(),
                ..Default::default()
            },
            host: HostOptions::default(),
        }
    }

    /// Names of every field holding a non-default value.
    #[must_use]
    pub fn populated_fields(&self) -> BTreeSet<&'static str> {
        let p = &self.process;
        let h = &self.host;
        [
            ("process.image", !p.image.is_empty()),
            ("process.cmd", !p.cmd.is_empty()),
            ("process.env", !p.env.is_empty()),
            ("process.working_dir", p.working_dir.is_some()),
            ("process.user", p.user.is_some()),
            ("process.hostname", p.hostname.is_some()),
            ("process.volumes", !p.volumes.is_empty()),
            ("process.labels", !p.labels.is_empty()),
            ("host.memory", h.memory.is_some()),
            ("host.memory_swap", h.memory_swap.is_some()),
            ("host.kernel_memory", h.kernel_memory.is_some()),
            ("host.memory_swappiness", h.memory_swappiness.is_some()),
            ("host.storage_opt", !h.storage_opt.is_empty()),
            ("host.pids_limit", h.pids_limit.is_some()),
            ("host.ulimits", !h.ulimits.is_empty()),
            ("host.tmpfs", !h.tmpfs.is_empty()),
            ("host.readonly_rootfs", h.readonly_rootfs),
            ("host.binds", !h.binds.is_empty()),
            ("host.network_mode", h.network_mode.is_some()),
            ("host.log_config", h.log_config.is_some()),
            ("host.cap_drop", !h.cap_drop.is_empty()),
            ("host.security_opt", !h.security_opt.is_empty()),
            ("host.cpu_quota", h.cpu_quota.is_some()),
            ("host.cpu_period", h.cpu_period.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}
