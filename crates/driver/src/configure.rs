//! Translation of a [`TaskSpec`] into a [`LaunchConfig`].
//!
//! Configuration is a fixed, ordered table of steps. Each step inspects one
//! attribute of the task and, when it is present, writes fields no other step
//! writes. Only `host.binds` is shared, and it is append-only. No step fails:
//! values that cannot be expressed are skipped with a warning.
//!
//! The network step is the only one with side effects. It may borrow a pool
//! container or a named network, and the grant is handed back in
//! [`Configured::grants`] for the cookie to release.

use {
    berth_config::DriverConfig,
    tracing::{debug, error, warn},
};

use crate::{
    image::ImageRef,
    launch::{LaunchConfig, LogConfig, NetworkMode, Ulimit},
    pool::{Grants, NetworkAllocator, PoolAllocator},
    task::TaskSpec,
};

/// Numeric uid:gid containers run as unless the driver disables it.
pub const UNPRIVILEGED_USER: &str = "1000:1000";

pub const CLASSIFIER_LABEL: &str = "berth.agent.classifier";
pub const INSTANCE_LABEL: &str = "berth.agent.instance";

/// CFS period in microseconds. Quota is milli-CPUs x 100 within it.
const CPU_PERIOD_US: i64 = 100_000;

type Step = fn(&mut Configurator<'_>, &mut LaunchConfig);

/// Configuration steps, in the order they run.
const STEPS: &[(&str, Step)] = &[
    ("image", configure_image),
    ("labels", configure_labels),
    ("logger", configure_logger),
    ("memory", configure_memory),
    ("fs_size", configure_fs_size),
    ("pids", configure_pids),
    ("ulimits", configure_ulimits),
    ("tmpfs", configure_tmpfs),
    ("rootfs", configure_rootfs),
    ("iofs", configure_iofs),
    ("volumes", configure_volumes),
    ("cpu", configure_cpu),
    ("workdir", configure_workdir),
    ("network", configure_network),
    ("hostname", configure_hostname),
    ("cmd", configure_cmd),
    ("env", configure_env),
    ("security", configure_security),
];

/// Output of a configuration run.
#[derive(Debug, Clone)]
pub struct Configured {
    pub launch: LaunchConfig,
    pub image_ref: ImageRef,
    pub grants: Grants,
}

/// Borrowed inputs for one configuration run.
pub struct Configurator<'a> {
    task: &'a TaskSpec,
    config: &'a DriverConfig,
    hostname: &'a str,
    instance_id: &'a str,
    pool: Option<&'a dyn PoolAllocator>,
    networks: Option<&'a dyn NetworkAllocator>,
    image_ref: ImageRef,
    grants: Grants,
}

impl<'a> Configurator<'a> {
    pub fn new(
        task: &'a TaskSpec,
        config: &'a DriverConfig,
        hostname: &'a str,
        instance_id: &'a str,
    ) -> Self {
        Self {
            task,
            config,
            hostname,
            instance_id,
            pool: None,
            networks: None,
            image_ref: ImageRef::default(),
            grants: Grants::default(),
        }
    }

    #[must_use]
    pub fn with_pool(mut self, pool: Option<&'a dyn PoolAllocator>) -> Self {
        self.pool = pool;
        self
    }

    #[must_use]
    pub fn with_networks(mut self, networks: Option<&'a dyn NetworkAllocator>) -> Self {
        self.networks = networks;
        self
    }

    /// Run every step over a fresh config.
    pub fn build(mut self) -> Configured {
        let mut launch = LaunchConfig::new(self.task.image.clone());
        for (name, step) in STEPS {
            debug!(call_id = %self.task.id, step = *name, "configuring");
            step(&mut self, &mut launch);
        }
        Configured {
            launch,
            image_ref: self.image_ref,
            grants: self.grants,
        }
    }

    fn call_id(&self) -> &str {
        &self.task.id
    }

    fn read_only_root(&self) -> bool {
        self.config.enable_read_only_root_fs || self.task.read_only_root
    }
}

fn configure_image(c: &mut Configurator<'_>, _launch: &mut LaunchConfig) {
    c.image_ref = ImageRef::parse(&c.task.image);
}

fn configure_labels(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    let Some(tag) = c
        .config
        .container_label_tag
        .as_deref()
        .filter(|t| !t.is_empty())
    else {
        return;
    };
    let labels = &mut launch.process.labels;
    labels.insert(CLASSIFIER_LABEL.into(), tag.into());
    labels.insert(INSTANCE_LABEL.into(), c.instance_id.into());
}

fn configure_logger(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    let logger = &c.task.logger;
    if logger.url.is_empty() {
        launch.host.log_config = Some(LogConfig::none());
        return;
    }

    let mut log = LogConfig {
        kind: "syslog".into(),
        ..Default::default()
    };
    log.config.insert("syslog-address".into(), logger.url.clone());
    log.config.insert("syslog-facility".into(), "user".into());
    log.config.insert("syslog-format".into(), "rfc5424".into());

    let tags: Vec<String> = logger
        .tags
        .iter()
        .map(|t| format!("{}={}", t.name, t.value))
        .collect();
    if !tags.is_empty() {
        log.config.insert("tag".into(), tags.join(","));
    }
    launch.host.log_config = Some(log);
}

fn configure_memory(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.task.memory == 0 {
        return;
    }
    let Ok(mem) = i64::try_from(c.task.memory) else {
        warn!(call_id = c.call_id(), memory = c.task.memory, "memory limit too big (ignored)");
        return;
    };
    let host = &mut launch.host;
    host.memory = Some(mem);
    // Equal to memory: no swap on top.
    host.memory_swap = Some(mem);
    host.kernel_memory = Some(mem);
    host.memory_swappiness = Some(0);
}

fn configure_fs_size(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.task.fs_size == 0 {
        return;
    }
    let opt = format!("{}M", c.task.fs_size);
    debug!(call_id = c.call_id(), size = %opt, "setting storage option");
    launch.host.storage_opt.insert("size".into(), opt);
}

fn configure_pids(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.task.pids == 0 {
        return;
    }
    match i64::try_from(c.task.pids) {
        Ok(pids) => {
            debug!(call_id = c.call_id(), pids, "setting PIDs");
            launch.host.pids_limit = Some(pids);
        },
        Err(_) => warn!(call_id = c.call_id(), pids = c.task.pids, "pids limit too big (ignored)"),
    }
}

fn configure_ulimits(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    let limits = [
        ("nofile", c.task.open_files),
        ("memlock", c.task.locked_memory),
        ("sigpending", c.task.pending_signals),
        ("msgqueue", c.task.message_queue),
    ];
    for (name, value) in limits {
        let Some(value) = value else {
            continue;
        };
        let Ok(limit) = i64::try_from(value) else {
            warn!(
                call_id = c.call_id(),
                ulimit_name = name,
                ulimit_value = value,
                "ulimit value too big (ulimit ignored)"
            );
            continue;
        };
        debug!(call_id = c.call_id(), ulimit_name = name, ulimit_value = limit, "setting ulimit");
        launch.host.ulimits.push(Ulimit {
            name: name.into(),
            soft: limit,
            hard: limit,
        });
    }
}

fn configure_tmpfs(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    // A writable root with no size limit needs no tmpfs at all.
    let size = c.task.tmpfs_size;
    if size == 0 && !c.read_only_root() {
        return;
    }

    let options = match (size, c.config.max_tmpfs_inodes) {
        (0, _) => String::new(),
        (size, 0) => format!("size={size}m"),
        (size, inodes) => format!("size={size}m,nr_inodes={inodes}"),
    };
    debug!(call_id = c.call_id(), target = "/tmp", options = %options, "setting tmpfs");
    launch.host.tmpfs.insert("/tmp".into(), options);
}

fn configure_rootfs(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.read_only_root() {
        launch.host.readonly_rootfs = true;
    }
}

fn configure_iofs(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    let Some(socket) = c.task.socket.as_ref().filter(|s| !s.host_path.is_empty()) else {
        return;
    };
    let bind = format!("{}:{}", socket.host_path, socket.container_path);
    debug!(call_id = c.call_id(), bind = %bind, "setting bind");
    launch.host.binds.push(bind);
}

fn configure_volumes(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    for mapping in &c.task.volumes {
        launch
            .process
            .volumes
            .insert(mapping.container_dir.clone());
        let bind = format!("{}:{}", mapping.host_dir, mapping.container_dir);
        debug!(call_id = c.call_id(), volumes = %bind, "setting volumes");
        launch.host.binds.push(bind);
    }
}

fn configure_cpu(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.task.cpus == 0 {
        return;
    }
    let Some(quota) = c
        .task
        .cpus
        .checked_mul(100)
        .and_then(|q| i64::try_from(q).ok())
    else {
        warn!(call_id = c.call_id(), cpus = c.task.cpus, "cpu request too big (ignored)");
        return;
    };
    debug!(call_id = c.call_id(), quota, period = CPU_PERIOD_US, "setting CPU");
    launch.host.cpu_quota = Some(quota);
    launch.host.cpu_period = Some(CPU_PERIOD_US);
}

fn configure_workdir(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.task.working_dir.is_empty() {
        return;
    }
    debug!(call_id = c.call_id(), wd = %c.task.working_dir, "setting work dir");
    launch.process.working_dir = Some(c.task.working_dir.clone());
}

fn configure_network(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if launch.host.network_mode.is_some() {
        return;
    }

    if c.task.disable_net {
        launch.host.network_mode = Some(NetworkMode::Disabled);
        return;
    }

    if let Some(pool) = c.pool {
        match pool.alloc_pool_id() {
            Ok(id) if !id.is_empty() => {
                launch.host.network_mode = Some(NetworkMode::Container(id.clone()));
                c.grants.pool_id = Some(id);
                return;
            },
            Ok(_) => {},
            Err(e) => {
                error!(call_id = c.call_id(), error = %e, "could not fetch pre-fork pool container");
            },
        }
    }

    if let Some(id) = c
        .networks
        .and_then(|n| n.alloc_network())
        .filter(|id| !id.is_empty())
    {
        launch.host.network_mode = Some(NetworkMode::Named(id.clone()));
        c.grants.network_id = Some(id);
    }
}

fn configure_hostname(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    // The runtime rejects a hostname alongside a custom network mode.
    if launch.host.network_mode.is_some() {
        return;
    }
    debug!(call_id = c.call_id(), hostname = c.hostname, "setting hostname");
    launch.process.hostname = Some(c.hostname.into());
}

fn configure_cmd(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    let cmd: Vec<String> = c
        .task
        .command
        .split_whitespace()
        .map(String::from)
        .collect();
    if cmd.is_empty() {
        return;
    }
    debug!(call_id = c.call_id(), cmd = ?cmd, len = cmd.len(), "container command");
    launch.process.cmd = cmd;
}

fn configure_env(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    launch.process.env.extend(
        c.task
            .env
            .iter()
            .map(|(name, value)| format!("{name}={value}")),
    );
}

fn configure_security(c: &mut Configurator<'_>, launch: &mut LaunchConfig) {
    if c.config.disable_unprivileged_containers {
        return;
    }
    launch.process.user = Some(UNPRIVILEGED_USER.into());
    launch.host.cap_drop = vec!["all".into()];
    launch.host.security_opt = vec!["no-new-privileges:true".into()];
    debug!(
        call_id = c.call_id(),
        user = UNPRIVILEGED_USER,
        cap_drop = ?launch.host.cap_drop,
        security_opt = ?launch.host.security_opt,
        "setting security"
    );
}
