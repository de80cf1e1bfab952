//! Long-lived driver shared by every cookie on a runner.

use std::sync::Arc;

use {berth_config::DriverConfig, tracing::warn};

use crate::{
    cache::ImageCache,
    configure::Configurator,
    cookie::Cookie,
    pool::{NetworkAllocator, PoolAllocator},
    puller::ImagePuller,
    runtime::ContainerRuntime,
    task::ContainerTask,
};

/// Immutable settings plus handles to the shared collaborators.
pub struct Driver {
    config: DriverConfig,
    hostname: String,
    instance_id: String,
    runtime: Arc<dyn ContainerRuntime>,
    puller: Arc<dyn ImagePuller>,
    cache: Option<Arc<dyn ImageCache>>,
    pool: Option<Arc<dyn PoolAllocator>>,
    networks: Option<Arc<dyn NetworkAllocator>>,
}

impl Driver {
    pub fn new(
        config: DriverConfig,
        runtime: Arc<dyn ContainerRuntime>,
        puller: Arc<dyn ImagePuller>,
    ) -> Self {
        let hostname = config.hostname.clone().unwrap_or_else(local_hostname);
        let instance_id = config
            .instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            config,
            hostname,
            instance_id,
            runtime,
            puller,
            cache: None,
            pool: None,
            networks: None,
        }
    }

    #[must_use]
    pub fn with_image_cache(mut self, cache: Arc<dyn ImageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: Arc<dyn PoolAllocator>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_networks(mut self, networks: Arc<dyn NetworkAllocator>) -> Self {
        self.networks = Some(networks);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Hostname handed to containers that keep the default network.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub(crate) fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    pub(crate) fn puller(&self) -> &dyn ImagePuller {
        self.puller.as_ref()
    }

    pub(crate) fn cache(&self) -> Option<&dyn ImageCache> {
        self.cache.as_deref()
    }

    pub(crate) fn pool(&self) -> Option<&dyn PoolAllocator> {
        self.pool.as_deref()
    }

    pub(crate) fn networks(&self) -> Option<&dyn NetworkAllocator> {
        self.networks.as_deref()
    }

    /// Configure `task` and wrap it in a cookie.
    ///
    /// Any pool container or network borrowed during configuration belongs
    /// to the returned cookie and is released by [`Cookie::close`].
    pub fn create_cookie(self: &Arc<Self>, task: Arc<dyn ContainerTask>) -> Cookie {
        let configured = Configurator::new(
            task.spec(),
            &self.config,
            &self.hostname,
            &self.instance_id,
        )
        .with_pool(self.pool())
        .with_networks(self.networks())
        .build();
        Cookie::new(Arc::clone(self), task, configured)
    }
}

fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "could not read hostname, using localhost");
            "localhost".into()
        },
    }
}
