//! The per-task execution cookie.
//!
//! A cookie owns one launch configuration plus whatever it borrowed while
//! being configured (a pool container or a named network) and, after
//! validation, a claim on a cached image. [`Cookie::close`] consumes the
//! cookie and releases all of them, whatever state the sequence reached.

use std::sync::Arc;

use {
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    cancel::race,
    configure::Configured,
    driver::Driver,
    error::{DriverError, Result, RuntimeError},
    image::{CachedImage, ImageRef},
    launch::LaunchConfig,
    runtime::RemoveOptions,
    task::{ContainerTask, WaitResult},
};

pub struct Cookie {
    pub(crate) driver: Arc<Driver>,
    pub(crate) task: Arc<dyn ContainerTask>,
    pub(crate) launch: LaunchConfig,
    pub(crate) image_ref: ImageRef,
    pub(crate) pool_id: Option<String>,
    pub(crate) network_id: Option<String>,
    /// Image record captured by validation. Holds the single cache claim.
    pub(crate) image: Option<CachedImage>,
    /// Set once a runtime container may exist. Holds the runtime's id after a
    /// successful create, or the task name when the create was cancelled.
    pub(crate) container_id: Option<String>,
    released: bool,
}

impl Cookie {
    pub(crate) fn new(
        driver: Arc<Driver>,
        task: Arc<dyn ContainerTask>,
        configured: Configured,
    ) -> Self {
        let Configured {
            launch,
            image_ref,
            grants,
        } = configured;
        Self {
            driver,
            task,
            launch,
            image_ref,
            pool_id: grants.pool_id,
            network_id: grants.network_id,
            image: None,
            container_id: None,
            released: false,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task.spec().id
    }

    /// The launch configuration this cookie will create its container with.
    pub fn container_options(&self) -> &LaunchConfig {
        &self.launch
    }

    pub fn image_ref(&self) -> &ImageRef {
        &self.image_ref
    }

    pub fn pool_id(&self) -> Option<&str> {
        self.pool_id.as_deref()
    }

    pub fn network_id(&self) -> Option<&str> {
        self.network_id.as_deref()
    }

    pub fn image(&self) -> Option<&CachedImage> {
        self.image.as_ref()
    }

    pub fn container_created(&self) -> bool {
        self.container_id.is_some()
    }

    /// Create the runtime container. A second call after success is a no-op.
    ///
    /// Requires a validated image. If the image was evicted after validation
    /// the error is [`DriverError::ServerBusy`] and the task should be retried
    /// on another runner.
    pub async fn create_container(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.container_id.is_some() {
            return Ok(());
        }
        if self.image.is_none() {
            error!(
                call_id = self.task_id(),
                stack = "CreateContainer",
                "create_container called before validate_image"
            );
            return Err(DriverError::InvalidUsage("image not validated"));
        }

        let name = self.task.spec().id.clone();
        debug!(call_id = %name, stack = "CreateContainer", image = %self.launch.process.image, "creating container");

        let created = race(
            cancel,
            self.driver
                .runtime()
                .create_container(&name, &self.launch.process, &self.launch.host),
        )
        .await;

        match created {
            Ok(Ok(id)) => {
                info!(call_id = %name, stack = "CreateContainer", container = %id, "container created");
                self.container_id = Some(id);
                Ok(())
            },
            Ok(Err(RuntimeError::NoSuchImage(image))) => {
                error!(
                    call_id = %name,
                    stack = "CreateContainer",
                    image = %image,
                    "image gone before create, reporting server busy"
                );
                Err(DriverError::ServerBusy)
            },
            Ok(Err(e)) => {
                error!(call_id = %name, stack = "CreateContainer", error = %e, "could not create container");
                Err(e.into())
            },
            Err(cancelled) => {
                // The runtime may have finished the create anyway.
                warn!(call_id = %name, stack = "CreateContainer", "create cancelled, container may exist");
                self.container_id = Some(name);
                Err(cancelled)
            },
        }
    }

    /// Start the container and wait for it to exit.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<WaitResult> {
        let id = self.created_id()?;
        let runtime = self.driver.runtime();

        race(cancel, runtime.start_container(id))
            .await?
            .inspect_err(|e| {
                error!(call_id = self.task_id(), stack = "Run", container = id, error = %e, "could not start container");
            })?;
        debug!(call_id = self.task_id(), stack = "Run", container = id, "container started");

        let exit = race(cancel, runtime.wait_container(id)).await?.inspect_err(|e| {
            error!(call_id = self.task_id(), stack = "Run", container = id, error = %e, "wait failed");
        })?;
        let result = WaitResult::from_exit(exit.exit_code, exit.oom_killed);
        info!(
            call_id = self.task_id(),
            stack = "Run",
            container = id,
            exit_code = result.exit_code,
            status = %result.status,
            "container exited"
        );
        Ok(result)
    }

    pub async fn freeze(&self, cancel: &CancellationToken) -> Result<()> {
        let id = self.created_id()?;
        race(cancel, self.driver.runtime().pause_container(id))
            .await?
            .inspect_err(|e| {
                error!(call_id = self.task_id(), stack = "Freeze", container = id, error = %e, "error pausing container");
            })?;
        Ok(())
    }

    pub async fn unfreeze(&self, cancel: &CancellationToken) -> Result<()> {
        let id = self.created_id()?;
        race(cancel, self.driver.runtime().unpause_container(id))
            .await?
            .inspect_err(|e| {
                error!(call_id = self.task_id(), stack = "Unfreeze", container = id, error = %e, "error unpausing container");
            })?;
        Ok(())
    }

    /// Remove the container and release every claim this cookie holds.
    ///
    /// Returns the container removal error, if any. The pool grant, network
    /// grant and cache claim are released regardless.
    pub async fn close(mut self, cancel: &CancellationToken) -> Result<()> {
        let mut first_err = None;

        if let Some(id) = self.container_id.take() {
            let opts = RemoveOptions {
                force: true,
                remove_volumes: true,
            };
            match race(cancel, self.driver.runtime().remove_container(&id, opts)).await {
                Ok(Ok(())) => {
                    debug!(call_id = self.task_id(), stack = "Close", container = %id, "container removed");
                },
                Ok(Err(RuntimeError::NoSuchContainer(_))) => {
                    debug!(call_id = self.task_id(), stack = "Close", container = %id, "container already gone");
                },
                Ok(Err(e)) => {
                    error!(call_id = self.task_id(), stack = "Close", container = %id, error = %e, "error removing container");
                    first_err = Some(e.into());
                },
                Err(cancelled) => {
                    error!(call_id = self.task_id(), stack = "Close", container = %id, "container removal cancelled");
                    first_err = Some(cancelled);
                },
            }
        }

        self.release_claims();
        first_err.map_or(Ok(()), Err)
    }

    fn release_claims(&mut self) {
        let driver = Arc::clone(&self.driver);
        if let Some(id) = self.pool_id.take()
            && let Some(pool) = driver.pool()
        {
            pool.free_pool_id(&id);
        }
        if let Some(id) = self.network_id.take()
            && let Some(networks) = driver.networks()
        {
            networks.free_network(&id);
        }
        if let Some(image) = self.image.take()
            && let Some(cache) = driver.cache()
        {
            cache.mark_free(&image);
        }
        self.released = true;
    }

    fn created_id(&self) -> Result<&str> {
        self.container_id
            .as_deref()
            .ok_or(DriverError::InvalidUsage("container not created"))
    }
}

impl Drop for Cookie {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Container removal needs the runtime; the other claims are synchronous.
        if let Some(id) = self.container_id.as_deref() {
            warn!(
                call_id = self.task_id(),
                container = id,
                "cookie dropped without close, container leaked"
            );
        }
        if self.pool_id.is_some() || self.network_id.is_some() || self.image.is_some() {
            warn!(
                call_id = self.task_id(),
                pool_id = self.pool_id.as_deref(),
                network_id = self.network_id.as_deref(),
                image = self.image.as_ref().map(|i| i.id.as_str()),
                "cookie dropped without close, releasing claims"
            );
        }
        self.release_claims();
    }
}

impl std::fmt::Debug for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cookie")
            .field("task_id", &self.task_id())
            .field("image_ref", &self.image_ref)
            .field("pool_id", &self.pool_id)
            .field("network_id", &self.network_id)
            .field("image", &self.image)
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}
