//! Image validation, registry auth and pulls for a cookie.

use {
    anyhow::anyhow,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    cancel::race,
    cookie::Cookie,
    error::{DriverError, Result, RuntimeError},
    image::{AuthConfig, CachedImage, find_registry_auth},
};

impl Cookie {
    /// Check the image is present locally. Returns `true` when it must be pulled.
    ///
    /// Once an image record is captured, later calls return `false` at once.
    /// An image declaring volumes while the driver forbids them is still
    /// captured and reported to the cache before [`DriverError::ImageHasVolume`]
    /// is returned.
    pub async fn validate_image(&mut self, cancel: &CancellationToken) -> Result<bool> {
        if self.image.is_some() {
            return Ok(false);
        }

        let image = self.launch.process.image.clone();
        let inspected = match race(cancel, self.driver.runtime().inspect_image(&image)).await? {
            Ok(inspected) => inspected,
            Err(RuntimeError::NoSuchImage(_)) => {
                debug!(call_id = self.task_id(), stack = "ValidateImage", image = %image, "image not present");
                return Ok(true);
            },
            Err(e) => {
                error!(call_id = self.task_id(), stack = "ValidateImage", image = %image, error = %e, "error inspecting image");
                return Err(e.into());
            },
        };

        let record = CachedImage::from(&inspected);
        let cache = self.driver.cache();

        if !self.driver.config().image_enable_volume && !inspected.volumes.is_empty() {
            warn!(
                call_id = self.task_id(),
                stack = "ValidateImage",
                image = %image,
                volumes = ?inspected.volumes,
                "image has Volume definition"
            );
            // TODO: confirm with product whether a forbidden-volume image
            // should be offered to the cache for eviction here.
            if let Some(cache) = cache {
                cache.update(&record);
            }
            self.image = Some(record);
            return Err(DriverError::ImageHasVolume);
        }

        if let Some(cache) = cache {
            cache.mark_busy(&record);
        }
        debug!(call_id = self.task_id(), stack = "ValidateImage", image = %image, image_id = %record.id, "image validated");
        self.image = Some(record);
        Ok(false)
    }

    /// Pull the image through the driver's puller and capture it.
    ///
    /// A no-op once an image record is captured.
    pub async fn pull_image(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.image.is_some() {
            return Ok(());
        }

        let image = self.launch.process.image.clone();
        let auth = self.auth_image(cancel).await?;
        info!(
            call_id = self.task_id(),
            stack = "PullImage",
            image = %image,
            registry = %auth.server_address,
            "pulling image"
        );

        let completion = self.driver.puller().pull_image(cancel.clone(), auth, &image);
        match race(cancel, completion).await? {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                error!(call_id = self.task_id(), stack = "PullImage", image = %image, error = %e, "image pull failed");
                return Err(DriverError::Pull(e));
            },
            Err(_) => {
                error!(call_id = self.task_id(), stack = "PullImage", image = %image, "puller dropped the completion signal");
                return Err(DriverError::Pull(anyhow!("pull of {image} abandoned by puller")));
            },
        }

        if self.validate_image(cancel).await? {
            return Err(DriverError::Pull(anyhow!("image {image} missing after pull")));
        }
        Ok(())
    }

    /// Static registry credentials, overridden by the task's authenticator.
    async fn auth_image(&self, cancel: &CancellationToken) -> Result<AuthConfig> {
        let auth = find_registry_auth(&self.image_ref.registry, &self.driver.config().registries);

        let Some(authenticator) = self.task.authenticator() else {
            return Ok(auth);
        };
        let image = &self.launch.process.image;
        match race(cancel, authenticator.docker_auth(image)).await? {
            Ok(Some(custom)) => {
                debug!(call_id = self.task_id(), stack = "AuthImage", image = %image, "using task credentials");
                Ok(custom)
            },
            Ok(None) => Ok(auth),
            Err(e) => {
                error!(call_id = self.task_id(), stack = "AuthImage", image = %image, error = %e, "failed getting task credentials");
                Err(DriverError::Auth(e))
            },
        }
    }
}
