//! Container runtime client boundary.

use async_trait::async_trait;

use crate::{
    error::RuntimeError,
    launch::{HostOptions, ProcessOptions},
};

/// Image metadata returned by an inspect call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectedImage {
    pub id: String,
    pub parent_id: String,
    pub repo_tags: Vec<String>,
    pub size: u64,
    /// Volumes declared by the image config (`VOLUME` instructions).
    pub volumes: Vec<String>,
}

/// Exit of a waited-on container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub exit_code: i64,
    pub oom_killed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    pub force: bool,
    pub remove_volumes: bool,
}

/// Calls the driver issues against the container runtime.
///
/// Every call may be long-running; the cookie drops the returned future when
/// the caller cancels, so implementations must tolerate being abandoned at
/// any await point.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Returns [`RuntimeError::NoSuchImage`] when the image is not present locally.
    async fn inspect_image(&self, image: &str) -> Result<InspectedImage, RuntimeError>;

    /// Create a container named `name`. Returns the runtime's container id.
    async fn create_container(
        &self,
        name: &str,
        process: &ProcessOptions,
        host: &HostOptions,
    ) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Block until the container exits.
    async fn wait_container(&self, id: &str) -> Result<ExitStatus, RuntimeError>;

    async fn pause_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn unpause_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, id: &str, opts: RemoveOptions) -> Result<(), RuntimeError>;
}
