//! Per-task container lifecycle: launch configuration, image coordination and
//! the execution cookie that drives validate → pull → create → run → close.
//!
//! The container runtime, image cache, namespace pool, network allocator and
//! image puller are collaborators behind traits; this crate owns only the
//! sequencing and the exactly-once release of everything a task acquires.
//!
//! # Example
//!
//! ```ignore
//! use berth_driver::{Driver, TaskSpec};
//!
//! let driver = Arc::new(Driver::new(config, runtime, puller).with_image_cache(cache));
//! let mut cookie = driver.create_cookie(Arc::new(task));
//!
//! if cookie.validate_image(&cancel).await? {
//!     cookie.pull_image(&cancel).await?;
//! }
//! cookie.create_container(&cancel).await?;
//! let result = cookie.run(&cancel).await;
//! cookie.close(&cancel).await?;
//! ```

mod cancel;
pub mod cache;
pub mod configure;
pub mod cookie;
mod coordinator;
pub mod driver;
pub mod error;
pub mod image;
pub mod launch;
pub mod pool;
pub mod puller;
pub mod runtime;
pub mod task;

pub use {
    cache::ImageCache,
    configure::{Configured, Configurator},
    cookie::Cookie,
    driver::Driver,
    error::{DriverError, Result, RuntimeError},
    image::{AuthConfig, CachedImage, ImageRef},
    launch::{HostOptions, LaunchConfig, LogConfig, NetworkMode, ProcessOptions, Ulimit},
    pool::{Grants, NetworkAllocator, PoolAllocator},
    puller::{ImagePuller, PullCompletion},
    runtime::{ContainerRuntime, ExitStatus, InspectedImage, RemoveOptions},
    task::{
        Authenticator, ContainerTask, LogTag, LoggerConfig, RunStatus, SocketMount, TaskSpec,
        VolumeMapping, WaitResult,
    },
};
