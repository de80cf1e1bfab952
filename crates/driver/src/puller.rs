//! Image puller boundary.

use {tokio::sync::oneshot, tokio_util::sync::CancellationToken};

use crate::image::AuthConfig;

/// Resolves once the pull finishes.
pub type PullCompletion = oneshot::Receiver<anyhow::Result<()>>;

/// Transfers images from a registry into the local runtime.
///
/// Implementations typically coalesce concurrent pulls of the same image;
/// the signal fires for every caller once the shared transfer ends. The
/// puller should stop work for this caller when `cancel` fires.
pub trait ImagePuller: Send + Sync {
    fn pull_image(&self, cancel: CancellationToken, auth: AuthConfig, image: &str)
    -> PullCompletion;
}
