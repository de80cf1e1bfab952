//! Local image cache boundary.

use crate::image::CachedImage;

/// Occupancy accounting for locally cached images.
///
/// Calls are fire-and-forget. Implementations are shared by every cookie on
/// the driver and must be safe for concurrent use.
pub trait ImageCache: Send + Sync {
    /// A cookie is about to use `image`; it must not be evicted.
    fn mark_busy(&self, image: &CachedImage);

    /// The cookie holding `image` has closed.
    fn mark_free(&self, image: &CachedImage);

    /// Record `image` without pinning it, leaving eviction to the cache.
    fn update(&self, image: &CachedImage);
}
