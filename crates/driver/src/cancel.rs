use tokio_util::sync::CancellationToken;

use crate::error::DriverError;

/// Drive `fut` to completion unless `cancel` fires first, in which case the
/// future is dropped and [`DriverError::Cancelled`] is returned.
pub(crate) async fn race<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, DriverError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DriverError::Cancelled),
        out = fut => Ok(out),
    }
}
