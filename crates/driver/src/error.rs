//! Driver error types.

use {http::StatusCode, thiserror::Error};

/// Errors reported by a [`ContainerRuntime`](crate::runtime::ContainerRuntime) client.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no such image: {0}")]
    NoSuchImage(String),

    #[error("no such container: {0}")]
    NoSuchContainer(String),

    #[error("runtime API error: {0}")]
    Api(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by cookie operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The image declares a `VOLUME` and the driver forbids that.
    #[error("image has Volume definition")]
    ImageHasVolume,

    /// The image vanished between pull and create. Retry the task elsewhere.
    #[error("server busy: image removed before container create, retry elsewhere")]
    ServerBusy,

    /// A cookie method was called out of sequence.
    #[error("invalid usage: {0}")]
    InvalidUsage(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("registry authentication failed")]
    Auth(#[source] anyhow::Error),

    #[error("image pull failed")]
    Pull(#[source] anyhow::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl DriverError {
    /// HTTP status a front end should answer with for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ImageHasVolume => StatusCode::BAD_REQUEST,
            Self::ServerBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Pull(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUsage(_) | Self::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the task may succeed if resubmitted to another runner.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerBusy)
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DriverError::ImageHasVolume, StatusCode::BAD_REQUEST)]
    #[case(DriverError::ServerBusy, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(DriverError::Cancelled, StatusCode::REQUEST_TIMEOUT)]
    #[case(DriverError::InvalidUsage("x"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(
        DriverError::Runtime(RuntimeError::Api("boom".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn maps_to_status(#[case] err: DriverError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn wrapped_errors_print_cause_once() {
        use std::error::Error as _;

        let err = DriverError::Pull(anyhow::anyhow!("manifest unknown"));
        assert_eq!(err.to_string(), "image pull failed");
        assert_eq!(err.source().unwrap().to_string(), "manifest unknown");

        let err = DriverError::Auth(anyhow::anyhow!("token expired"));
        assert_eq!(err.to_string(), "registry authentication failed");
        assert_eq!(err.source().unwrap().to_string(), "token expired");
    }

    #[test]
    fn only_server_busy_is_retryable() {
        assert!(DriverError::ServerBusy.is_retryable());
        assert!(!DriverError::ImageHasVolume.is_retryable());
        assert!(!DriverError::Cancelled.is_retryable());
    }
}
