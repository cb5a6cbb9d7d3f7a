use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a service can report from its lifecycle hooks.
///
/// Hooks return `anyhow::Result`, so a service is free to fail with any error
/// type. These variants cover the conditions most services share and let
/// callers of a host `downcast_ref` the failure they got back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Lifecycle operation cancelled for service '{service}'")]
    Cancelled { service: String },

    #[error("Service '{service}' is already running")]
    AlreadyRunning { service: String },

    #[error("Service '{service}' is not running")]
    NotRunning { service: String },

    #[error("Service '{service}' failed: {reason}")]
    Failed { service: String, reason: String },
}

impl LifecycleError {
    pub fn cancelled(service: &str) -> Self {
        LifecycleError::Cancelled { service: service.to_string() }
    }

    pub fn already_running(service: &str) -> Self {
        LifecycleError::AlreadyRunning { service: service.to_string() }
    }

    pub fn not_running(service: &str) -> Self {
        LifecycleError::NotRunning { service: service.to_string() }
    }

    pub fn failed(service: &str, reason: impl Into<String>) -> Self {
        LifecycleError::Failed { service: service.to_string(), reason: reason.into() }
    }
}

/// Returns `Err(LifecycleError::Cancelled)` once the token has been cancelled.
pub fn check_cancelled(token: &CancellationToken, service: &str) -> Result<(), LifecycleError> {
    if token.is_cancelled() {
        return Err(LifecycleError::cancelled(service));
    }

    Ok(())
}
