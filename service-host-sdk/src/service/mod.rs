
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub type ServiceResult = anyhow::Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    /// Brings the service into its running state.
    Start,

    /// Takes the service out of its running state, releasing what it holds.
    Stop,

    /// Suspends a running service in place. Only pausable services have it.
    Pause,

    /// Picks a paused service back up. Only pausable services have it.
    Resume,
}

impl LifecycleHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::Start => "start",
            LifecycleHook::Stop => "stop",
            LifecycleHook::Pause => "pause",
            LifecycleHook::Resume => "resume",
        }
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-running component whose start and stop are driven by a host.
#[async_trait]
pub trait Service: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Starts the service (e.g., bind a socket, spawn a tokio task).
    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    /// Stops the service (e.g., cancel task, clean up). The token signals
    /// that the shutdown should no longer be graceful.
    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    fn as_pausable(&self) -> Option<&dyn PausableService> {
        None
    }
}

/// Services that can suspend and continue in place instead of being fully
/// stopped and started again.
#[async_trait]
pub trait PausableService: Service {
    async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult;
}
