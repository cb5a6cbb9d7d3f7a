use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::service::{Service, ServiceResult};

/// Drives the lifecycle of an ordered, fixed set of services.
///
/// Implementations issue one service call at a time and stop at the first
/// failure, returning it unchanged. Concurrent calls on the same host are not
/// coordinated; callers must serialize them.
#[async_trait]
pub trait ServiceHost: Send + Sync {
    /// The registered services, in registration order.
    fn services(&self) -> &[Arc<dyn Service>];

    /// Starts every service in registration order.
    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    /// Stops every service in reverse registration order.
    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    /// Pauses every service in registration order, stopping the ones that
    /// cannot pause.
    async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult;

    /// Continues every service in reverse registration order, starting the
    /// ones that cannot pause.
    async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult;
}
