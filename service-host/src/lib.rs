mod config;


use std::sync::Arc;

use async_trait::async_trait;
use service_host_sdk::{host::ServiceHost, service::{LifecycleHook, PausableService, Service, ServiceResult}};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub use config::{HostConfig, DEFAULT_HOST_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Registration order.
    Forward,

    /// Reverse registration order, last registered first.
    Reverse,
}

/// Order in which the host walks its services for a given operation.
///
/// Later services are assumed to sit on top of earlier ones, so they come up
/// last and go down first.
pub fn traversal(operation: LifecycleHook) -> Traversal {
    match operation {
        LifecycleHook::Start | LifecycleHook::Pause => Traversal::Forward,
        LifecycleHook::Stop | LifecycleHook::Resume => Traversal::Reverse,
    }
}

/// The hook actually invoked on `service` when the host runs `operation`.
/// Services without the pausable capability are stopped instead of paused
/// and started instead of resumed.
pub fn resolve_hook(service: &dyn Service, operation: LifecycleHook) -> LifecycleHook {
    HookCall::resolve(service, operation).hook()
}

/// A lifecycle hook bound to the handle it will be called on.
enum HookCall<'a> {
    Start(&'a dyn Service),
    Stop(&'a dyn Service),
    Pause(&'a dyn PausableService),
    Resume(&'a dyn PausableService),
}

impl<'a> HookCall<'a> {
    fn resolve(service: &'a dyn Service, operation: LifecycleHook) -> Self {
        match (operation, service.as_pausable()) {
            (LifecycleHook::Start, _) | (LifecycleHook::Resume, None) => HookCall::Start(service),
            (LifecycleHook::Stop, _) | (LifecycleHook::Pause, None) => HookCall::Stop(service),
            (LifecycleHook::Pause, Some(pausable)) => HookCall::Pause(pausable),
            (LifecycleHook::Resume, Some(pausable)) => HookCall::Resume(pausable),
        }
    }

    fn hook(&self) -> LifecycleHook {
        match self {
            HookCall::Start(_) => LifecycleHook::Start,
            HookCall::Stop(_) => LifecycleHook::Stop,
            HookCall::Pause(_) => LifecycleHook::Pause,
            HookCall::Resume(_) => LifecycleHook::Resume,
        }
    }

    async fn call(self, cancellation_token: &CancellationToken) -> ServiceResult {
        match self {
            HookCall::Start(service) => service.start(cancellation_token).await,
            HookCall::Stop(service) => service.stop(cancellation_token).await,
            HookCall::Pause(pausable) => pausable.pause(cancellation_token).await,
            HookCall::Resume(pausable) => pausable.resume(cancellation_token).await,
        }
    }
}

pub struct ServiceHostBuilder {
    config: HostConfig,
    services: Vec<Arc<dyn Service>>,
}

impl ServiceHostBuilder {
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
            services: Vec::new(),
        }
    }

    pub fn with_config(&mut self, config: HostConfig) -> &mut Self {
        self.config = config;

        return self;
    }

    /// Appends a service. Registration order is start order.
    pub fn register_service(&mut self, service: Arc<dyn Service>) -> &mut Self {
        self.services.push(service);

        return self;
    }

    pub fn build(self) -> SequentialServiceHost {
        SequentialServiceHost {
            config: self.config,
            services: self.services.into(),
        }
    }
}

impl Default for ServiceHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts, stops, pauses and continues a fixed list of services one at a
/// time, stopping at the first failure.
///
/// Nothing is rolled back on failure: services already transitioned stay
/// that way and the error is returned as the service produced it. The host
/// takes no locks, so concurrent orchestration calls on one host must be
/// serialized by the caller.
pub struct SequentialServiceHost {
    config: HostConfig,
    services: Arc<[Arc<dyn Service>]>,
}

impl SequentialServiceHost {
    /// Freezes `services` in iteration order.
    pub fn new<I>(services: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Service>>,
    {
        Self::with_config(HostConfig::default(), services)
    }

    pub fn with_config<I>(config: HostConfig, services: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Service>>,
    {
        Self {
            config,
            services: services.into_iter().collect(),
        }
    }

    pub fn builder() -> ServiceHostBuilder {
        ServiceHostBuilder::new()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        self.run(LifecycleHook::Start, cancellation_token).await
    }

    pub async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        self.run(LifecycleHook::Stop, cancellation_token).await
    }

    pub async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        self.run(LifecycleHook::Pause, cancellation_token).await
    }

    /// Continues the services after a pause.
    pub async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        self.run(LifecycleHook::Resume, cancellation_token).await
    }

    async fn run(&self, operation: LifecycleHook, cancellation_token: &CancellationToken) -> ServiceResult {
        let span = tracing::info_span!(
            "host",
            host = %self.config.name,
            operation = operation.as_str(),
            activity_id = %Uuid::new_v4()
        );

        self.sequence(operation, cancellation_token)
            .instrument(span)
            .await
    }

    async fn sequence(&self, operation: LifecycleHook, cancellation_token: &CancellationToken) -> ServiceResult {
        let ordered: Vec<(usize, &Arc<dyn Service>)> = match traversal(operation) {
            Traversal::Forward => self.services.iter().enumerate().collect(),
            Traversal::Reverse => self.services.iter().enumerate().rev().collect(),
        };

        tracing::info!("Running {} across {} service(s)", operation, ordered.len());

        for (position, service) in ordered {
            invoke(position, service.as_ref(), operation, cancellation_token).await?;
        }

        tracing::info!("Completed {}", operation);

        Ok(())
    }
}

async fn invoke(
    position: usize,
    service: &dyn Service,
    operation: LifecycleHook,
    cancellation_token: &CancellationToken,
) -> ServiceResult {
    let call = HookCall::resolve(service, operation);
    let hook = call.hook();

    tracing::debug!(service = service.name(), position, hook = hook.as_str(), "Invoking lifecycle hook");

    let result = call.call(cancellation_token).await;

    if let Err(e) = &result {
        tracing::error!(service = service.name(), position, hook = hook.as_str(), "Lifecycle hook failed: {:?}", e);
    }

    result
}

#[async_trait]
impl ServiceHost for SequentialServiceHost {
    fn services(&self) -> &[Arc<dyn Service>] {
        SequentialServiceHost::services(self)
    }

    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::start(self, cancellation_token).await
    }

    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::stop(self, cancellation_token).await
    }

    async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::pause(self, cancellation_token).await
    }

    async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::resume(self, cancellation_token).await
    }
}

// A host can itself be registered with a parent host.
#[async_trait]
impl Service for SequentialServiceHost {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::start(self, cancellation_token).await
    }

    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::stop(self, cancellation_token).await
    }

    fn as_pausable(&self) -> Option<&dyn PausableService> {
        Some(self)
    }
}

#[async_trait]
impl PausableService for SequentialServiceHost {
    async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::pause(self, cancellation_token).await
    }

    async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        SequentialServiceHost::resume(self, cancellation_token).await
    }
}
