use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_host_sdk::{
    error::{check_cancelled, LifecycleError},
    service::{PausableService, Service, ServiceResult},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

const SERVICE_NAME: &str = "heartbeat";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatStatus {
    pub running: bool,
    pub paused: bool,
    pub beats: u64,
    pub last_beat: Option<DateTime<Utc>>,
}

struct Worker {
    cancel_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

#[derive(Default)]
struct Pulse {
    paused: AtomicBool,
    beats: AtomicU64,
    last_beat: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl Pulse {
    fn beat(&self) {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }

        let count = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        if let Ok(mut last) = self.last_beat.lock() {
            *last = Some(now);
        }

        tracing::debug!("Heartbeat #{} at {}", count, now.to_rfc3339());
    }
}

/// Background worker ticking on a fixed interval. Pausing keeps the task
/// alive and skips ticks until resumed.
pub struct HeartbeatService {
    interval: Duration,
    pulse: Arc<Pulse>,
    worker: Mutex<Option<Worker>>,
}

impl HeartbeatService {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pulse: Arc::new(Pulse::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn beats(&self) -> u64 {
        self.pulse.beats.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pulse.paused.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    pub async fn status(&self) -> HeartbeatStatus {
        HeartbeatStatus {
            running: self.is_running().await,
            paused: self.is_paused(),
            beats: self.beats(),
            last_beat: self.pulse.last_beat.lock().ok().and_then(|last| *last),
        }
    }

    fn spawn(&self) -> Worker {
        let token = CancellationToken::new();
        let pulse = self.pulse.clone();
        let interval = self.interval;

        let task_handle = tokio::spawn({
            let token = token.clone();

            async move {
                let mut ticker = tokio::time::interval(interval);

                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            tracing::debug!("Heartbeat worker cancelled.");
                            break;
                        }
                        _ = ticker.tick() => pulse.beat(),
                    }
                }
            }
        });

        Worker { cancel_token: token, task_handle }
    }
}

#[async_trait]
impl Service for HeartbeatService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        check_cancelled(cancellation_token, SERVICE_NAME)?;

        let mut guard = self.worker.lock().await;

        if guard.is_some() {
            return Err(LifecycleError::already_running(SERVICE_NAME).into());
        }

        self.pulse.paused.store(false, Ordering::SeqCst);
        *guard = Some(self.spawn());

        tracing::info!("Heartbeat started with interval {:?}", self.interval);

        Ok(())
    }

    // Stopping a service that is not running is a no-op so a failed start
    // can be unwound with a full stop.
    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        let Some(mut worker) = self.worker.lock().await.take() else {
            tracing::debug!("Heartbeat is not running, nothing to stop.");
            return Ok(());
        };

        worker.cancel_token.cancel();

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                tracing::warn!("Heartbeat stop cancelled, aborting worker.");
                worker.task_handle.abort();
            }
            result = &mut worker.task_handle => {
                if let Err(e) = result {
                    tracing::error!("Heartbeat worker ended abnormally: {:?}", e);
                }
            }
        }

        tracing::info!("Heartbeat stopped after {} beat(s).", self.beats());

        Ok(())
    }

    fn as_pausable(&self) -> Option<&dyn PausableService> {
        Some(self)
    }
}

#[async_trait]
impl PausableService for HeartbeatService {
    async fn pause(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        check_cancelled(cancellation_token, SERVICE_NAME)?;

        if !self.is_running().await {
            return Err(LifecycleError::not_running(SERVICE_NAME).into());
        }

        self.pulse.paused.store(true, Ordering::SeqCst);
        tracing::info!("Heartbeat paused.");

        Ok(())
    }

    async fn resume(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        check_cancelled(cancellation_token, SERVICE_NAME)?;

        if !self.is_running().await {
            return Err(LifecycleError::not_running(SERVICE_NAME).into());
        }

        self.pulse.paused.store(false, Ordering::SeqCst);
        tracing::info!("Heartbeat resumed.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_start_beats_until_stopped() {
        let service = HeartbeatService::new(TICK);
        let token = CancellationToken::new();

        service.start(&token).await.unwrap();
        tokio::time::sleep(TICK * 5).await;
        service.stop(&token).await.unwrap();

        let beats = service.beats();
        assert!(beats > 0);
        assert!(!service.is_running().await);

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(service.beats(), beats);

        let status = service.status().await;
        assert!(status.last_beat.is_some());
        assert!(!status.running);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let service = HeartbeatService::new(TICK);
        let token = CancellationToken::new();

        service.start(&token).await.unwrap();
        let err = service.start(&token).await.unwrap_err();
        service.stop(&token).await.unwrap();

        assert_eq!(err.downcast_ref::<LifecycleError>(), Some(&LifecycleError::already_running("heartbeat")));
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_a_no_op() {
        let service = HeartbeatService::new(TICK);

        service.stop(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_with_cancelled_token_fails() {
        let service = HeartbeatService::new(TICK);
        let token = CancellationToken::new();
        token.cancel();

        let err = service.start(&token).await.unwrap_err();

        assert_eq!(err.downcast_ref::<LifecycleError>(), Some(&LifecycleError::cancelled("heartbeat")));
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_with_cancelled_token_aborts_worker() {
        let service = HeartbeatService::new(TICK);
        service.start(&CancellationToken::new()).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        service.stop(&token).await.unwrap();

        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_pause_skips_beats_until_resumed() {
        let service = HeartbeatService::new(TICK);
        let token = CancellationToken::new();

        service.start(&token).await.unwrap();
        tokio::time::sleep(TICK * 3).await;

        service.pause(&token).await.unwrap();
        assert!(service.is_paused());
        tokio::time::sleep(TICK * 2).await;
        let paused_at = service.beats();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(service.beats(), paused_at);
        assert!(service.is_running().await);

        service.resume(&token).await.unwrap();
        tokio::time::sleep(TICK * 5).await;
        service.stop(&token).await.unwrap();

        assert!(service.beats() > paused_at);
    }

    #[tokio::test]
    async fn test_pause_requires_running_worker() {
        let service = HeartbeatService::new(TICK);

        let err = service.pause(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.downcast_ref::<LifecycleError>(), Some(&LifecycleError::not_running("heartbeat")));
    }

    #[test]
    fn test_is_pausable() {
        let service = HeartbeatService::new(TICK);
        assert!(service.as_pausable().is_some());
        assert_eq!(Service::name(&service), "heartbeat");
    }
}
