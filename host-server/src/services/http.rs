use std::{net::SocketAddr, sync::Arc};

use actix_web::{
    dev::ServerHandle, get, middleware::{DefaultHeaders, Logger}, web, App, HttpResponse, HttpServer, Responder,
};
use anyhow::Context;
use async_trait::async_trait;
use service_host_sdk::{
    error::{check_cancelled, LifecycleError},
    service::{Service, ServiceResult},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::heartbeat::HeartbeatService;
use crate::version;

const SERVICE_NAME: &str = "http-listener";

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind: String,
    pub port: u16,
    pub workers: usize,
}

struct RunningServer {
    handle: ServerHandle,
    task_handle: JoinHandle<std::io::Result<()>>,
    addrs: Vec<SocketAddr>,
}

#[get("/version")]
async fn version_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "version": version::get_version_string(),
        "gitSha": version::git_sha(),
        "buildTime": version::build_timestamp(),
    }))
}

#[get("/health")]
async fn health_handler(heartbeat: web::Data<Arc<HeartbeatService>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "heartbeat": heartbeat.status().await,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(version_handler)
        .service(health_handler);
}

/// HTTP front end. It cannot pause, so a host pause unbinds it and a host
/// continue binds it again.
pub struct HttpListenerService {
    config: ListenerConfig,
    heartbeat: Arc<HeartbeatService>,
    routes: fn(&mut web::ServiceConfig),
    server: Mutex<Option<RunningServer>>,
}

impl HttpListenerService {
    pub fn new(config: ListenerConfig, heartbeat: Arc<HeartbeatService>) -> Self {
        Self {
            config,
            heartbeat,
            routes: configure,
            server: Mutex::new(None),
        }
    }

    /// Addresses the listener is bound to, empty while stopped.
    pub async fn local_addrs(&self) -> Vec<SocketAddr> {
        self.server.lock().await
            .as_ref()
            .map(|server| server.addrs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Service for HttpListenerService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        check_cancelled(cancellation_token, SERVICE_NAME)?;

        let mut guard = self.server.lock().await;

        if guard.is_some() {
            return Err(LifecycleError::already_running(SERVICE_NAME).into());
        }

        let heartbeat = self.heartbeat.clone();
        let routes = self.routes;
        let server = HttpServer::new(move || App::new()
            .app_data(web::Data::new(heartbeat.clone()))
            .wrap(DefaultHeaders::new()
                .add(("X-Content-Type-Options", "nosniff"))
                .add(("X-XSS-Protection", "1; mode=block"))
                .add(("X-Frame-Options", "DENY"))
                .add(("Referrer-Policy", "no-referrer"))
                .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            .wrap(Logger::default())
            .configure(routes)
        )
        .workers(self.config.workers)
        .disable_signals()
        .bind((self.config.bind.as_str(), self.config.port))
        .with_context(|| format!("Failed to bind {}:{}", self.config.bind, self.config.port))?;

        let addrs = server.addrs();
        let server = server.run();
        let handle = server.handle();
        let task_handle = actix_web::rt::spawn(server);

        tracing::info!("Listener bound to {:?}", addrs);

        *guard = Some(RunningServer { handle, task_handle, addrs });

        Ok(())
    }

    async fn stop(&self, cancellation_token: &CancellationToken) -> ServiceResult {
        let Some(server) = self.server.lock().await.take() else {
            tracing::debug!("Listener is not running, nothing to stop.");
            return Ok(());
        };

        // A handle sends its stop command when called, and the server acts on
        // the first one only, so the mode has to be settled before calling.
        let graceful = !cancellation_token.is_cancelled();

        if !graceful {
            tracing::warn!("Listener stop cancelled, stopping without grace period.");
            server.handle.stop(false).await;
        } else {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    tracing::warn!("Listener stop cancelled while draining, abandoning in-flight requests.");
                    server.task_handle.abort();
                }
                _ = server.handle.stop(true) => {}
            }
        }

        match server.task_handle.await {
            Ok(result) => result.context("Listener exited with an error")?,
            Err(e) if e.is_cancelled() => tracing::debug!("Listener task aborted."),
            Err(e) => tracing::error!("Listener task ended abnormally: {:?}", e),
        }

        tracing::info!("Listener stopped.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, net::TcpStream, time::{Duration, Instant}};

    use actix_web::{http::StatusCode, test};

    use super::*;

    fn listener(heartbeat: Arc<HeartbeatService>) -> HttpListenerService {
        HttpListenerService::new(
            ListenerConfig { bind: "127.0.0.1".to_string(), port: 0, workers: 1 },
            heartbeat,
        )
    }

    // Never answers, so a graceful drain would wait out the shutdown timeout.
    async fn stalled_handler() -> impl Responder {
        std::future::pending::<()>().await;
        HttpResponse::Ok().finish()
    }

    fn with_stalled_route(cfg: &mut web::ServiceConfig) {
        configure(cfg);
        cfg.route("/stalled", web::get().to(stalled_handler));
    }

    async fn start_with_request_in_flight() -> (HttpListenerService, std::thread::JoinHandle<()>) {
        let service = HttpListenerService {
            routes: with_stalled_route,
            ..listener(Arc::new(HeartbeatService::new(Duration::from_secs(60))))
        };
        service.start(&CancellationToken::new()).await.unwrap();

        let addr = service.local_addrs().await[0];
        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"GET /stalled HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
            std::thread::sleep(Duration::from_secs(2));
        });

        // let the request reach the handler
        tokio::time::sleep(Duration::from_millis(300)).await;

        (service, client)
    }

    #[actix_web::test]
    async fn test_cancelled_stop_does_not_wait_for_in_flight_requests() {
        let (service, client) = start_with_request_in_flight().await;
        let token = CancellationToken::new();
        token.cancel();

        let started = Instant::now();
        service.stop(&token).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5), "stop took {:?}", started.elapsed());
        assert!(service.local_addrs().await.is_empty());
        client.join().unwrap();
    }

    #[actix_web::test]
    async fn test_cancellation_during_drain_ends_stop() {
        let (service, client) = start_with_request_in_flight().await;
        let token = CancellationToken::new();
        tokio::spawn({
            let token = token.clone();

            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                token.cancel();
            }
        });

        let started = Instant::now();
        service.stop(&token).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5), "stop took {:?}", started.elapsed());
        assert!(service.local_addrs().await.is_empty());
        client.join().unwrap();
    }

    #[actix_web::test]
    async fn test_version_route() {
        let app = test::init_service(App::new().configure(configure)).await;

        let req = test::TestRequest::get().uri("/version").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["version"], serde_json::json!(version::get_version_string()));
    }

    #[actix_web::test]
    async fn test_health_route_reports_heartbeat() {
        let heartbeat = Arc::new(HeartbeatService::new(Duration::from_secs(60)));
        let app = test::init_service(App::new()
            .app_data(web::Data::new(heartbeat.clone()))
            .configure(configure)
        ).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["heartbeat"]["running"], false);
        assert_eq!(body["heartbeat"]["beats"], 0);
    }

    #[actix_web::test]
    async fn test_start_binds_and_stop_releases() {
        let service = listener(Arc::new(HeartbeatService::new(Duration::from_secs(60))));
        let token = CancellationToken::new();

        service.start(&token).await.unwrap();
        assert!(!service.local_addrs().await.is_empty());

        let err = service.start(&token).await.unwrap_err();
        assert_eq!(err.downcast_ref::<LifecycleError>(), Some(&LifecycleError::already_running("http-listener")));

        service.stop(&token).await.unwrap();
        assert!(service.local_addrs().await.is_empty());

        // not pausable, so a host restarts it instead; it must bind again
        assert!(service.as_pausable().is_none());
        service.start(&token).await.unwrap();
        service.stop(&token).await.unwrap();
    }

    #[actix_web::test]
    async fn test_stop_when_not_running_is_a_no_op() {
        let service = listener(Arc::new(HeartbeatService::new(Duration::from_secs(60))));

        service.stop(&CancellationToken::new()).await.unwrap();
    }
}
