//--------------------------------------------------------------------------
// (C) Copyright Travis Sharp <travis@kuipersys.com>.  All rights reserved.
//--------------------------------------------------------------------------

use std::{future::Future, sync::Arc};

use clap::Parser;
use cmd::Cli;
use service_host::SequentialServiceHost;
use services::{heartbeat::HeartbeatService, http::HttpListenerService};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod cmd;
mod logging;
mod services;
mod version;

struct ServerHost {
    host: SequentialServiceHost,
    heartbeat: Arc<HeartbeatService>,
    listener: Arc<HttpListenerService>,
}

fn build_host(cli: &Cli) -> ServerHost {
    let heartbeat = Arc::new(HeartbeatService::new(cli.heartbeat_interval()));
    let listener = Arc::new(HttpListenerService::new(cli.listener_config(), heartbeat.clone()));

    // The listener sits on top of the worker, so it goes down first.
    let mut builder = SequentialServiceHost::builder();
    builder
        .with_config(cli.host_config())
        .register_service(heartbeat.clone())
        .register_service(listener.clone());

    ServerHost {
        host: builder.build(),
        heartbeat,
        listener,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Continue,
}

/// SIGUSR1 pauses and SIGUSR2 continues. The channel stays empty elsewhere.
fn control_signals() -> std::io::Result<mpsc::UnboundedReceiver<Control>> {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut pause_signal = signal(SignalKind::user_defined1())?;
        let mut continue_signal = signal(SignalKind::user_defined2())?;

        tokio::spawn(async move {
            loop {
                let control = tokio::select! {
                    Some(_) = pause_signal.recv() => Control::Pause,
                    Some(_) = continue_signal.recv() => Control::Continue,
                    else => break,
                };

                if tx.send(control).is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(tx);

    Ok(rx)
}

/// Applies pause/continue requests until `shutdown` resolves. A shutdown
/// requested while a transition is running is acted on once it finishes.
async fn drive<F>(
    host: &SequentialServiceHost,
    shutdown: F,
    mut controls: mpsc::UnboundedReceiver<Control>,
) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            result = &mut shutdown => {
                result?;
                return Ok(());
            }
            Some(control) = controls.recv() => {
                // failures are logged by the host with the failing service
                let outcome = match control {
                    Control::Pause => {
                        tracing::warn!(">> Pausing services...");
                        host.pause(&CancellationToken::new()).await
                    }
                    Control::Continue => {
                        tracing::warn!(">> Continuing services...");
                        host.resume(&CancellationToken::new()).await
                    }
                };

                if outcome.is_err() {
                    tracing::warn!(">> {:?} did not complete on every service.", control);
                }
            }
        }
    }
}

async fn shutdown(host: &SequentialServiceHost) -> anyhow::Result<()> {
    // A second Ctrl-C drops the grace period.
    let token = CancellationToken::new();
    let watcher = tokio::spawn({
        let token = token.clone();

        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(">> Forcing shutdown.");
                token.cancel();
            }
        }
    });

    let result = host.stop(&token).await;
    watcher.abort();

    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ServerHost { host, listener, .. } = build_host(&cli);

    tracing::info!(">> {}", version::get_version_string());
    tracing::info!(">> Build Time: {}", version::build_timestamp());
    tracing::info!(">> Starting {} service(s) on host '{}'", host.services().len(), host.config().name);

    if let Err(e) = host.start(&CancellationToken::new()).await {
        tracing::warn!(">> Startup failed, unwinding.");

        if host.stop(&CancellationToken::new()).await.is_err() {
            tracing::warn!(">> Unwinding did not complete on every service.");
        }

        return Err(e);
    }

    for addr in listener.local_addrs().await {
        tracing::info!(">> Listening on http://{}", addr);
    }

    tracing::info!(">> Press Ctrl-C to stop the server.");
    drive(&host, tokio::signal::ctrl_c(), control_signals()?).await?;

    tracing::info!(">> Stopping services...");
    shutdown(&host).await
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = run(cli).await;

    logging::shutdown();

    result
}
