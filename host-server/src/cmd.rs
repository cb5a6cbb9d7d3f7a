use std::time::Duration;

use clap::Parser;
use service_host::HostConfig;

use crate::services::http::ListenerConfig;

#[derive(Parser, Debug)]
#[command(name = "host-server", about = "Runs a listener and a background worker under a service host")]
pub struct Cli {
    /// Log filter directive (e.g., info, debug, host_server=trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,

    /// Name reported on every host span
    #[arg(long, default_value_t = String::from("host-server"))]
    pub name: String,

    /// Address the HTTP listener binds to
    #[arg(long, default_value_t = String::from("127.0.0.1"))]
    pub bind: String,

    /// Port the HTTP listener binds to
    #[arg(long, short = 'p', default_value_t = 8080)]
    pub port: u16,

    /// Number of HTTP workers, defaults to the available parallelism
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds between heartbeats
    #[arg(long = "heartbeat-secs", value_name = "SECONDS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,
}

impl Cli {
    pub fn host_config(&self) -> HostConfig {
        HostConfig::named(&self.name)
    }

    pub fn listener_config(&self) -> ListenerConfig {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        });

        ListenerConfig {
            bind: self.bind.clone(),
            port: self.port,
            workers,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}
