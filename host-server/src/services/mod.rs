pub mod heartbeat;
pub mod http;
