pub mod error;
pub mod host;
pub mod service;
