use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST_NAME: &str = "service-host";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Recorded on every span emitted by the host's orchestration calls.
    pub name: String,
}

impl HostConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { name: DEFAULT_HOST_NAME.to_string() }
    }
}
