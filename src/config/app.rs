//! Application configuration structures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::probe::EndpointSpec;
use crate::runner::ProbeRunner;

use super::validation::ConfigError;

/// Short description of what the tool does.
pub const DESCRIPTION: &str =
    "TCP or UDP 'ping' given address and collect response time in seconds";

/// Commented sample configuration.
pub const SAMPLE_CONFIG: &str = r#"# Probe runner settings.
runner:
  ## Probe all endpoints at once (true) or one after another (false).
  concurrent: true

## This list can hold any number of endpoints.
net_response:
  ## Name is used as the name of the metric.
  - name: net_response
    ## Protocol, must be "tcp" or "udp".
    ## NOTE: because the "udp" protocol does not respond to requests, it
    ## requires a send/expect pair (see below).
    protocol: tcp
    ## Server address (an empty host means localhost).
    address: localhost:80
    ## Connect timeout.
    timeout: 1s
    ## Read timeout (only used when expecting a response).
    read_timeout: 1s
    ## The following options are required for UDP checks. For TCP they are
    ## optional. The given string is sent to the server and the answer must
    ## contain the expected string.
    # send: "ssh"
    # expect: "ssh"
    ## Extra tags attached to every result.
    # tags:
    #   env: production
"#;

fn default_concurrent() -> bool {
    true
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Probe endpoints concurrently (default: true).
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrent: default_concurrent(),
        }
    }
}

/// Top-level application configuration.
///
/// Endpoints are not validated here: each one is validated right before it
/// is probed so that a single bad entry does not prevent the others from
/// running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runner configuration.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Endpoints to probe.
    #[serde(default)]
    pub net_response: Vec<EndpointSpec>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// Values are taken verbatim; payloads and patterns may contain `$`.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build a runner for the configured endpoints.
    pub fn runner(&self) -> ProbeRunner {
        ProbeRunner::new(self.net_response.clone()).concurrent(self.runner.concurrent)
    }
}
