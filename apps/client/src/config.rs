//! Client configuration, from `courier-client.toml` plus command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use courier_client::ClientConfig;
use courier_protocol::{CALL_TIMEOUT, CONNECT_TIMEOUT, DEFAULT_PORT, HANDSHAKE_TOKEN, SERVICE_NAME};

pub const CONFIG_FILE: &str = "courier-client.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Seconds to wait for the TCP connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for each call's reply.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default)]
    pub verbose: bool,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_service_name() -> String {
    SERVICE_NAME.into()
}

fn default_connect_timeout() -> u64 {
    CONNECT_TIMEOUT.as_secs()
}

fn default_call_timeout() -> u64 {
    CALL_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_name: default_service_name(),
            connect_timeout_secs: default_connect_timeout(),
            call_timeout_secs: default_call_timeout(),
            verbose: false,
        }
    }
}

impl Config {
    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects timeouts that would fail every call immediately.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs must be at least 1");
        }
        if self.call_timeout_secs == 0 {
            anyhow::bail!("call_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>, verbose: bool) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self.verbose |= verbose;
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn session_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            service_name: self.service_name.clone(),
            expected_token: HANDSHAKE_TOKEN.into(),
        }
    }
}
