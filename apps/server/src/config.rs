//! Server configuration.
//!
//! Read from `courier-server.toml` in the working directory when present;
//! every field has a default. Command-line flags override the file.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use courier_protocol::{DEFAULT_PORT, DEFAULT_STORAGE_ROOT, SERVICE_NAME};

pub const CONFIG_FILE: &str = "courier-server.toml";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Registry port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name the file service is published under.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory uploaded files are stored in.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// Log at debug level.
    #[serde(default)]
    pub verbose: bool,
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_service_name() -> String {
    SERVICE_NAME.into()
}

fn default_storage_root() -> String {
    DEFAULT_STORAGE_ROOT.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            service_name: default_service_name(),
            storage_root: default_storage_root(),
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
        Ok(toml::from_str(&content)?)
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(&mut self, port: Option<u16>, verbose: bool) {
        if let Some(port) = port {
            self.port = port;
        }
        self.verbose |= verbose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.storage_root, "storedFiles");
        assert_eq!(config.service_name, SERVICE_NAME);
        assert!(!config.verbose);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "port = 2020\nstorage_root = \"/srv/courier\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 2020);
        assert_eq!(config.storage_root, "/srv/courier");
        assert_eq!(config.bind_addr, default_bind_addr());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut config = Config {
            port: 2020,
            ..Config::default()
        };
        config.apply_overrides(Some(3030), true);
        assert_eq!(config.port, 3030);
        assert!(config.verbose);

        config.apply_overrides(None, false);
        assert_eq!(config.port, 3030);
        assert!(config.verbose);
    }
}
