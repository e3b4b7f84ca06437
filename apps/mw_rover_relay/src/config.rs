//! Relay configuration, stored as JSON.
//!
//! Every field has a default, so a file only needs the keys it changes:
//!
//! ```json
//! {
//!   "serial": { "device": "/dev/ttyACM0", "baud": 9600, "timeout_ms": 100 },
//!   "pulse":  { "min_us": 1000, "max_us": 2000 },
//!   "http":   { "bind": "0.0.0.0:8080", "static_root": "/srv/mwrover" },
//!   "gpio":   { "enabled": false, "mem_device": "/dev/mem" }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use mw_linux_resources::SerialConfig;
use mw_maestro_lib::PulseRange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bad bind address {0:?}")]
    BadBind(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub serial: SerialConfig,
    pub pulse: PulseRange,
    pub http: HttpConfig,
    pub gpio: GpioConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    /// Directory holding `MWRover.*` and `www/`.
    pub static_root: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            static_root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub enabled: bool,
    pub mem_device: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mem_device: PathBuf::from(mw_linux_resources::DEV_MEM),
        }
    }
}

impl RelayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http
            .bind
            .parse()
            .map_err(|_| ConfigError::BadBind(self.http.bind.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, r#"{"serial": {"baud": 115200}, "gpio": {"enabled": true}}"#).unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.serial.baud, 115200);
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert!(config.gpio.enabled);
        assert_eq!(config.gpio.mem_device, PathBuf::from("/dev/mem"));
        assert_eq!(config.pulse, PulseRange::default());
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn partial_pulse_section_keeps_the_other_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, r#"{"pulse": {"min_us": 1000}}"#).unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.pulse, PulseRange::new(1000.0, 2500.0).unwrap());
    }

    #[test]
    fn save_then_load_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        let mut config = RelayConfig::default();
        config.pulse = PulseRange::new(1000.0, 2000.0).unwrap();
        config.http.bind = "127.0.0.1:9000".to_string();
        config.save(&path).unwrap();
        assert_eq!(RelayConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn invalid_pulse_window_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, r#"{"pulse": {"min_us": 2000, "max_us": 1000}}"#).unwrap();
        assert!(matches!(RelayConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RelayConfig::load(Path::new("/nonexistent/relay.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn bad_bind_is_reported() {
        let mut config = RelayConfig::default();
        config.http.bind = "localhost".to_string();
        assert!(matches!(config.bind_addr(), Err(ConfigError::BadBind(_))));
    }
}
