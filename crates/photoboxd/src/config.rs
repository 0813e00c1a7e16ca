//! Hub configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below. Command line flags are applied on top by the binary.
//!
//! ```toml
//! listen = "0.0.0.0:6789"
//! image_dir = "/home/pi/pictures"
//!
//! [printer]
//! name = "Canon_SELPHY_CP1300"
//! options = ["media=Postcard"]
//!
//! [gpio]
//! button_pin = 17
//! settings_pin = 27
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::interrupt::DEFAULT_POLL_INTERVAL;
use crate::server::DEFAULT_LISTEN;

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 6789;

/// Default image store location.
pub const DEFAULT_IMAGE_DIR: &str = "/home/pi/pictures";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the WebSocket listener binds to
    pub listen: SocketAddr,

    /// Directory holding captured images
    pub image_dir: PathBuf,

    /// Directory where print payloads are written before submission
    pub staging_dir: PathBuf,

    /// Interval between drains of the hardware interrupt queue
    pub poll_interval_ms: u64,

    pub camera: CameraConfig,
    pub printer: PrinterConfig,
    pub gpio: GpioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            staging_dir: runtime_dir().join("print"),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            camera: CameraConfig::default(),
            printer: PrinterConfig::default(),
            gpio: GpioConfig::default(),
        }
    }
}

/// Camera (gphoto2) settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// gphoto2 executable
    pub command: String,

    /// Scratch directory for files downloaded from the camera
    pub work_dir: PathBuf,

    /// Upper bound for a single gphoto2 invocation
    pub timeout_secs: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: "gphoto2".to_string(),
            work_dir: runtime_dir().join("camera"),
            timeout_secs: 30,
        }
    }
}

/// Print pipeline (CUPS `lp`) settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrinterConfig {
    /// lp executable
    pub command: String,

    /// CUPS destination; the system default printer when unset
    pub name: Option<String>,

    /// Extra `-o` options passed to every job
    pub options: Vec<String>,

    /// Upper bound for a single submission
    pub timeout_secs: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            command: "lp".to_string(),
            name: None,
            options: Vec::new(),
            timeout_secs: 15,
        }
    }
}

/// Button wiring (BCM pin numbers).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    pub button_pin: u8,
    pub settings_pin: u8,
    pub debounce_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            button_pin: 17,
            settings_pin: 27,
            debounce_ms: 300,
        }
    }
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Loads `explicit` if given, else the default file if it exists,
    /// else built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/photobox/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photobox").join("config.toml"))
    }

    /// Interval between interrupt queue drains.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl CameraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PrinterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Scratch space for the hub (`$TMPDIR/photobox`).
fn runtime_dir() -> PathBuf {
    std::env::temp_dir().join("photobox")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen.port(), 6789);
        assert_eq!(config.image_dir, PathBuf::from("/home/pi/pictures"));
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.camera.command, "gphoto2");
        assert_eq!(config.printer.command, "lp");
        assert!(config.printer.name.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            image_dir = "/srv/photos"

            [printer]
            name = "selphy"
            options = ["media=Postcard", "fit-to-page"]
            "#,
            Path::new("test.toml"),
        )
        .unwrap();

        assert_eq!(config.image_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.printer.name.as_deref(), Some("selphy"));
        assert_eq!(config.printer.options.len(), 2);
        assert_eq!(config.printer.timeout_secs, 15);
        assert_eq!(config.listen, Config::default().listen);
        assert_eq!(config.gpio, GpioConfig::default());
    }

    #[test]
    fn test_listen_address_parses() {
        let config =
            Config::from_toml(r#"listen = "127.0.0.1:9000""#, Path::new("test.toml")).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = Config::from_toml("colour = \"red\"", Path::new("bad.toml"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load_or_default(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_ms = 20\n[gpio]\ndebounce_ms = 50\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.gpio.debounce_ms, 50);
        assert_eq!(config.gpio.button_pin, 17);
    }
}
