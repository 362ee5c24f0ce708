//! Configuration management
//!
//! Defaults, overridden by an optional TOML file, overridden by environment
//! variables (`PASV_FTP_*` for the server, `PASV_FTP_CLIENT_*` for the client).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transfer::data_channel::PortRange;

pub const SERVER_CONFIG_FILE: &str = "pasv-ftp-server";
pub const CLIENT_CONFIG_FILE: &str = "pasv-ftp-client";

/// Server configuration, loaded once at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the control listener
    pub bind_address: String,

    /// Control port; 0 picks a free port
    pub control_port: u16,

    /// Directory holding one private root per user
    pub storage_root: String,

    /// Create `<storage_root>/<user>` on login
    pub create_user_roots: bool,

    /// `username password` per line
    pub credentials_file: String,

    /// Port range for PASV listeners; both 0 lets the OS choose
    pub passive_port_min: u16,
    pub passive_port_max: u16,

    /// Bound on data connect/accept waits; 0 waits forever
    pub data_timeout_secs: u64,

    /// Maximum FTP command length
    pub max_command_length: usize,

    /// Chunk size for file transfers
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            storage_root: "ftp_root".to_string(),
            create_user_roots: true,
            credentials_file: "credentials.txt".to_string(),
            passive_port_min: 0,
            passive_port_max: 0,
            data_timeout_secs: 30,
            max_command_length: 512,
            buffer_size: 8192,
        }
    }
}

impl ServerConfig {
    /// Load from `pasv-ftp-server.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load from an explicit file (which must exist) with environment overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("bind_address", defaults.bind_address.as_str())?
            .set_default("control_port", i64::from(defaults.control_port))?
            .set_default("storage_root", defaults.storage_root.as_str())?
            .set_default("create_user_roots", defaults.create_user_roots)?
            .set_default("credentials_file", defaults.credentials_file.as_str())?
            .set_default("passive_port_min", i64::from(defaults.passive_port_min))?
            .set_default("passive_port_max", i64::from(defaults.passive_port_max))?
            .set_default("data_timeout_secs", defaults.data_timeout_secs as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(SERVER_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(Environment::with_prefix("PASV_FTP").try_parsing(true))
            .build()?;
        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_root.is_empty() {
            return Err(ConfigError::Message("storage_root cannot be empty".into()));
        }

        if self.max_command_length == 0 {
            return Err(ConfigError::Message(
                "max_command_length must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        let any = self.passive_port_min == 0 && self.passive_port_max == 0;
        if !any && (self.passive_port_min == 0 || self.passive_port_min > self.passive_port_max) {
            return Err(ConfigError::Message(
                "passive port range must satisfy 0 < passive_port_min <= passive_port_max".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and control port as a socket address string
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn passive_ports(&self) -> PortRange {
        PortRange::new(self.passive_port_min, self.passive_port_max)
    }

    pub fn data_timeout(&self) -> Option<Duration> {
        (self.data_timeout_secs > 0).then(|| Duration::from_secs(self.data_timeout_secs))
    }

    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn credentials_path(&self) -> PathBuf {
        PathBuf::from(&self.credentials_file)
    }
}

/// Client configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server's control connection
    pub server_address: String,

    /// Directory RETR writes into and STOR reads from
    pub local_dir: String,

    /// Start in passive mode instead of active
    pub passive: bool,

    pub data_timeout_secs: u64,

    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:2121".to_string(),
            local_dir: ".".to_string(),
            passive: false,
            data_timeout_secs: 30,
            buffer_size: 8192,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("server_address", defaults.server_address.as_str())?
            .set_default("local_dir", defaults.local_dir.as_str())?
            .set_default("passive", defaults.passive)?
            .set_default("data_timeout_secs", defaults.data_timeout_secs as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .add_source(File::with_name(CLIENT_CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("PASV_FTP_CLIENT").try_parsing(true))
            .build()?;
        let config: ClientConfig = settings.try_deserialize()?;
        if config.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }
        Ok(config)
    }

    pub fn data_timeout(&self) -> Option<Duration> {
        (self.data_timeout_secs > 0).then(|| Duration::from_secs(self.data_timeout_secs))
    }

    pub fn local_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.local_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.control_socket(), "127.0.0.1:2121");
        assert!(config.passive_ports().is_any());
        assert_eq!(config.data_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "control_port = 2200\nstorage_root = \"/srv/ftp\"\npassive_port_min = 50000\npassive_port_max = 50100\ndata_timeout_secs = 0"
        )
        .unwrap();

        let config = ServerConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.control_port, 2200);
        assert_eq!(config.storage_root, "/srv/ftp");
        assert_eq!(config.passive_ports(), PortRange::new(50_000, 50_100));
        assert_eq!(config.data_timeout(), None);
        assert_eq!(config.max_command_length, 512);
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let config = ServerConfig {
            passive_port_min: 6000,
            passive_port_max: 5000,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            passive_port_min: 0,
            passive_port_max: 5000,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
