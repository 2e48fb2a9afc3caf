//! TOML configuration for the relay.
//!
//! ```toml
//! [relay]
//! log_level = "info"
//! credential = "my-api-key"
//!
//! [network]
//! transport = "udp"
//! target = "127.0.0.1:8002"
//! bind_address = "0.0.0.0:8002"
//! max_datagram_size = 65507
//! read_timeout_ms = 500
//! max_connections = 64
//!
//! [keypath]
//! separator = "/"
//! suppressed = [{ exact = "Location/Raw" }]
//! ```
//!
//! Every field has a default, so a missing file or a missing section is not
//! an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smap_core::protocol::HEADER_SIZE;
use smap_core::KeyPathConfig;
use thiserror::Error;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Error type for loading and validating the relay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Unknown transport name.
    #[error("unknown transport '{0}' (expected \"udp\" or \"tcp\")")]
    UnknownTransport(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub keypath: KeyPathConfig,
}

/// General relay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySettings {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Opaque API key attached to every request.
    #[serde(default)]
    pub credential: String,
    /// Publish paths in lexicographic order instead of file order.
    #[serde(default)]
    pub sort_paths: bool,
}

/// Which socket type carries frames.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One frame per datagram.
    #[default]
    Udp,
    /// Length-delimited frames over a stream.
    Tcp,
}

/// Socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default)]
    pub transport: TransportKind,
    /// Address `send` publishes to.
    #[serde(default = "default_target")]
    pub target: String,
    /// Address `listen` binds.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Upper bound on one frame, in bytes.
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
    /// How long a blocking receive waits before re-checking for shutdown.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Most TCP connections served at once; further ones are refused.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_target() -> String {
    "127.0.0.1:8002".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0:8002".to_string()
}
fn default_max_datagram_size() -> usize {
    MAX_UDP_PAYLOAD
}
fn default_read_timeout_ms() -> u64 {
    500
}
fn default_max_connections() -> usize {
    64
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            credential: String::new(),
            sort_paths: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            target: default_target(),
            bind_address: default_bind_address(),
            max_datagram_size: default_max_datagram_size(),
            read_timeout_ms: default_read_timeout_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl NetworkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Udp => f.write_str("udp"),
            TransportKind::Tcp => f.write_str("tcp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportKind::Udp),
            "tcp" => Ok(TransportKind::Tcp),
            _ => Err(ConfigError::UnknownTransport(s.to_string())),
        }
    }
}

impl RelayConfig {
    /// Checks the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keypath.separator.is_empty() {
            return Err(ConfigError::Invalid(
                "keypath.separator must not be empty".into(),
            ));
        }
        let size = self.network.max_datagram_size;
        if size <= HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "network.max_datagram_size {size} cannot hold a {HEADER_SIZE}-byte header"
            )));
        }
        if self.network.transport == TransportKind::Udp && size > MAX_UDP_PAYLOAD {
            return Err(ConfigError::Invalid(format!(
                "network.max_datagram_size {size} exceeds the UDP limit of {MAX_UDP_PAYLOAD}"
            )));
        }
        if self.network.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "network.read_timeout_ms must be positive".into(),
            ));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "network.max_connections must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads and validates the config at `path`, returning defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<RelayConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RelayConfig::default(),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use smap_core::Suppression;

    #[test]
    fn test_default_config_has_expected_network_settings() {
        // Arrange / Act
        let cfg = RelayConfig::default();

        // Assert
        assert_eq!(cfg.network.transport, TransportKind::Udp);
        assert_eq!(cfg.network.target, "127.0.0.1:8002");
        assert_eq!(cfg.network.bind_address, "0.0.0.0:8002");
        assert_eq!(cfg.network.max_datagram_size, 65_507);
        assert_eq!(cfg.network.read_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.network.max_connections, 64);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_log_level_is_info() {
        assert_eq!(RelaySettings::default().log_level, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: RelayConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_network_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[network]
transport = "tcp"
target = "10.0.0.5:9000"
"#;

        // Act
        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.transport, TransportKind::Tcp);
        assert_eq!(cfg.network.target, "10.0.0.5:9000");
        // Unspecified fields keep their defaults
        assert_eq!(cfg.network.read_timeout_ms, 500);
    }

    #[test]
    fn test_keypath_section_with_suppressions() {
        let toml_str = r#"
[relay]
credential = "abc"

[keypath]
separator = "."
suppressed = [{ exact = "Location.Raw" }, { prefix = "Extra." }]
"#;

        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize keypath");

        assert_eq!(cfg.relay.credential, "abc");
        assert_eq!(cfg.keypath.separator, ".");
        assert_eq!(
            cfg.keypath.suppressed,
            vec![
                Suppression::Exact("Location.Raw".into()),
                Suppression::Prefix("Extra.".into())
            ]
        );
    }

    #[test]
    fn test_unknown_transport_in_toml_is_parse_error() {
        let result: Result<RelayConfig, _> = toml::from_str("[network]\ntransport = \"sctp\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = RelayConfig::default();
        cfg.relay.credential = "key".into();
        cfg.network.transport = TransportKind::Tcp;

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: RelayConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_validate_rejects_empty_separator() {
        let mut cfg = RelayConfig::default();
        cfg.keypath.separator.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_frame_limit_below_header() {
        let mut cfg = RelayConfig::default();
        cfg.network.max_datagram_size = HEADER_SIZE;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_udp_limit_but_allows_it_for_tcp() {
        let mut cfg = RelayConfig::default();
        cfg.network.max_datagram_size = 1 << 20;
        assert!(cfg.validate().is_err());

        cfg.network.transport = TransportKind::Tcp;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_read_timeout() {
        let mut cfg = RelayConfig::default();
        cfg.network.read_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_connection_limit() {
        let mut cfg = RelayConfig::default();
        cfg.network.max_connections = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_transport_kind_from_str_is_case_insensitive() {
        assert_eq!("UDP".parse::<TransportKind>().unwrap(), TransportKind::Udp);
        assert_eq!("tcp".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert!(matches!(
            "ws".parse::<TransportKind>(),
            Err(ConfigError::UnknownTransport(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file_returns_defaults() {
        // Arrange
        let path = std::env::temp_dir().join(format!("smap-relay-{}.toml", uuid::Uuid::new_v4()));

        // Act
        let cfg = load_config(&path).expect("missing file is not an error");

        // Assert
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_load_config_reads_and_validates_file() {
        let path = std::env::temp_dir().join(format!("smap-relay-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[keypath]\nseparator = \"\"\n").unwrap();

        let result = load_config(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_invalid_toml_returns_parse_error() {
        let path = std::env::temp_dir().join(format!("smap-relay-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
