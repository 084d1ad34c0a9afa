//! Configuration for the Modbus exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::codec::DataType;

/// Protocol identifier for Modbus TCP devices. Devices configured with any
/// other protocol are skipped by the poller, not rejected at load.
pub const PROTOCOL_MODBUS_TCP: &str = "modbus-tcp";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Devices to poll.
    pub devices: Vec<DeviceConfig>,
}

fn default_poll_interval() -> u64 {
    10
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the configuration.
    ///
    /// Unsupported protocol strings and function codes are deliberately not
    /// errors here; the poller skips them per cycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.devices.is_empty() {
            return Err(ConfigError::Validation(
                "At least one device must be configured".to_string(),
            ));
        }

        for device in &self.devices {
            if device.name.is_empty() {
                return Err(ConfigError::Validation(
                    "Device name cannot be empty".to_string(),
                ));
            }
            if device.protocol.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': protocol is required",
                    device.name
                )));
            }
            if device.host.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': host is required",
                    device.name
                )));
            }
            if device.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': invalid port",
                    device.name
                )));
            }
            if device.timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': timeout_ms must be > 0",
                    device.name
                )));
            }
            if device.slaves.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': at least one slave required",
                    device.name
                )));
            }

            for slave in &device.slaves {
                if slave.name.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Device '{}': slave name is required",
                        device.name
                    )));
                }
                if slave.registers.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Device '{}' slave '{}': no registers defined",
                        device.name, slave.name
                    )));
                }

                for register in &slave.registers {
                    if register.name.is_empty() {
                        return Err(ConfigError::Validation(format!(
                            "Device '{}' slave '{}': register name is required",
                            device.name, slave.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9105").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9105".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Configuration for a single Modbus device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name (used in logs and metric labels).
    pub name: String,

    /// Protocol identifier; only "modbus-tcp" is polled.
    pub protocol: String,

    /// Host address (IP or hostname).
    pub host: String,

    /// TCP port (default: 502).
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Connect/read timeout in milliseconds (default: 1000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Slaves reachable through this device's connection.
    pub slaves: Vec<SlaveConfig>,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_timeout_ms() -> u64 {
    1000
}

impl DeviceConfig {
    /// The connect/read timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for a logical sub-device behind a Modbus connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Slave name (for logs).
    pub name: String,

    /// Modbus unit identifier (0-255).
    pub unit_id: u8,

    /// Address offset subtracted from each register's nominal address to
    /// obtain the address sent on the wire (default: 0).
    #[serde(default)]
    pub offset: u16,

    /// Registers to poll on this slave.
    pub registers: Vec<RegisterConfig>,
}

/// Configuration for one register to sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Nominal register address.
    pub address: u16,

    /// Modbus function code: 3 = holding, 4 = input. Others are skipped.
    pub function: u8,

    /// Number of 16-bit words to read (default: 1).
    #[serde(default = "default_words")]
    pub words: u16,

    /// How to decode the raw payload.
    pub datatype: DataType,

    /// Display name (used as the `name` metric label).
    pub name: String,

    /// Unit of measurement (metric label; may be empty).
    #[serde(default)]
    pub unit: String,

    /// Multiplicative scale factor applied after decoding (default: 1.0).
    #[serde(default = "default_gain")]
    pub gain: f64,
}

fn default_words() -> u16 {
    1
}

fn default_gain() -> f64 {
    1.0
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> &'static str {
        r#"{
            devices: [
                {
                    name: "plc01",
                    protocol: "modbus-tcp",
                    host: "192.168.1.10",
                    slaves: [
                        {
                            name: "main",
                            unit_id: 1,
                            registers: [
                                { address: 100, function: 3, words: 2,
                                  datatype: "f32be", name: "voltage" }
                            ]
                        }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let config = ExporterConfig::parse(minimal_config()).unwrap();

        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.http.listen, "0.0.0.0:9105");
        assert_eq!(config.http.path, "/metrics");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);

        let device = &config.devices[0];
        assert_eq!(device.port, 502);
        assert_eq!(device.timeout_ms, 1000);

        let slave = &device.slaves[0];
        assert_eq!(slave.offset, 0);

        let register = &slave.registers[0];
        assert_eq!(register.words, 2);
        assert_eq!(register.gain, 1.0);
        assert_eq!(register.unit, "");
        assert_eq!(register.datatype, DataType::F32Be);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            poll_interval_secs: 5,
            http: { listen: "127.0.0.1:9106", path: "/modbus/metrics" },
            logging: { level: "debug", format: "json" },
            devices: [
                {
                    name: "meter",
                    protocol: "modbus-tcp",
                    host: "10.1.2.3",
                    port: 1502,
                    timeout_ms: 250,
                    slaves: [
                        {
                            name: "feed-a",
                            unit_id: 7,
                            offset: 40,
                            registers: [
                                { address: 100, function: 4, words: 2,
                                  datatype: "f32cdab", name: "current",
                                  unit: "A", gain: 0.1 }
                            ]
                        }
                    ]
                }
            ]
        }"#;

        let config = ExporterConfig::parse(json).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.http.listen, "127.0.0.1:9106");
        assert_eq!(config.logging.format, LogFormat::Json);

        let device = &config.devices[0];
        assert_eq!(device.port, 1502);
        assert_eq!(device.timeout(), Duration::from_millis(250));

        let slave = &device.slaves[0];
        assert_eq!(slave.unit_id, 7);
        assert_eq!(slave.offset, 40);

        let register = &slave.registers[0];
        assert_eq!(register.datatype, DataType::F32Cdab);
        assert_eq!(register.gain, 0.1);
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let json = minimal_config().replacen('{', "{ poll_interval_secs: 0,", 1);
        let err = ExporterConfig::parse(&json).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_validate_empty_devices() {
        assert!(ExporterConfig::parse("{ devices: [] }").is_err());
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = minimal_config().replacen(
            '{',
            "{ http: { listen: \"not-an-address\" },",
            1,
        );
        let err = ExporterConfig::parse(&json).unwrap_err();
        assert!(err.to_string().contains("Invalid listen address"));
    }

    #[test]
    fn test_validate_path_without_slash() {
        let json =
            minimal_config().replacen('{', "{ http: { path: \"metrics\" },", 1);
        let err = ExporterConfig::parse(&json).unwrap_err();
        assert!(err.to_string().contains("must start with /"));
    }

    #[test]
    fn test_validate_missing_register_name() {
        let json = r#"{
            devices: [
                {
                    name: "plc01",
                    protocol: "modbus-tcp",
                    host: "192.168.1.10",
                    slaves: [
                        {
                            name: "main",
                            unit_id: 1,
                            registers: [
                                { address: 0, function: 3, datatype: "u16", name: "" }
                            ]
                        }
                    ]
                }
            ]
        }"#;
        let err = ExporterConfig::parse(json).unwrap_err();
        assert!(err.to_string().contains("register name"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_config().as_bytes()).unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "plc01");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/modbus.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_unknown_datatype_rejected_at_parse() {
        let json = minimal_config().replace("f32be", "f16");
        assert!(matches!(
            ExporterConfig::parse(&json),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unsupported_protocol_is_not_a_validation_error() {
        let json = minimal_config().replace("modbus-tcp", "modbus-rtu");
        let config = ExporterConfig::parse(&json).unwrap();
        assert_eq!(config.devices[0].protocol, "modbus-rtu");
    }

    #[test]
    fn test_unsupported_function_code_is_not_a_validation_error() {
        let json = minimal_config().replace("function: 3", "function: 6");
        assert!(ExporterConfig::parse(&json).is_ok());
    }
}
