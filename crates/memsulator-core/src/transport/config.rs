//! Serial line configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::protocol::{MemsError, Result};

use super::{DEFAULT_BAUD_RATE, DEFAULT_WRITE_TIMEOUT_MS};

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteSize {
    /// 5 bits
    Five,
    /// 6 bits
    Six,
    /// 7 bits
    Seven,
    /// 8 bits
    Eight,
}

impl From<ByteSize> for serialport::DataBits {
    fn from(size: ByteSize) -> Self {
        match size {
            ByteSize::Five => serialport::DataBits::Five,
            ByteSize::Six => serialport::DataBits::Six,
            ByteSize::Seven => serialport::DataBits::Seven,
            ByteSize::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    /// 1 stop bit
    One,
    /// 2 stop bits
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Connection configuration, fixed for the lifetime of a transport.
///
/// The defaults are the MEMS line settings: 9600 8N1, no flow control,
/// 1 second write timeout and non-blocking reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name (e.g. "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub byte_size: ByteSize,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Parity
    pub parity: Parity,
    /// XON/XOFF software flow control
    pub xonxoff: bool,
    /// RTS/CTS hardware flow control
    pub rtscts: bool,
    /// DSR/DTR hardware flow control
    pub dsrdtr: bool,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Read timeout in milliseconds (0 = non-blocking)
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            byte_size: ByteSize::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            xonxoff: false,
            rtscts: false,
            dsrdtr: false,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            read_timeout_ms: 0,
        }
    }
}

impl ConnectionConfig {
    /// MEMS line settings on the given port
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemsError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| MemsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Same settings on a different port
    pub fn with_port(&self, port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..self.clone()
        }
    }

    /// Write timeout as a duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Flow control mode understood by the serial driver
    pub fn flow_control(&self) -> serialport::FlowControl {
        if self.rtscts {
            serialport::FlowControl::Hardware
        } else if self.xonxoff {
            serialport::FlowControl::Software
        } else {
            serialport::FlowControl::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_mems_line_settings() {
        let config = ConnectionConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.byte_size, ByteSize::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert!(!config.xonxoff && !config.rtscts && !config.dsrdtr);
        assert_eq!(config.write_timeout(), Duration::from_secs(1));
        assert_eq!(config.read_timeout(), Duration::ZERO);
        assert_eq!(config.flow_control(), serialport::FlowControl::None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"port_name": "/dev/ttyUSB0", "rtscts": true}"#).unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.flow_control(), serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mems.json");
        std::fs::write(&path, r#"{"port_name": "COM3", "parity": "Even"}"#).unwrap();

        let config = ConnectionConfig::from_json_file(&path).unwrap();
        assert_eq!(config, ConnectionConfig {
            parity: Parity::Even,
            ..ConnectionConfig::for_port("COM3")
        });
    }

    #[test]
    fn test_bad_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ConnectionConfig::from_json_file(&path),
            Err(MemsError::Config(_))
        ));
        assert!(matches!(
            ConnectionConfig::from_json_file(dir.path().join("missing.json")),
            Err(MemsError::Config(_))
        ));
    }
}
