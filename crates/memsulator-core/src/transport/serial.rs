//! Serial port handling
//!
//! Opens and configures real serial devices for the MEMS diagnostic cable.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, warn};

use super::ConnectionConfig;
use crate::protocol::{MemsError, Result};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    /// True for USB serial adapters, the usual way a MEMS cable is attached
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// List serial ports, USB adapters first, then by name
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();

    ports.sort_by(|a, b| b.is_usb().cmp(&a.is_usb()).then_with(|| a.name.cmp(&b.name)));
    ports
}

/// Open a serial port with the full line configuration applied
pub fn open_port(config: &ConnectionConfig) -> Result<Box<dyn SerialPort>> {
    let open_failed = |e: serialport::Error| MemsError::TransportOpen {
        device: config.port_name.clone(),
        reason: e.to_string(),
    };

    // reads only happen once bytes are waiting, so this bounds writes
    let mut port = serialport::new(&config.port_name, config.baud_rate)
        .data_bits(config.byte_size.into())
        .stop_bits(config.stop_bits.into())
        .parity(config.parity.into())
        .flow_control(config.flow_control())
        .timeout(config.write_timeout())
        .open()
        .map_err(open_failed)?;

    if config.dsrdtr {
        warn!(port = %config.port_name, "DSR/DTR flow control is not supported by the driver, ignoring");
    }

    clear_buffers(port.as_mut()).map_err(open_failed)?;
    debug!(port = %config.port_name, baud = config.baud_rate, "serial port open");

    Ok(port)
}

/// Discard anything pending in either direction
pub fn clear_buffers(port: &mut dyn SerialPort) -> std::result::Result<(), serialport::Error> {
    port.clear(serialport::ClearBuffer::All)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // This test just ensures the function doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_open_missing_port_is_open_error() {
        let config = ConnectionConfig::for_port("/dev/memsulator-does-not-exist");
        match open_port(&config) {
            Err(MemsError::TransportOpen { device, .. }) => {
                assert_eq!(device, "/dev/memsulator-does-not-exist")
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
