//! Serial port transport implementation

use super::{Connector, Line, LineError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serialport::{SerialPortInfo, SerialPortType};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::debug;

/// Device node the board enumerates as when nothing else is configured
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Device node the board enumerates as when nothing else is configured
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM1";

/// Factory baud rate of the board's USB CDC interface
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port configuration
///
/// An empty `path` or a zero `baud_rate` means "use the default".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub path: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl PortConfig {
    /// Create a new port configuration
    pub fn new(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
        }
    }

    /// Fill unset fields from `fallback`, then from the built-in defaults
    #[must_use]
    pub fn resolve(&self, fallback: &PortConfig) -> Self {
        let path = [self.path.as_str(), fallback.path.as_str()]
            .into_iter()
            .find(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PORT);
        let baud_rate = [self.baud_rate, fallback.baud_rate]
            .into_iter()
            .find(|b| *b != 0)
            .unwrap_or(DEFAULT_BAUD_RATE);

        Self::new(path, baud_rate)
    }

    /// Apply the built-in defaults to unset fields
    #[must_use]
    pub fn with_defaults(&self) -> Self {
        self.resolve(&Self::default())
    }
}

impl std::fmt::Display for PortConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} baud (8N1 No FC)", self.path, self.baud_rate)
    }
}

/// Opens real serial ports with the board's fixed 8-N-1 framing
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self, config: &PortConfig) -> Result<Box<dyn Line>, LineError> {
        debug!("Opening serial port {}", config);

        let stream = tokio_serial::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| match e.kind() {
                tokio_serial::ErrorKind::NoDevice => LineError::PortNotFound(config.path.clone()),
                tokio_serial::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::NotFound => LineError::PortNotFound(config.path.clone()),
                    std::io::ErrorKind::PermissionDenied => {
                        LineError::PermissionDenied(config.path.clone())
                    }
                    _ => LineError::ConnectionFailed(e.to_string()),
                },
                _ => LineError::ConnectionFailed(e.to_string()),
            })?;

        Ok(Box::new(stream))
    }
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g. "/dev/ttyACM0" or "COM3")
    pub name: String,
    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,
    /// USB product ID (if USB device)
    pub pid: Option<u16>,
    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => (Some(usb.vid), Some(usb.pid), usb.product),
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

/// ttyACM* first, then ttyUSB*, each numerically; everything else by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        return (0, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        return (1, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial ports, likely board candidates first
pub fn list_ports() -> Result<Vec<PortInfo>, LineError> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .map_err(|e| LineError::IoError(e.into()))?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_applies_defaults() {
        let resolved = PortConfig::new("", 0).with_defaults();
        assert_eq!(resolved.path, DEFAULT_PORT);
        assert_eq!(resolved.baud_rate, DEFAULT_BAUD_RATE);

        let explicit = PortConfig::new("/dev/ttyUSB3", 9600).with_defaults();
        assert_eq!(explicit, PortConfig::new("/dev/ttyUSB3", 9600));
    }

    #[test]
    fn test_resolve_prefers_fallback_over_builtin() {
        let fallback = PortConfig::new("/dev/ttyACM2", 0);
        let resolved = PortConfig::new("", 57_600).resolve(&fallback);
        assert_eq!(resolved, PortConfig::new("/dev/ttyACM2", 57_600));
    }

    #[test]
    fn test_port_sorting() {
        let mut names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/someport",
            "/dev/ttyACM10",
            "/dev/ttyACM0",
        ];
        names.sort_by_key(|n| port_sort_key(n));
        assert_eq!(
            names,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB1",
                "/dev/someport",
            ]
        );
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = SerialConnector
            .open(&PortConfig::new("/dev/relayboard-does-not-exist", 115_200))
            .await;
        assert!(result.is_err());
    }
}
