use crate::descriptor::MAX_STRING_UNITS;
use crate::device::DEFAULT_SERIAL;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default USB/IP port
pub const USBIP_PORT: u16 = 3240;

/// Where captured DMX frames go
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameOutput {
    /// Log at info level
    #[default]
    Log,
    /// One base64 line per frame on stdout
    Base64,
}

/// Runtime settings of a [crate::UsbIpServer]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// iSerialNumber string of the emulated adapter
    pub serial: String,
    /// Delay before an empty bulk-in reply is sent
    pub bulk_in_delay: Duration,
    pub frame_output: FrameOutput,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, USBIP_PORT)),
            serial: DEFAULT_SERIAL.to_string(),
            bulk_in_delay: Duration::from_secs(1),
            frame_output: FrameOutput::Log,
        }
    }
}

/// Check that `serial` fits in a USB string descriptor
pub fn parse_serial(serial: &str) -> std::result::Result<String, String> {
    let units = serial.encode_utf16().count();
    if units > MAX_STRING_UNITS {
        return Err(format!(
            "serial is {} UTF-16 units long, at most {} fit in a string descriptor",
            units, MAX_STRING_UNITS
        ));
    }
    Ok(serial.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), "0.0.0.0:3240");
        assert_eq!(config.serial, "A900DGX9");
        assert_eq!(config.bulk_in_delay, Duration::from_millis(1000));
        assert_eq!(config.frame_output, FrameOutput::Log);
    }

    #[test]
    fn serial_length_limit() {
        assert_eq!(parse_serial("A900DGX9").unwrap(), "A900DGX9");
        assert!(parse_serial(&"9".repeat(126)).is_ok());
        assert!(parse_serial(&"9".repeat(127)).is_err());
    }
}
