use crate::codec::WireStruct;
use crate::consts::{ClassCode, UsbSpeed, BULK_MAX_PACKET_SIZE, EP0_MAX_PACKET_SIZE};
use crate::descriptor::{
    string_descriptor, ConfigurationDescriptor, DeviceDescriptor, LANGID_DESCRIPTOR,
};
use crate::endpoint::UsbEndpoint;
use crate::interface::UsbInterface;
use crate::usbip_protocol::{OpRepDevlist, OpRepImport, UsbIpDevice};
use crate::{Error, Result};

pub const FTDI_VID: u16 = 0x0403;
pub const FT232R_PID: u16 = 0x6001;
pub const FT232R_BCD: u16 = 0x0600;

/// Serial number reported when none is configured
pub const DEFAULT_SERIAL: &str = "A900DGX9";

/// Represent the emulated USB device
///
/// The descriptors are fixed for the lifetime of the process; connections
/// share one instance behind an `Arc`.
#[derive(Clone, Debug)]
pub struct UsbDevice {
    pub path: String,
    pub bus_id: String,
    pub bus_num: u32,
    pub dev_num: u32,
    pub speed: UsbSpeed,
    pub device: DeviceDescriptor,
    pub configuration: ConfigurationDescriptor,
    pub interface: UsbInterface,
    pub endpoints: Vec<UsbEndpoint>,
    /// String descriptors by index, index 0 is the language list
    strings: Vec<Vec<u8>>,
}

impl UsbDevice {
    /// An FTDI FT232R USB UART with the given serial number
    pub fn ft232r(serial: &str) -> Self {
        let endpoints = vec![
            UsbEndpoint::bulk(0x81, BULK_MAX_PACKET_SIZE), // IN
            UsbEndpoint::bulk(0x02, BULK_MAX_PACKET_SIZE), // OUT
        ];
        let total_length = ConfigurationDescriptor::size()
            + UsbInterface::size()
            + endpoints.len() * UsbEndpoint::size();

        Self {
            path: "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1".to_string(),
            bus_id: "1-1".to_string(),
            bus_num: 1,
            dev_num: 2,
            speed: UsbSpeed::Full,
            device: DeviceDescriptor {
                usb_version: 0x0110,
                device_class: ClassCode::SeeInterface as u8,
                device_subclass: 0,
                device_protocol: 0,
                max_packet_size0: EP0_MAX_PACKET_SIZE,
                vendor_id: FTDI_VID,
                product_id: FT232R_PID,
                device_bcd: FT232R_BCD,
                string_manufacturer: 1,
                string_product: 2,
                string_serial: 3,
                num_configurations: 1,
            },
            configuration: ConfigurationDescriptor {
                total_length: total_length as u16,
                num_interfaces: 1,
                configuration_value: 1,
                string_configuration: 0,
                attributes: 0xA0, // bus powered, remote wakeup
                max_power: 45,    // 90mA
            },
            interface: UsbInterface {
                interface_number: 0,
                alternate_setting: 0,
                num_endpoints: endpoints.len() as u8,
                interface_class: ClassCode::VendorSpecific as u8,
                interface_subclass: 0xFF,
                interface_protocol: 0xFF,
                string_interface: 2,
            },
            endpoints,
            strings: vec![
                LANGID_DESCRIPTOR.to_vec(),
                string_descriptor("FTDI"),
                string_descriptor("FT232R USB UART"),
                string_descriptor(serial),
            ],
        }
    }

    /// The 18-byte device descriptor
    pub fn device_descriptor(&self) -> Result<Vec<u8>> {
        self.device.to_bytes()
    }

    /// Configuration, interface and endpoint descriptors, back to back
    pub fn configuration_bundle(&self) -> Result<Vec<u8>> {
        let mut desc = self.configuration.to_bytes()?;
        desc.extend(self.interface.to_bytes()?);
        for endpoint in &self.endpoints {
            desc.extend(endpoint.to_bytes()?);
        }
        Ok(desc)
    }

    pub fn string_descriptor(&self, index: u8) -> Result<&[u8]> {
        self.strings
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(Error::IndexOutOfRange {
                index,
                len: self.strings.len(),
            })
    }

    /// The device record of OP_REP_DEVLIST and OP_REP_IMPORT
    pub fn exported(&self) -> UsbIpDevice {
        UsbIpDevice {
            path: self.path.clone(),
            bus_id: self.bus_id.clone(),
            bus_num: self.bus_num,
            dev_num: self.dev_num,
            speed: self.speed as u32,
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            device_bcd: self.device.device_bcd,
            device_class: self.device.device_class,
            device_subclass: self.device.device_subclass,
            device_protocol: self.device.device_protocol,
            configuration_value: self.configuration.configuration_value,
            num_configurations: self.device.num_configurations,
            num_interfaces: self.configuration.num_interfaces,
        }
    }

    pub fn op_rep_devlist(&self) -> OpRepDevlist {
        OpRepDevlist::new(self.exported(), self.interface.summary())
    }

    pub fn op_rep_import(&self) -> OpRepImport {
        OpRepImport::new(self.exported())
    }
}

impl Default for UsbDevice {
    fn default() -> Self {
        Self::ft232r(DEFAULT_SERIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::verify_descriptor;

    #[test]
    fn configuration_bundle_matches_total_length() -> Result<()> {
        let device = UsbDevice::default();
        let bundle = device.configuration_bundle()?;
        assert_eq!(device.configuration.total_length, 32);
        assert_eq!(bundle.len(), 32);
        assert_eq!(u16::from_le_bytes([bundle[2], bundle[3]]), 32);
        verify_descriptor(&bundle);
        Ok(())
    }

    #[test]
    fn configuration_bundle_bytes() -> Result<()> {
        let bundle = UsbDevice::default().configuration_bundle()?;
        assert_eq!(
            bundle,
            vec![
                // configuration
                0x09, 0x02, 0x20, 0x00, 0x01, 0x01, 0x00, 0xA0, 0x2D,
                // interface
                0x09, 0x04, 0x00, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 0x02,
                // bulk in
                0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x00,
                // bulk out
                0x07, 0x05, 0x02, 0x02, 0x40, 0x00, 0x00,
            ]
        );
        Ok(())
    }

    #[test]
    fn string_table() -> Result<()> {
        let device = UsbDevice::ft232r("XYZ");
        assert_eq!(device.string_descriptor(0)?, &[0x04, 0x03, 0x09, 0x04]);
        assert_eq!(device.string_descriptor(1)?, &string_descriptor("FTDI")[..]);
        assert_eq!(
            device.string_descriptor(2)?,
            &string_descriptor("FT232R USB UART")[..]
        );
        assert_eq!(device.string_descriptor(3)?, &[8, 0x03, b'X', 0, b'Y', 0, b'Z', 0]);
        assert!(matches!(
            device.string_descriptor(4),
            Err(Error::IndexOutOfRange { index: 4, len: 4 })
        ));
        Ok(())
    }

    #[test]
    fn exported_identity() {
        let rep = UsbDevice::default().op_rep_devlist();
        assert_eq!(rep.exported_devices, 1);
        assert_eq!(rep.device.vendor_id, 0x0403);
        assert_eq!(rep.device.product_id, 0x6001);
        assert_eq!(rep.device.device_bcd, 0x0600);
        assert_eq!(rep.device.bus_id, "1-1");
        assert_eq!(rep.device.speed, 2);
        assert_eq!(rep.interface.interface_class, 0xFF);
    }
}
