//! Standard USB device and configuration descriptors

use crate::codec::{Field, StructDef, Structure, WireStruct};
use crate::consts::DescriptorType;
use crate::Result;
use log::warn;

pub const DEVICE_DESCRIPTOR: StructDef = StructDef::little_endian(
    "DeviceDescriptor",
    &[
        Field::u8("bLength").with_default(18),
        Field::u8("bDescriptorType").with_default(DescriptorType::Device as u32),
        Field::u16("bcdUSB").with_default(0x0110),
        Field::u8("bDeviceClass"),
        Field::u8("bDeviceSubClass"),
        Field::u8("bDeviceProtocol"),
        Field::u8("bMaxPacketSize0"),
        Field::u16("idVendor"),
        Field::u16("idProduct"),
        Field::u16("bcdDevice"),
        Field::u8("iManufacturer"),
        Field::u8("iProduct"),
        Field::u8("iSerialNumber"),
        Field::u8("bNumConfigurations"),
    ],
);

pub const CONFIGURATION_DESCRIPTOR: StructDef = StructDef::little_endian(
    "ConfigurationDescriptor",
    &[
        Field::u8("bLength").with_default(9),
        Field::u8("bDescriptorType").with_default(DescriptorType::Configuration as u32),
        Field::u16("wTotalLength"),
        Field::u8("bNumInterfaces").with_default(1),
        Field::u8("bConfigurationValue").with_default(1),
        Field::u8("iConfiguration"),
        Field::u8("bmAttributes").with_default(0x80),
        Field::u8("bMaxPower").with_default(0x32),
    ],
);

/// String descriptor 0: the supported language list, en-US only
pub const LANGID_DESCRIPTOR: [u8; 4] = [
    4,                            // bLength
    DescriptorType::String as u8, // bDescriptorType
    0x09,
    0x04, // wLANGID[0], en-US
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub usb_version: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_bcd: u16,
    pub string_manufacturer: u8,
    pub string_product: u8,
    pub string_serial: u8,
    pub num_configurations: u8,
}

impl WireStruct for DeviceDescriptor {
    const DEF: &'static StructDef = &DEVICE_DESCRIPTOR;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("bcdUSB", self.usb_version)?
            .with("bDeviceClass", self.device_class)?
            .with("bDeviceSubClass", self.device_subclass)?
            .with("bDeviceProtocol", self.device_protocol)?
            .with("bMaxPacketSize0", self.max_packet_size0)?
            .with("idVendor", self.vendor_id)?
            .with("idProduct", self.product_id)?
            .with("bcdDevice", self.device_bcd)?
            .with("iManufacturer", self.string_manufacturer)?
            .with("iProduct", self.string_product)?
            .with("iSerialNumber", self.string_serial)?
            .with("bNumConfigurations", self.num_configurations)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            usb_version: s.get_u16("bcdUSB")?,
            device_class: s.get_u8("bDeviceClass")?,
            device_subclass: s.get_u8("bDeviceSubClass")?,
            device_protocol: s.get_u8("bDeviceProtocol")?,
            max_packet_size0: s.get_u8("bMaxPacketSize0")?,
            vendor_id: s.get_u16("idVendor")?,
            product_id: s.get_u16("idProduct")?,
            device_bcd: s.get_u16("bcdDevice")?,
            string_manufacturer: s.get_u8("iManufacturer")?,
            string_product: s.get_u8("iProduct")?,
            string_serial: s.get_u8("iSerialNumber")?,
            num_configurations: s.get_u8("bNumConfigurations")?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    /// wTotalLength: this descriptor plus every interface and endpoint descriptor
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub string_configuration: u8,
    pub attributes: u8,
    pub max_power: u8,
}

impl WireStruct for ConfigurationDescriptor {
    const DEF: &'static StructDef = &CONFIGURATION_DESCRIPTOR;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("wTotalLength", self.total_length)?
            .with("bNumInterfaces", self.num_interfaces)?
            .with("bConfigurationValue", self.configuration_value)?
            .with("iConfiguration", self.string_configuration)?
            .with("bmAttributes", self.attributes)?
            .with("bMaxPower", self.max_power)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            total_length: s.get_u16("wTotalLength")?,
            num_interfaces: s.get_u8("bNumInterfaces")?,
            configuration_value: s.get_u8("bConfigurationValue")?,
            string_configuration: s.get_u8("iConfiguration")?,
            attributes: s.get_u8("bmAttributes")?,
            max_power: s.get_u8("bMaxPower")?,
        })
    }
}

/// Most UTF-16 code units a string descriptor can carry with a u8 bLength
pub const MAX_STRING_UNITS: usize = (u8::MAX as usize - 2) / 2;

/// Encode `s` as a USB string descriptor: length, type 0x03, UTF-16LE
///
/// Strings longer than [MAX_STRING_UNITS] are truncated.
pub fn string_descriptor(s: &str) -> Vec<u8> {
    let mut units: Vec<u16> = s.encode_utf16().collect();
    if units.len() > MAX_STRING_UNITS {
        warn!("String {:?} too long for a descriptor, truncating", s);
        units.truncate(MAX_STRING_UNITS);
    }
    let mut desc = vec![
        (2 + units.len() * 2) as u8,  // bLength
        DescriptorType::String as u8, // bDescriptorType
    ];
    for unit in units {
        desc.extend_from_slice(&unit.to_le_bytes());
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::verify_descriptor;

    #[test]
    fn string_descriptor_is_utf16le() {
        assert_eq!(
            string_descriptor("FTDI"),
            vec![10, 0x03, b'F', 0, b'T', 0, b'D', 0, b'I', 0]
        );
        assert_eq!(string_descriptor(""), vec![2, 0x03]);
    }

    #[test]
    fn long_string_is_truncated() {
        let desc = string_descriptor(&"x".repeat(200));
        assert_eq!(desc.len(), 254);
        assert_eq!(desc[0], 254);
        verify_descriptor(&desc);
    }

    #[test]
    fn device_descriptor_layout() -> Result<()> {
        let desc = DeviceDescriptor {
            usb_version: 0x0110,
            vendor_id: 0x0403,
            product_id: 0x6001,
            device_bcd: 0x0600,
            max_packet_size0: 8,
            num_configurations: 1,
            ..Default::default()
        };
        let bytes = desc.to_bytes()?;
        assert_eq!(bytes.len(), 18);
        verify_descriptor(&bytes);
        assert_eq!(&bytes[8..14], &[0x03, 0x04, 0x01, 0x60, 0x00, 0x06]);
        assert_eq!(DeviceDescriptor::from_bytes(&bytes)?, desc);
        Ok(())
    }
}
