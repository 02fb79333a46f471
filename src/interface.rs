use crate::codec::{Field, StructDef, Structure, WireStruct};
use crate::consts::DescriptorType;
use crate::Result;

pub const INTERFACE_DESCRIPTOR: StructDef = StructDef::little_endian(
    "InterfaceDescriptor",
    &[
        Field::u8("bLength").with_default(9),
        Field::u8("bDescriptorType").with_default(DescriptorType::Interface as u32),
        Field::u8("bInterfaceNumber"),
        Field::u8("bAlternateSetting"),
        Field::u8("bNumEndpoints"),
        Field::u8("bInterfaceClass"),
        Field::u8("bInterfaceSubClass"),
        Field::u8("bInterfaceProtocol"),
        Field::u8("iInterface"),
    ],
);

/// Interface summary appended to each device of an OP_REP_DEVLIST
pub const USBIP_INTERFACE: StructDef = StructDef::big_endian(
    "UsbIpInterface",
    &[
        Field::u8("bInterfaceClass"),
        Field::u8("bInterfaceSubClass"),
        Field::u8("bInterfaceProtocol"),
        Field::u8("padding"),
    ],
);

/// The interface descriptor of the emulated configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsbInterface {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub string_interface: u8,
}

impl UsbInterface {
    pub fn summary(&self) -> UsbIpInterface {
        UsbIpInterface {
            interface_class: self.interface_class,
            interface_subclass: self.interface_subclass,
            interface_protocol: self.interface_protocol,
        }
    }
}

impl WireStruct for UsbInterface {
    const DEF: &'static StructDef = &INTERFACE_DESCRIPTOR;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("bInterfaceNumber", self.interface_number)?
            .with("bAlternateSetting", self.alternate_setting)?
            .with("bNumEndpoints", self.num_endpoints)?
            .with("bInterfaceClass", self.interface_class)?
            .with("bInterfaceSubClass", self.interface_subclass)?
            .with("bInterfaceProtocol", self.interface_protocol)?
            .with("iInterface", self.string_interface)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            interface_number: s.get_u8("bInterfaceNumber")?,
            alternate_setting: s.get_u8("bAlternateSetting")?,
            num_endpoints: s.get_u8("bNumEndpoints")?,
            interface_class: s.get_u8("bInterfaceClass")?,
            interface_subclass: s.get_u8("bInterfaceSubClass")?,
            interface_protocol: s.get_u8("bInterfaceProtocol")?,
            string_interface: s.get_u8("iInterface")?,
        })
    }
}

/// Class triple of an interface as reported by OP_REP_DEVLIST
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsbIpInterface {
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
}

impl WireStruct for UsbIpInterface {
    const DEF: &'static StructDef = &USBIP_INTERFACE;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("bInterfaceClass", self.interface_class)?
            .with("bInterfaceSubClass", self.interface_subclass)?
            .with("bInterfaceProtocol", self.interface_protocol)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            interface_class: s.get_u8("bInterfaceClass")?,
            interface_subclass: s.get_u8("bInterfaceSubClass")?,
            interface_protocol: s.get_u8("bInterfaceProtocol")?,
        })
    }
}
