use crate::codec::{Field, StructDef, Structure, WireStruct};
use crate::Result;

/// Layout of the 8-byte SETUP packet, little endian like all USB fields
pub const USB_SETUP_PACKET: StructDef = StructDef::little_endian(
    "UsbSetupPacket",
    &[
        Field::u8("bmRequestType"),
        Field::u8("bRequest"),
        Field::u16("wValue"),
        Field::u16("wIndex"),
        Field::u16("wLength"),
    ],
);

/// Parse the SETUP packet of control transfers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetupPacket {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

impl SetupPacket {
    /// Parse a [SetupPacket] from raw setup packet
    pub fn parse(setup: &[u8; 8]) -> Result<SetupPacket> {
        Self::from_bytes(setup)
    }

    /// Descriptor type selected by a GET_DESCRIPTOR request (high byte of wValue)
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Descriptor index selected by a GET_DESCRIPTOR request (low byte of wValue)
    pub fn descriptor_index(&self) -> u8 {
        self.value as u8
    }
}

impl WireStruct for SetupPacket {
    const DEF: &'static StructDef = &USB_SETUP_PACKET;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("bmRequestType", self.request_type)?
            .with("bRequest", self.request)?
            .with("wValue", self.value)?
            .with("wIndex", self.index)?
            .with("wLength", self.length)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(SetupPacket {
            request_type: s.get_u8("bmRequestType")?,
            request: s.get_u8("bRequest")?,
            value: s.get_u16("wValue")?,
            index: s.get_u16("wIndex")?,
            length: s.get_u16("wLength")?,
        })
    }
}
