use crate::codec::{Field, StructDef, Structure, WireStruct};
use crate::consts::{DescriptorType, EndpointAttributes};
use crate::Result;

pub const ENDPOINT_DESCRIPTOR: StructDef = StructDef::little_endian(
    "EndpointDescriptor",
    &[
        Field::u8("bLength").with_default(7),
        Field::u8("bDescriptorType").with_default(DescriptorType::Endpoint as u32),
        Field::u8("bEndpointAddress"),
        Field::u8("bmAttributes"),
        Field::u16("wMaxPacketSize"),
        Field::u8("bInterval"),
    ],
);

/// An endpoint as listed in the configuration descriptor bundle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsbEndpoint {
    /// bEndpointAddress
    pub address: u8,
    /// bmAttributes
    pub attributes: u8,
    /// wMaxPacketSize
    pub max_packet_size: u16,
    /// bInterval
    pub interval: u8,
}

impl UsbEndpoint {
    pub fn bulk(address: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            attributes: EndpointAttributes::Bulk as u8,
            max_packet_size,
            interval: 0,
        }
    }
}

impl WireStruct for UsbEndpoint {
    const DEF: &'static StructDef = &ENDPOINT_DESCRIPTOR;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("bEndpointAddress", self.address)?
            .with("bmAttributes", self.attributes)?
            .with("wMaxPacketSize", self.max_packet_size)?
            .with("bInterval", self.interval)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            address: s.get_u8("bEndpointAddress")?,
            attributes: s.get_u8("bmAttributes")?,
            max_packet_size: s.get_u16("wMaxPacketSize")?,
            interval: s.get_u8("bInterval")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_in_descriptor_bytes() -> Result<()> {
        let ep = UsbEndpoint::bulk(0x81, 64);
        assert_eq!(
            ep.to_bytes()?,
            vec![
                0x07, // bLength
                0x05, // bDescriptorType: Endpoint
                0x81, // bEndpointAddress
                0x02, // bmAttributes: Bulk
                0x40, 0x00, // wMaxPacketSize
                0x00, // bInterval
            ]
        );
        Ok(())
    }
}
