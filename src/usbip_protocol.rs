//! USB/IP protocol structs
//!
//! This module declares the layout of every message exchanged with the
//! virtual host controller, as [StructDef] tables interpreted by the codec,
//! plus typed wrappers used by the connection driver.
//!
//! They are based on the [Linux kernel documentation](https://docs.kernel.org/usb/usbip_protocol.html).

use crate::codec::{Field, StructDef, Structure, WireStruct};
use crate::consts::Direction;
use crate::interface::{UsbIpInterface, USBIP_INTERFACE};
use crate::setup::{SetupPacket, USB_SETUP_PACKET};
use crate::{Error, Result};

/// USB/IP protocol version
pub const USBIP_VERSION: u16 = 0x0111;

/// Command code: Retrieve the list of exported USB devices
pub const OP_REQ_DEVLIST: u16 = 0x8005;
/// Command code: import a remote USB device
pub const OP_REQ_IMPORT: u16 = 0x8003;
/// Reply code: The list of exported USB devices
pub const OP_REP_DEVLIST: u16 = 0x0005;
/// Reply code: Reply to import
pub const OP_REP_IMPORT: u16 = 0x0003;

/// Command code: Submit an URB
pub const USBIP_CMD_SUBMIT: u32 = 0x0001;
/// Reply code: Reply for submitting an URB
pub const USBIP_RET_SUBMIT: u32 = 0x0003;

/// Length of the bus id following an OP_REQ_IMPORT header
pub const BUS_ID_LEN: usize = 32;
/// Length of the sysfs path of an exported device
pub const PATH_LEN: usize = 256;

/// Common header of all requests and replies before a device is imported
pub const USBIP_HEADER: StructDef = StructDef::big_endian(
    "UsbIpHeader",
    &[
        Field::u16("version").with_default(USBIP_VERSION as u32),
        Field::u16("command"),
        Field::u32("status"),
    ],
);

/// One exported device, shared by OP_REP_DEVLIST and OP_REP_IMPORT
pub const USBIP_DEVICE: StructDef = StructDef::big_endian(
    "UsbIpDevice",
    &[
        Field::bytes("path", PATH_LEN),
        Field::bytes("busid", BUS_ID_LEN),
        Field::u32("busnum"),
        Field::u32("devnum"),
        Field::u32("speed"),
        Field::u16("idVendor"),
        Field::u16("idProduct"),
        Field::u16("bcdDevice"),
        Field::u8("bDeviceClass"),
        Field::u8("bDeviceSubClass"),
        Field::u8("bDeviceProtocol"),
        Field::u8("bConfigurationValue"),
        Field::u8("bNumConfigurations"),
        Field::u8("bNumInterfaces"),
    ],
);

/// OP_REP_DEVLIST with exactly one device and one interface
pub const OP_REP_DEVLIST_DEF: StructDef = StructDef::big_endian(
    "OpRepDevlist",
    &[
        Field::nested("header", &USBIP_HEADER),
        Field::u32("ndev"),
        Field::nested("device", &USBIP_DEVICE),
        Field::nested("interface", &USBIP_INTERFACE),
    ],
);

pub const OP_REP_IMPORT_DEF: StructDef = StructDef::big_endian(
    "OpRepImport",
    &[
        Field::nested("header", &USBIP_HEADER),
        Field::nested("device", &USBIP_DEVICE),
    ],
);

/// Common header of all requests and replies once a device is imported
pub const USBIP_HEADER_BASIC: StructDef = StructDef::big_endian(
    "UsbIpHeaderBasic",
    &[
        Field::u32("command"),
        Field::u32("seqnum"),
        Field::u32("devid"),
        Field::u32("direction"),
        Field::u32("ep"),
    ],
);

pub const USBIP_CMD_SUBMIT_DEF: StructDef = StructDef::big_endian(
    "UsbIpCmdSubmit",
    &[
        Field::nested("header", &USBIP_HEADER_BASIC),
        Field::u32("transfer_flags"),
        Field::u32("transfer_buffer_length"),
        Field::u32("start_frame"),
        Field::u32("number_of_packets"),
        Field::u32("interval"),
        Field::nested("setup", &USB_SETUP_PACKET),
    ],
);

/// USBIP_RET_SUBMIT without its transfer buffer; the trailing 8 bytes are
/// the unused setup field and stay zero
pub const USBIP_RET_SUBMIT_DEF: StructDef = StructDef::big_endian(
    "UsbIpRetSubmit",
    &[
        Field::nested("header", &USBIP_HEADER_BASIC),
        Field::u32("status"),
        Field::u32("actual_length"),
        Field::u32("start_frame"),
        Field::u32("number_of_packets"),
        Field::u32("error_count"),
        Field::nested("setup", &USB_SETUP_PACKET),
    ],
);

/// Header of OP_REQ_* / OP_REP_* messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIpHeader {
    pub version: u16,
    pub command: u16,
    pub status: u32,
}

impl UsbIpHeader {
    pub fn new(command: u16, status: u32) -> Self {
        Self {
            version: USBIP_VERSION,
            command,
            status,
        }
    }
}

impl WireStruct for UsbIpHeader {
    const DEF: &'static StructDef = &USBIP_HEADER;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("version", self.version)?
            .with("command", self.command)?
            .with("status", self.status)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            version: s.get_u16("version")?,
            command: s.get_u16("command")?,
            status: s.get_u32("status")?,
        })
    }
}

/// An exported device as seen by `usbip list` and `usbip attach`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbIpDevice {
    pub path: String,
    pub bus_id: String,
    pub bus_num: u32,
    pub dev_num: u32,
    pub speed: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_bcd: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub configuration_value: u8,
    pub num_configurations: u8,
    pub num_interfaces: u8,
}

impl WireStruct for UsbIpDevice {
    const DEF: &'static StructDef = &USBIP_DEVICE;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("path", self.path.as_str())?
            .with("busid", self.bus_id.as_str())?
            .with("busnum", self.bus_num)?
            .with("devnum", self.dev_num)?
            .with("speed", self.speed)?
            .with("idVendor", self.vendor_id)?
            .with("idProduct", self.product_id)?
            .with("bcdDevice", self.device_bcd)?
            .with("bDeviceClass", self.device_class)?
            .with("bDeviceSubClass", self.device_subclass)?
            .with("bDeviceProtocol", self.device_protocol)?
            .with("bConfigurationValue", self.configuration_value)?
            .with("bNumConfigurations", self.num_configurations)?
            .with("bNumInterfaces", self.num_interfaces)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            path: s.get_str("path")?,
            bus_id: s.get_str("busid")?,
            bus_num: s.get_u32("busnum")?,
            dev_num: s.get_u32("devnum")?,
            speed: s.get_u32("speed")?,
            vendor_id: s.get_u16("idVendor")?,
            product_id: s.get_u16("idProduct")?,
            device_bcd: s.get_u16("bcdDevice")?,
            device_class: s.get_u8("bDeviceClass")?,
            device_subclass: s.get_u8("bDeviceSubClass")?,
            device_protocol: s.get_u8("bDeviceProtocol")?,
            configuration_value: s.get_u8("bConfigurationValue")?,
            num_configurations: s.get_u8("bNumConfigurations")?,
            num_interfaces: s.get_u8("bNumInterfaces")?,
        })
    }
}

/// Reply to OP_REQ_DEVLIST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRepDevlist {
    pub header: UsbIpHeader,
    pub exported_devices: u32,
    pub device: UsbIpDevice,
    pub interface: UsbIpInterface,
}

impl OpRepDevlist {
    pub fn new(device: UsbIpDevice, interface: UsbIpInterface) -> Self {
        Self {
            header: UsbIpHeader::new(OP_REP_DEVLIST, 0),
            exported_devices: 1,
            device,
            interface,
        }
    }
}

impl WireStruct for OpRepDevlist {
    const DEF: &'static StructDef = &OP_REP_DEVLIST_DEF;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("header", self.header.to_structure()?)?
            .with("ndev", self.exported_devices)?
            .with("device", self.device.to_structure()?)?
            .with("interface", self.interface.to_structure()?)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            header: UsbIpHeader::from_structure(s.get_struct("header")?)?,
            exported_devices: s.get_u32("ndev")?,
            device: UsbIpDevice::from_structure(s.get_struct("device")?)?,
            interface: UsbIpInterface::from_structure(s.get_struct("interface")?)?,
        })
    }
}

/// Reply to OP_REQ_IMPORT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRepImport {
    pub header: UsbIpHeader,
    pub device: UsbIpDevice,
}

impl OpRepImport {
    pub fn new(device: UsbIpDevice) -> Self {
        Self {
            header: UsbIpHeader::new(OP_REP_IMPORT, 0),
            device,
        }
    }
}

impl WireStruct for OpRepImport {
    const DEF: &'static StructDef = &OP_REP_IMPORT_DEF;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("header", self.header.to_structure()?)?
            .with("device", self.device.to_structure()?)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            header: UsbIpHeader::from_structure(s.get_struct("header")?)?,
            device: UsbIpDevice::from_structure(s.get_struct("device")?)?,
        })
    }
}

/// Common header for all context sensitive packets
///
/// All commands/responses which rely on a device being attached
/// to a client use this header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbIpHeaderBasic {
    pub command: u32,
    pub seqnum: u32,
    pub devid: u32,
    pub direction: u32,
    pub ep: u32,
}

impl UsbIpHeaderBasic {
    /// Direction of the transfer, 0 is OUT and 1 is IN
    pub fn transfer_direction(&self) -> Direction {
        if self.direction == 1 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

impl WireStruct for UsbIpHeaderBasic {
    const DEF: &'static StructDef = &USBIP_HEADER_BASIC;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("command", self.command)?
            .with("seqnum", self.seqnum)?
            .with("devid", self.devid)?
            .with("direction", self.direction)?
            .with("ep", self.ep)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        let direction = s.get_u32("direction")?;
        // 0 is OUT, 1 is IN
        if direction > 1 {
            return Err(Error::InvalidDirection { direction });
        }
        Ok(Self {
            command: s.get_u32("command")?,
            seqnum: s.get_u32("seqnum")?,
            devid: s.get_u32("devid")?,
            direction,
            ep: s.get_u32("ep")?,
        })
    }
}

/// USBIP_CMD_SUBMIT, without the OUT transfer buffer that follows it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbIpCmdSubmit {
    pub header: UsbIpHeaderBasic,
    pub transfer_flags: u32,
    pub transfer_buffer_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub interval: u32,
    pub setup: SetupPacket,
}

impl WireStruct for UsbIpCmdSubmit {
    const DEF: &'static StructDef = &USBIP_CMD_SUBMIT_DEF;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("header", self.header.to_structure()?)?
            .with("transfer_flags", self.transfer_flags)?
            .with("transfer_buffer_length", self.transfer_buffer_length)?
            .with("start_frame", self.start_frame)?
            .with("number_of_packets", self.number_of_packets)?
            .with("interval", self.interval)?
            .with("setup", self.setup.to_structure()?)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            header: UsbIpHeaderBasic::from_structure(s.get_struct("header")?)?,
            transfer_flags: s.get_u32("transfer_flags")?,
            transfer_buffer_length: s.get_u32("transfer_buffer_length")?,
            start_frame: s.get_u32("start_frame")?,
            number_of_packets: s.get_u32("number_of_packets")?,
            interval: s.get_u32("interval")?,
            setup: SetupPacket::from_structure(s.get_struct("setup")?)?,
        })
    }
}

/// Fixed part of USBIP_RET_SUBMIT
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbIpRetSubmit {
    pub header: UsbIpHeaderBasic,
    pub status: u32,
    pub actual_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub error_count: u32,
}

impl WireStruct for UsbIpRetSubmit {
    const DEF: &'static StructDef = &USBIP_RET_SUBMIT_DEF;

    fn to_structure(&self) -> Result<Structure> {
        Structure::new(Self::DEF)
            .with("header", self.header.to_structure()?)?
            .with("status", self.status)?
            .with("actual_length", self.actual_length)?
            .with("start_frame", self.start_frame)?
            .with("number_of_packets", self.number_of_packets)?
            .with("error_count", self.error_count)
    }

    fn from_structure(s: &Structure) -> Result<Self> {
        Ok(Self {
            header: UsbIpHeaderBasic::from_structure(s.get_struct("header")?)?,
            status: s.get_u32("status")?,
            actual_length: s.get_u32("actual_length")?,
            start_frame: s.get_u32("start_frame")?,
            number_of_packets: s.get_u32("number_of_packets")?,
            error_count: s.get_u32("error_count")?,
        })
    }
}

/// Server side responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbIpResponse {
    OpRepDevlist(OpRepDevlist),
    OpRepImport(OpRepImport),
    UsbIpRetSubmit {
        ret: UsbIpRetSubmit,
        transfer_buffer: Vec<u8>,
    },
}

impl UsbIpResponse {
    /// Converts the [UsbIpResponse] into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::OpRepDevlist(rep) => rep.to_bytes(),
            Self::OpRepImport(rep) => rep.to_bytes(),
            Self::UsbIpRetSubmit {
                ret,
                transfer_buffer,
            } => {
                debug_assert!(ret.actual_length as usize == transfer_buffer.len());
                let mut result = ret.to_bytes()?;
                result.extend_from_slice(transfer_buffer);
                Ok(result)
            }
        }
    }

    /// Constructs a successful USBIP_RET_SUBMIT response for `seqnum`
    ///
    /// devid, direction and ep stay zero in replies.
    pub fn usbip_ret_submit_success(seqnum: u32, transfer_buffer: Vec<u8>) -> Self {
        Self::UsbIpRetSubmit {
            ret: UsbIpRetSubmit {
                header: UsbIpHeaderBasic {
                    command: USBIP_RET_SUBMIT,
                    seqnum,
                    ..Default::default()
                },
                status: 0,
                actual_length: transfer_buffer.len() as u32,
                ..Default::default()
            },
            transfer_buffer,
        }
    }
}
