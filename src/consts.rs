use num_derive::FromPrimitive;

/// USB speed codes as reported in the exported device record
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsbSpeed {
    Unknown = 0x0,
    Low,
    Full,
    High,
    Wireless,
    Super,
    SuperPlus,
}

/// A list of defined USB class codes used by the emulated device
// https://www.usb.org/defined-class-codes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassCode {
    SeeInterface = 0,
    VendorSpecific = 0xFF,
}

/// A list of defined USB endpoint attributes
#[derive(Copy, Clone, Debug, FromPrimitive, PartialEq, Eq)]
pub enum EndpointAttributes {
    Control = 0,
    Isochronous,
    Bulk,
    Interrupt,
}

/// USB transfer direction: IN or OUT
/// Already exists in rusb crate
pub use rusb::Direction;

/// Emulated max packet size of EP0, as reported by a real FT232R
pub const EP0_MAX_PACKET_SIZE: u8 = 8;

/// Max packet size of the two bulk endpoints
pub const BULK_MAX_PACKET_SIZE: u16 = 64;

/// `bmRequestType` of a standard device-to-host request
pub const REQUEST_TYPE_STANDARD_IN: u8 = 0x80;
/// `bmRequestType` of a standard host-to-device request
pub const REQUEST_TYPE_STANDARD_OUT: u8 = 0x00;

/// A list of defined USB standard requests
/// from USB 2.0 standard Table 9.4. Standard Request Codes
#[derive(Copy, Clone, Debug, FromPrimitive, PartialEq, Eq)]
pub enum StandardRequest {
    GetStatus = 0,
    ClearFeature = 1,
    SetFeature = 3,
    SetAddress = 5,
    GetDescriptor = 6,
    SetDescriptor = 7,
    GetConfiguration = 8,
    SetConfiguration = 9,
    GetInterface = 10,
    SetInterface = 11,
    SynchFrame = 12,
}

/// A list of defined USB descriptor types
/// from USB 2.0 standard Table 9.5. Descriptor Types
#[derive(Copy, Clone, Debug, FromPrimitive, PartialEq, Eq)]
pub enum DescriptorType {
    /// DEVICE
    Device = 1,
    /// CONFIGURATION
    Configuration = 2,
    /// STRING
    String = 3,
    /// INTERFACE
    Interface = 4,
    /// ENDPOINT
    Endpoint = 5,
    /// DEVICE_QUALIFIER
    DeviceQualifier = 6,
}
