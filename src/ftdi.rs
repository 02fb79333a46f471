//! FTDI SIO vendor requests
use crate::dmx::BreakCapture;
use crate::SetupPacket;
use log::debug;

pub const FTDI_DEVICE_OUT_REQ_TYPE: u8 = 0x40;
pub const FTDI_DEVICE_IN_REQ_TYPE: u8 = 0xC0;

const FTDI_SIO_RESET: u8 = 0; /* Reset the port */
const FTDI_SIO_MODEM_CTRL: u8 = 1; /* Set the modem control register */
const FTDI_SIO_SET_FLOW_CTRL: u8 = 2; /* Set flow control register */
const FTDI_SIO_SET_BAUD_RATE: u8 = 3; /* Set baud rate */
pub const FTDI_SIO_SET_DATA: u8 = 4; /* Set the data characteristics of the port */
const FTDI_SIO_GET_MODEM_STATUS: u8 = 5; /* Retrieve current value of modem status register */
const FTDI_SIO_SET_EVENT_CHAR: u8 = 6; /* Set the event character */
const FTDI_SIO_SET_ERROR_CHAR: u8 = 7; /* Set the error character */
const FTDI_SIO_SET_LATENCY_TIMER: u8 = 9; /* Set the latency timer */
const FTDI_SIO_GET_LATENCY_TIMER: u8 = 0x0a; /* Get the latency timer */
pub const FTDI_SIO_READ_EEPROM: u8 = 0x90; /* Read EEPROM */

/// Break bit in the wValue of SIO_SET_DATA
pub const FTDI_SIO_SET_BREAK: u16 = 0x4000;

/// Names of SIO requests, for logging
#[derive(Debug, PartialEq, Eq)]
pub enum FtdiSioRequest {
    Reset,
    ModemCtrl,
    SetFlowCtrl,
    SetBaudRate,
    SetData,
    GetModemStatus,
    SetEventChar,
    SetErrorChar,
    SetLatencyTimer,
    GetLatencyTimer,
    ReadEEPROM,
    Unknown(u8),
}

impl From<u8> for FtdiSioRequest {
    fn from(orig: u8) -> Self {
        match orig {
            FTDI_SIO_RESET => FtdiSioRequest::Reset,
            FTDI_SIO_MODEM_CTRL => FtdiSioRequest::ModemCtrl,
            FTDI_SIO_SET_FLOW_CTRL => FtdiSioRequest::SetFlowCtrl,
            FTDI_SIO_SET_BAUD_RATE => FtdiSioRequest::SetBaudRate,
            FTDI_SIO_SET_DATA => FtdiSioRequest::SetData,
            FTDI_SIO_GET_MODEM_STATUS => FtdiSioRequest::GetModemStatus,
            FTDI_SIO_SET_EVENT_CHAR => FtdiSioRequest::SetEventChar,
            FTDI_SIO_SET_ERROR_CHAR => FtdiSioRequest::SetErrorChar,
            FTDI_SIO_SET_LATENCY_TIMER => FtdiSioRequest::SetLatencyTimer,
            FTDI_SIO_GET_LATENCY_TIMER => FtdiSioRequest::GetLatencyTimer,
            FTDI_SIO_READ_EEPROM => FtdiSioRequest::ReadEEPROM,
            other => FtdiSioRequest::Unknown(other),
        }
    }
}

/// Handler of one vendor request, returns the reply payload
pub type VendorHandler = fn(&SetupPacket, &mut BreakCapture) -> Vec<u8>;

#[derive(Clone, Copy)]
pub struct VendorCommand {
    pub request_type: u8,
    pub request: u8,
    pub handler: VendorHandler,
}

impl std::fmt::Debug for VendorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorCommand")
            .field("request_type", &self.request_type)
            .field("request", &self.request)
            .finish()
    }
}

/// Vendor requests understood by the emulated device, keyed by
/// `(bmRequestType, bRequest)`
#[derive(Clone, Debug, Default)]
pub struct VendorTable {
    commands: Vec<VendorCommand>,
}

impl VendorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The FT232R requests needed to drive a DMX transmitter
    pub fn ftdi() -> Self {
        Self::new()
            .with_command(FTDI_DEVICE_OUT_REQ_TYPE, FTDI_SIO_SET_DATA, set_data)
            .with_command(FTDI_DEVICE_IN_REQ_TYPE, FTDI_SIO_READ_EEPROM, read_eeprom)
    }

    /// Add a command, replacing any earlier one with the same key
    pub fn with_command(mut self, request_type: u8, request: u8, handler: VendorHandler) -> Self {
        self.commands
            .retain(|c| (c.request_type, c.request) != (request_type, request));
        self.commands.push(VendorCommand {
            request_type,
            request,
            handler,
        });
        self
    }

    pub fn find(&self, request_type: u8, request: u8) -> Option<&VendorCommand> {
        self.commands
            .iter()
            .find(|c| c.request_type == request_type && c.request == request)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// SIO_SET_DATA: line settings, bit 14 is the break condition
fn set_data(setup: &SetupPacket, capture: &mut BreakCapture) -> Vec<u8> {
    if setup.value & FTDI_SIO_SET_BREAK != 0 {
        debug!("Break on");
        capture.assert_break();
    } else {
        debug!("Break off");
        capture.clear_break();
    }
    vec![]
}

/// Acknowledged with an empty reply, there is no EEPROM to read
fn read_eeprom(setup: &SetupPacket, _capture: &mut BreakCapture) -> Vec<u8> {
    debug!("Ignoring EEPROM read at {:#06x}", setup.index);
    vec![]
}
