//! A USB/IP server emulating an FTDI FT232R USB-serial adapter
//!
//! The adapter is driven like a DMX512 transmitter: every frame written
//! between two serial line breaks is handed to a [FrameSink].
pub mod codec;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod device;
pub mod dispatcher;
pub mod dmx;
pub mod endpoint;
mod error;
pub mod ftdi;
pub mod interface;
mod server;
pub mod setup;
pub mod sink;
pub mod usbip_protocol;
mod util;

pub use config::{FrameOutput, ServerConfig};
pub use device::UsbDevice;
pub use dmx::{BreakCapture, LineState};
pub use error::{Error, Result};
pub use server::UsbIpServer;
pub use setup::SetupPacket;
pub use sink::{Base64FrameSink, FrameSink, LogFrameSink};
