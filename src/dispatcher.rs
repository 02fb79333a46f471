//! Emulation of the device side of USB transfers
use crate::consts::{
    DescriptorType, Direction, StandardRequest, REQUEST_TYPE_STANDARD_IN,
    REQUEST_TYPE_STANDARD_OUT,
};
use crate::dmx::BreakCapture;
use crate::ftdi::{FtdiSioRequest, VendorTable};
use crate::sink::FrameSink;
use crate::usbip_protocol::UsbIpCmdSubmit;
use crate::util::read_payload;
use crate::{Error, Result, SetupPacket, UsbDevice};
use log::{debug, trace, warn};
use num_traits::FromPrimitive;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Endpoint number of the control pipe
pub const EP_CONTROL: u32 = 0;
/// Endpoint number of the bulk IN pipe (0x81)
pub const EP_BULK_IN: u32 = 1;
/// Endpoint number of the bulk OUT pipe (0x02)
pub const EP_BULK_OUT: u32 = 2;

/// How the reply to one USBIP_CMD_SUBMIT is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Send the payload right away
    Immediate(Vec<u8>),
    /// Send the payload once the bulk-in delay has passed
    Deferred(Vec<u8>),
}

/// Per-connection transfer handler of an attached device
#[derive(Debug)]
pub struct TransferDispatcher {
    device: Arc<UsbDevice>,
    vendor_commands: Arc<VendorTable>,
    capture: BreakCapture,
}

impl TransferDispatcher {
    pub fn new(
        device: Arc<UsbDevice>,
        vendor_commands: Arc<VendorTable>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            device,
            vendor_commands,
            capture: BreakCapture::new(sink),
        }
    }

    pub fn capture(&self) -> &BreakCapture {
        &self.capture
    }

    /// Handle one USBIP_CMD_SUBMIT
    ///
    /// Bulk-out data following the command is read from `socket`.
    pub async fn handle<T: AsyncRead + Unpin>(
        &mut self,
        cmd: &UsbIpCmdSubmit,
        socket: &mut T,
    ) -> Result<Completion> {
        match cmd.header.ep {
            EP_CONTROL => self.handle_control(cmd).map(Completion::Immediate),
            EP_BULK_IN => {
                debug!("Bulk IN, nothing pending");
                Ok(Completion::Deferred(vec![]))
            }
            EP_BULK_OUT => {
                let data =
                    read_payload(socket, cmd.transfer_buffer_length as usize).await?;
                trace!("Bulk OUT {:02x?}", data);
                self.capture.data(&data);
                Ok(Completion::Immediate(vec![]))
            }
            ep => Err(Error::UnsupportedEndpoint { ep }),
        }
    }

    /// Reply payload of a control transfer on endpoint 0
    ///
    /// Requests that are not understood get an empty reply when OUT and a
    /// single zero byte when IN.
    pub fn handle_control(&mut self, cmd: &UsbIpCmdSubmit) -> Result<Vec<u8>> {
        let setup = cmd.setup;
        debug!("Control setup={:x?}", setup);

        let handled = match self.standard_request(&setup) {
            Ok(handled) => handled,
            Err(err @ Error::IndexOutOfRange { .. }) => {
                warn!("{}, request {:x?}", err, setup);
                None
            }
            Err(err) => return Err(err),
        };
        if let Some(reply) = handled {
            return Ok(reply);
        }

        if let Some(command) = self
            .vendor_commands
            .find(setup.request_type, setup.request)
        {
            return Ok((command.handler)(&setup, &mut self.capture));
        }

        match cmd.header.transfer_direction() {
            Direction::Out => {
                warn!(
                    "Unknown control write {:x?} ({:?})",
                    setup,
                    FtdiSioRequest::from(setup.request)
                );
                Ok(vec![])
            }
            Direction::In => {
                warn!(
                    "Unknown control read {:x?} ({:?})",
                    setup,
                    FtdiSioRequest::from(setup.request)
                );
                Ok(vec![0])
            }
        }
    }

    fn standard_request(&self, setup: &SetupPacket) -> Result<Option<Vec<u8>>> {
        use StandardRequest::*;

        match (setup.request_type, FromPrimitive::from_u8(setup.request)) {
            (REQUEST_TYPE_STANDARD_IN, Some(GetDescriptor)) => {
                let mut desc = match FromPrimitive::from_u8(setup.descriptor_type()) {
                    Some(DescriptorType::Device) => {
                        debug!("Get device descriptor");
                        self.device.device_descriptor()?
                    }
                    Some(DescriptorType::Configuration) => {
                        debug!("Get configuration descriptor");
                        self.device.configuration_bundle()?
                    }
                    Some(DescriptorType::String) => {
                        debug!("Get string descriptor {}", setup.descriptor_index());
                        self.device
                            .string_descriptor(setup.descriptor_index())?
                            .to_vec()
                    }
                    _ => return Ok(None),
                };
                // requested len too short: wLength < real length
                if setup.length != 0 && (setup.length as usize) < desc.len() {
                    desc.truncate(setup.length as usize);
                }
                Ok(Some(desc))
            }
            (REQUEST_TYPE_STANDARD_IN, Some(GetStatus)) => {
                debug!("Get status");
                Ok(Some(vec![0x00, 0x00]))
            }
            (REQUEST_TYPE_STANDARD_OUT, Some(SetConfiguration)) => {
                debug!("Set configuration {}", setup.value);
                Ok(Some(vec![]))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireStruct;
    use crate::descriptor::DeviceDescriptor;
    use crate::dmx::tests::CollectSink;
    use crate::dmx::LineState;
    use crate::usbip_protocol::{UsbIpHeaderBasic, USBIP_CMD_SUBMIT};
    use crate::util::tests::setup_test_logger;

    fn dispatcher() -> (TransferDispatcher, Arc<CollectSink>) {
        setup_test_logger();
        let sink = Arc::new(CollectSink::default());
        let dispatcher = TransferDispatcher::new(
            Arc::new(UsbDevice::default()),
            Arc::new(VendorTable::ftdi()),
            sink.clone(),
        );
        (dispatcher, sink)
    }

    fn submit(ep: u32, direction: u32, length: u32, setup: [u8; 8]) -> UsbIpCmdSubmit {
        UsbIpCmdSubmit {
            header: UsbIpHeaderBasic {
                command: USBIP_CMD_SUBMIT,
                seqnum: 7,
                devid: 0x0001_0002,
                direction,
                ep,
            },
            transfer_buffer_length: length,
            setup: SetupPacket::parse(&setup).unwrap(),
            ..Default::default()
        }
    }

    fn control_in(setup: [u8; 8]) -> UsbIpCmdSubmit {
        submit(EP_CONTROL, 1, 0x40, setup)
    }

    fn control_out(setup: [u8; 8]) -> UsbIpCmdSubmit {
        submit(EP_CONTROL, 0, 0, setup)
    }

    #[test]
    fn get_device_descriptor() -> Result<()> {
        let (mut d, _) = dispatcher();
        let reply = d.handle_control(&control_in([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]))?;
        let desc = DeviceDescriptor::from_bytes(&reply)?;
        assert_eq!(desc.vendor_id, 0x0403);
        assert_eq!(desc.product_id, 0x6001);
        assert_eq!(desc.device_bcd, 0x0600);
        assert_eq!(desc.string_serial, 3);
        Ok(())
    }

    #[test]
    fn get_configuration_descriptor_honours_wlength() -> Result<()> {
        let (mut d, _) = dispatcher();
        let head = d.handle_control(&control_in([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x00]))?;
        assert_eq!(head, vec![0x09, 0x02, 0x20, 0x00, 0x01, 0x01, 0x00, 0xA0, 0x2D]);
        let full = d.handle_control(&control_in([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0xFF, 0x00]))?;
        assert_eq!(full.len(), 32);
        Ok(())
    }

    #[test]
    fn get_string_descriptors() -> Result<()> {
        let (mut d, _) = dispatcher();
        let langs = d.handle_control(&control_in([0x80, 0x06, 0x00, 0x03, 0x00, 0x00, 0xFF, 0x00]))?;
        assert_eq!(langs, vec![0x04, 0x03, 0x09, 0x04]);
        let product = d.handle_control(&control_in([0x80, 0x06, 0x02, 0x03, 0x09, 0x04, 0xFF, 0x00]))?;
        assert_eq!(product[0] as usize, product.len());
        assert_eq!(product[1], 0x03);
        let text: Vec<u16> = product[2..]
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(String::from_utf16(&text).unwrap(), "FT232R USB UART");
        Ok(())
    }

    #[test]
    fn string_index_out_of_range_falls_back() -> Result<()> {
        let (mut d, _) = dispatcher();
        let reply = d.handle_control(&control_in([0x80, 0x06, 0x09, 0x03, 0x09, 0x04, 0xFF, 0x00]))?;
        assert_eq!(reply, vec![0x00]);
        Ok(())
    }

    #[test]
    fn get_status_and_set_configuration() -> Result<()> {
        let (mut d, _) = dispatcher();
        let status = d.handle_control(&control_in([0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00]))?;
        assert_eq!(status, vec![0x00, 0x00]);
        let set = d.handle_control(&control_out([0x00, 0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]))?;
        assert!(set.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_requests_get_fallback_replies() -> Result<()> {
        let (mut d, _) = dispatcher();
        // FTDI GET_LATENCY_TIMER is not in the table
        let read = d.handle_control(&control_in([0xC0, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]))?;
        assert_eq!(read, vec![0x00]);
        // FTDI SET_BAUD_RATE
        let write = d.handle_control(&control_out([0x40, 0x03, 0x1A, 0x00, 0x00, 0x00, 0x00, 0x00]))?;
        assert!(write.is_empty());
        // unknown standard descriptor type
        let qualifier = d.handle_control(&control_in([0x80, 0x06, 0x00, 0x06, 0x00, 0x00, 0x0A, 0x00]))?;
        assert_eq!(qualifier, vec![0x00]);
        Ok(())
    }

    #[test]
    fn read_eeprom_is_acknowledged_empty() -> Result<()> {
        let (mut d, _) = dispatcher();
        let reply = d.handle_control(&control_in([0xC0, 0x90, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00]))?;
        assert!(reply.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn bulk_out_feeds_capture_between_breaks() -> Result<()> {
        let (mut d, sink) = dispatcher();
        let mut no_data: &[u8] = &[];

        // break off
        d.handle(&control_out([0x40, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00]), &mut no_data)
            .await?;
        assert_eq!(d.capture().state(), LineState::Capturing);

        let mut socket: &[u8] = &[0x00, 0x11, 0x22, 0x33, 0xEE];
        let reply = d.handle(&submit(EP_BULK_OUT, 0, 4, [0; 8]), &mut socket).await?;
        assert_eq!(reply, Completion::Immediate(vec![]));
        // only transfer_buffer_length bytes consumed
        assert_eq!(socket, &[0xEE]);

        // break on
        d.handle(&control_out([0x40, 0x04, 0x08, 0x40, 0x00, 0x00, 0x00, 0x00]), &mut no_data)
            .await?;
        assert_eq!(sink.frames(), vec![vec![0x00, 0x11, 0x22, 0x33]]);
        Ok(())
    }

    #[tokio::test]
    async fn bulk_out_short_read() {
        let (mut d, _) = dispatcher();
        let mut socket: &[u8] = &[0x01, 0x02];
        let err = d
            .handle(&submit(EP_BULK_OUT, 0, 16, [0; 8]), &mut socket)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 16,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn bulk_in_is_deferred() -> Result<()> {
        let (mut d, _) = dispatcher();
        let mut socket: &[u8] = &[];
        let reply = d.handle(&submit(EP_BULK_IN, 1, 64, [0; 8]), &mut socket).await?;
        assert_eq!(reply, Completion::Deferred(vec![]));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_endpoint_is_fatal() {
        let (mut d, _) = dispatcher();
        let mut socket: &[u8] = &[];
        let err = d
            .handle(&submit(3, 1, 64, [0; 8]), &mut socket)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedEndpoint { ep: 3 }));
    }
}
