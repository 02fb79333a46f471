//! USB/IP connection handling
use crate::codec::WireStruct;
use crate::config::{FrameOutput, ServerConfig};
use crate::dispatcher::{Completion, TransferDispatcher};
use crate::ftdi::VendorTable;
use crate::sink::{Base64FrameSink, FrameSink, LogFrameSink};
use crate::usbip_protocol::{
    UsbIpCmdSubmit, UsbIpHeader, UsbIpResponse, BUS_ID_LEN, OP_REQ_DEVLIST, OP_REQ_IMPORT,
    USBIP_CMD_SUBMIT,
};
use crate::util::{read_frame, read_payload};
use crate::{Error, Result, UsbDevice};
use log::{debug, info, trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Phase of one client connection
enum ConnectionState {
    /// Waiting for OP_REQ_DEVLIST or OP_REQ_IMPORT
    PreAttach,
    /// Device imported, waiting for USBIP_CMD_SUBMIT
    Attached(TransferDispatcher),
}

/// Main struct of a USB/IP server exporting one emulated device
#[derive(Clone)]
pub struct UsbIpServer {
    device: Arc<UsbDevice>,
    vendor_commands: Arc<VendorTable>,
    sink: Arc<dyn FrameSink>,
    bulk_in_delay: Duration,
}

impl UsbIpServer {
    /// Create a [UsbIpServer] exporting `device`, frames go to `sink`
    pub fn new(device: UsbDevice, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            device: Arc::new(device),
            vendor_commands: Arc::new(VendorTable::ftdi()),
            sink,
            bulk_in_delay: Duration::from_secs(1),
        }
    }

    /// Create a [UsbIpServer] exporting an FT232R as described by `config`
    pub fn from_config(config: &ServerConfig) -> Self {
        let sink: Arc<dyn FrameSink> = match config.frame_output {
            FrameOutput::Log => Arc::new(LogFrameSink),
            FrameOutput::Base64 => Arc::new(Base64FrameSink::new(std::io::stdout())),
        };
        Self::new(UsbDevice::ft232r(&config.serial), sink).with_bulk_in_delay(config.bulk_in_delay)
    }

    pub fn with_bulk_in_delay(mut self, delay: Duration) -> Self {
        self.bulk_in_delay = delay;
        self
    }

    /// Serve one client until it disconnects
    ///
    /// A clean close between two messages returns `Ok`; protocol errors end
    /// the connection without any reply.
    pub async fn handler<T>(&self, socket: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut sock_rx, mut sock_tx) = split(socket);
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        // TX task, the only writer of the socket
        let writer = tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                trace!("[TX] {:02x?}", bytes);
                sock_tx.write_all(&bytes).await?;
            }
            sock_tx.shutdown().await
        });

        let mut deferred = JoinSet::new();
        let res = self.process(&mut sock_rx, &tx, &mut deferred).await;

        // pending bulk-in replies die with the connection
        deferred.shutdown().await;
        drop(tx);
        let written = writer.await.map_err(std::io::Error::from);

        res?;
        written??;
        Ok(())
    }

    async fn process<R: AsyncRead + Unpin>(
        &self,
        socket: &mut R,
        tx: &mpsc::UnboundedSender<Vec<u8>>,
        deferred: &mut JoinSet<()>,
    ) -> Result<()> {
        let mut state = ConnectionState::PreAttach;
        loop {
            state = match state {
                ConnectionState::PreAttach => {
                    let frame = match read_frame(socket, UsbIpHeader::size()).await? {
                        Some(frame) => frame,
                        None => {
                            info!("Remote closed the connection");
                            return Ok(());
                        }
                    };
                    let header = UsbIpHeader::from_bytes(&frame)?;
                    debug!(
                        "Got header version={:#06x} command={:#06x} status={}",
                        header.version, header.command, header.status
                    );
                    self.pre_attach(header, socket, tx).await?
                }
                ConnectionState::Attached(mut dispatcher) => {
                    let frame = match read_frame(socket, UsbIpCmdSubmit::size()).await? {
                        Some(frame) => frame,
                        None => {
                            info!("Remote closed the connection");
                            return Ok(());
                        }
                    };
                    trace!("[RX] {:02x?}", frame);
                    let cmd = UsbIpCmdSubmit::from_bytes(&frame)?;
                    if cmd.header.command != USBIP_CMD_SUBMIT {
                        return Err(Error::UnsupportedCommand {
                            command: cmd.header.command,
                        });
                    }
                    self.submit(&mut dispatcher, &cmd, socket, tx, deferred)
                        .await?;
                    ConnectionState::Attached(dispatcher)
                }
            };
        }
    }

    async fn pre_attach<R: AsyncRead + Unpin>(
        &self,
        header: UsbIpHeader,
        socket: &mut R,
        tx: &mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<ConnectionState> {
        match header.command {
            OP_REQ_DEVLIST => {
                debug!("Got OP_REQ_DEVLIST");
                send(tx, &UsbIpResponse::OpRepDevlist(self.device.op_rep_devlist()))?;
                Ok(ConnectionState::PreAttach)
            }
            OP_REQ_IMPORT => {
                let bus_id = read_payload(socket, BUS_ID_LEN).await?;
                let end = bus_id.iter().position(|&b| b == 0).unwrap_or(bus_id.len());
                info!(
                    "Got OP_REQ_IMPORT for {:?}",
                    String::from_utf8_lossy(&bus_id[..end])
                );
                send(tx, &UsbIpResponse::OpRepImport(self.device.op_rep_import()))?;
                Ok(ConnectionState::Attached(TransferDispatcher::new(
                    self.device.clone(),
                    self.vendor_commands.clone(),
                    self.sink.clone(),
                )))
            }
            command => Err(Error::UnsupportedCommand {
                command: command as u32,
            }),
        }
    }

    async fn submit<R: AsyncRead + Unpin>(
        &self,
        dispatcher: &mut TransferDispatcher,
        cmd: &UsbIpCmdSubmit,
        socket: &mut R,
        tx: &mpsc::UnboundedSender<Vec<u8>>,
        deferred: &mut JoinSet<()>,
    ) -> Result<()> {
        let seqnum = cmd.header.seqnum;
        debug!(
            "Got USBIP_CMD_SUBMIT seqnum={} ep={} direction={} len={}",
            seqnum, cmd.header.ep, cmd.header.direction, cmd.transfer_buffer_length
        );
        match dispatcher.handle(cmd, socket).await? {
            Completion::Immediate(data) => {
                send(tx, &UsbIpResponse::usbip_ret_submit_success(seqnum, data))
            }
            Completion::Deferred(data) => {
                let bytes = UsbIpResponse::usbip_ret_submit_success(seqnum, data).to_bytes()?;
                schedule_deferred(deferred, self.bulk_in_delay, tx, seqnum, bytes);
                Ok(())
            }
        }
    }

    /// Accept connections on `listener` and serve them one at a time
    pub async fn serve_listener(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    info!("Got connection from {}", addr);
                    match self.handler(socket).await {
                        Ok(()) => info!("Connection from {} closed", addr),
                        Err(err) => warn!("Connection from {} failed: {}", addr, err),
                    }
                }
                Err(err) => {
                    warn!("Got error {:?}", err);
                }
            }
        }
    }

    /// Bind `addr` and serve forever
    pub async fn serve(&self, addr: SocketAddr) -> Result<()> {
        trace!("Trying to listen on {:?}", addr);
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        self.serve_listener(listener).await;
        Ok(())
    }
}

/// Queue `bytes` for sending after `delay`, dropping finished replies first
fn schedule_deferred(
    deferred: &mut JoinSet<()>,
    delay: Duration,
    tx: &mpsc::UnboundedSender<Vec<u8>>,
    seqnum: u32,
    bytes: Vec<u8>,
) {
    while deferred.try_join_next().is_some() {}
    let tx = tx.clone();
    deferred.spawn(async move {
        tokio::time::sleep(delay).await;
        trace!("Deferred reply for seqnum={}", seqnum);
        // the connection may be gone already
        let _ = tx.send(bytes);
    });
}

fn send(tx: &mpsc::UnboundedSender<Vec<u8>>, response: &UsbIpResponse) -> Result<()> {
    let bytes = response.to_bytes()?;
    tx.send(bytes).map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "writer task has exited",
        ))
    })
}
