use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use usbip_dmx::{FrameOutput, ServerConfig, UsbIpServer};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Frames {
    /// Log each frame in hex
    Log,
    /// Print each frame as a base64 line, for the LIFX bridge
    Base64,
}

impl From<Frames> for FrameOutput {
    fn from(frames: Frames) -> Self {
        match frames {
            Frames::Log => FrameOutput::Log,
            Frames::Base64 => FrameOutput::Base64,
        }
    }
}

/// Export an emulated FTDI FT232R over USB/IP and capture the DMX frames
/// written to it
#[derive(Parser, Debug)]
#[command(name = "usbip-dmx", author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = usbip_dmx::config::USBIP_PORT)]
    port: u16,

    /// Serial number reported by the adapter
    #[arg(
        long,
        default_value = usbip_dmx::device::DEFAULT_SERIAL,
        value_parser = usbip_dmx::config::parse_serial
    )]
    serial: String,

    /// Delay before answering a bulk-in request, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    bulk_in_delay: u64,

    /// Where captured frames go
    #[arg(long, value_enum, default_value_t = Frames::Log)]
    frames: Frames,

    /// Log level (trace, debug, info, warn, error), overrides RUST_LOG
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::new(self.host, self.port),
            serial: self.serial.clone(),
            bulk_in_delay: Duration::from_millis(self.bulk_in_delay),
            frame_output: self.frames.into(),
        }
    }
}

#[tokio::main]
async fn main() -> usbip_dmx::Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = &args.log_level {
        logger.parse_filters(level);
    }
    logger.init();

    let config = args.config();
    info!(
        "Exporting FT232R serial {} on {}",
        config.serial, config.bind
    );
    let server = UsbIpServer::from_config(&config);
    server.serve(config.bind).await
}
