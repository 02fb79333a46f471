//! Destinations for captured DMX frames

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{info, warn};
use std::io::Write;
use std::sync::Mutex;

/// Receives every frame completed by a [crate::BreakCapture]
pub trait FrameSink: Send + Sync {
    fn frame(&self, frame: &[u8]);
}

/// Logs frames at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFrameSink;

impl FrameSink for LogFrameSink {
    fn frame(&self, frame: &[u8]) {
        info!("DMX frame ({} bytes): {:02x?}", frame.len(), frame);
    }
}

/// Writes each frame as one base64 line
///
/// This is the input format of the LIFX bridge: one frame per line, first
/// byte the DMX start code.
pub struct Base64FrameSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> Base64FrameSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> FrameSink for Base64FrameSink<W> {
    fn frame(&self, frame: &[u8]) {
        let line = STANDARD.encode(frame);
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write DMX frame: {:?}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_lines() {
        let sink = Base64FrameSink::new(Vec::new());
        sink.frame(&[0x00, 0xFF, 0x80, 0x10]);
        sink.frame(&[]);
        assert_eq!(sink.into_inner(), b"AP+AEA==\n\n".to_vec());
    }
}
