//! Break-framed capture of the serial stream
//!
//! DMX512 senders mark the start of every frame with a line break. Over an
//! FTDI adapter that shows up as SIO_SET_DATA requests toggling the break
//! bit around the bulk-out writes carrying the frame, so the frame is
//! everything written between clearing the break and asserting it again.

use crate::sink::FrameSink;
use log::{debug, trace};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineState {
    BreakAsserted,
    Capturing,
}

pub struct BreakCapture {
    buffer: Vec<u8>,
    state: LineState,
    sink: Arc<dyn FrameSink>,
}

impl BreakCapture {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            buffer: vec![],
            state: LineState::BreakAsserted,
            sink,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    /// Bytes accumulated since the last cleared break
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Append bulk-out data, whatever the line state
    pub fn data(&mut self, bytes: &[u8]) {
        trace!("Capture {} bytes in {:?}", bytes.len(), self.state);
        self.buffer.extend_from_slice(bytes);
    }

    /// Break released: a new frame starts
    pub fn clear_break(&mut self) {
        if self.state == LineState::BreakAsserted {
            self.buffer.clear();
            self.state = LineState::Capturing;
        }
    }

    /// Break asserted: the current frame is complete
    ///
    /// Returns the emitted frame, or `None` when the break was already
    /// asserted.
    pub fn assert_break(&mut self) -> Option<&[u8]> {
        if self.state != LineState::Capturing {
            return None;
        }
        self.state = LineState::BreakAsserted;
        debug!("Frame complete, {} bytes", self.buffer.len());
        self.sink.frame(&self.buffer);
        Some(&self.buffer)
    }
}

impl std::fmt::Debug for BreakCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakCapture")
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects frames for inspection
    #[derive(Default)]
    pub(crate) struct CollectSink {
        pub frames: Mutex<Vec<Vec<u8>>>,
    }

    impl CollectSink {
        pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl FrameSink for CollectSink {
        fn frame(&self, frame: &[u8]) {
            self.frames.lock().unwrap().push(frame.to_vec());
        }
    }

    fn capture() -> (BreakCapture, Arc<CollectSink>) {
        let sink = Arc::new(CollectSink::default());
        (BreakCapture::new(sink.clone()), sink)
    }

    #[test]
    fn frame_between_clear_and_assert() {
        let (mut capture, sink) = capture();
        capture.clear_break();
        capture.data(&[0x01, 0x02, 0x03]);
        capture.data(&[0x04]);
        assert_eq!(capture.assert_break(), Some(&[0x01, 0x02, 0x03, 0x04][..]));
        assert_eq!(capture.assert_break(), None);
        assert_eq!(sink.frames(), vec![vec![0x01, 0x02, 0x03, 0x04]]);
    }

    #[test]
    fn starts_with_break_asserted() {
        let (mut capture, sink) = capture();
        assert_eq!(capture.state(), LineState::BreakAsserted);
        capture.data(&[0xAA]);
        assert_eq!(capture.assert_break(), None);
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn clear_drops_data_received_during_break() {
        let (mut capture, sink) = capture();
        capture.data(&[0xAA, 0xBB]);
        capture.clear_break();
        assert!(capture.buffer().is_empty());
        capture.data(&[0x00, 0x10]);
        // already capturing, must not clear again
        capture.clear_break();
        capture.data(&[0x20]);
        capture.assert_break();
        assert_eq!(sink.frames(), vec![vec![0x00, 0x10, 0x20]]);
    }

    #[test]
    fn consecutive_frames() {
        let (mut capture, sink) = capture();
        for frame in [&[0u8, 1][..], &[0, 2, 3][..]] {
            capture.clear_break();
            capture.data(frame);
            capture.assert_break();
        }
        assert_eq!(sink.frames(), vec![vec![0, 1], vec![0, 2, 3]]);
    }
}
