//! Frame acquisition and code decoding
//!
//! Camera capture and image decoding live outside this crate. These
//! traits are the seam; [`LineFrameSource`] and [`TextCodeReader`] adapt
//! an external decoder that prints one payload per line (for example
//! `zbarcam --raw`) so the scanning loop can run on a pipe.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};
use crate::session::StopSignal;

/// Frames buffered between a producer thread and the scanning loop.
const CHANNEL_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position of the frame in its stream, starting at 0.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Axis-aligned region of a frame, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A code found in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub payload: String,
    pub region: BoundingBox,
}

pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// `Ok(None)` means the stream has ended. Errors are
    /// [`Error::FrameAcquisition`] and may be retried.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

pub trait CodeReader {
    /// Find every code in `frame`. Holds no state between frames.
    fn decode(&self, frame: &Frame) -> Vec<Detection>;
}

/// Every line of a reader becomes one frame.
#[derive(Debug)]
pub struct LineFrameSource<B> {
    input: B,
    sequence: u64,
}

impl<B: BufRead> LineFrameSource<B> {
    pub fn new(input: B) -> Self {
        Self { input, sequence: 0 }
    }
}

impl<B: BufRead> FrameSource for LineFrameSource<B> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut data = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut data)
            .map_err(|e| Error::frame(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }

        let frame = Frame {
            sequence: self.sequence,
            width: 0,
            height: 0,
            data,
        };
        self.sequence += 1;
        Ok(Some(frame))
    }
}

/// Reads frame data as UTF-8 text, one payload per non-blank line.
///
/// Regions are unknown and left empty. Data that is not valid UTF-8
/// yields no detections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodeReader;

impl CodeReader for TextCodeReader {
    fn decode(&self, frame: &Frame) -> Vec<Detection> {
        let Ok(text) = std::str::from_utf8(&frame.data) else {
            return Vec::new();
        };
        text.lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(|line| Detection {
                payload: line.to_owned(),
                region: BoundingBox::default(),
            })
            .collect()
    }
}

/// Runs a blocking source on its own thread.
///
/// Frames arrive over a bounded single-consumer channel. `next_frame`
/// waits at most `poll` at a time and returns end-of-stream once the stop
/// signal is raised, even if the producer is still blocked on I/O.
pub struct ThreadedFrameSource {
    frames: Receiver<Result<Option<Frame>>>,
    stop: StopSignal,
    poll: Duration,
    producer: Option<JoinHandle<()>>,
}

impl ThreadedFrameSource {
    pub fn spawn<S>(mut source: S, stop: StopSignal, poll: Duration) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let (tx, frames) = mpsc::sync_channel(CHANNEL_DEPTH);
        let producer_stop = stop.clone();
        let producer = thread::spawn(move || {
            while !producer_stop.is_stopped() {
                let next = source.next_frame();
                let done = matches!(next, Ok(None));
                if tx.send(next).is_err() || done {
                    break;
                }
            }
            debug!("Frame producer exiting");
        });

        Self {
            frames,
            stop,
            poll,
            producer: Some(producer),
        }
    }
}

impl FrameSource for ThreadedFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.stop.is_stopped() {
                return Ok(None);
            }
            match self.frames.recv_timeout(self.poll) {
                Ok(next) => return next,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        // A producer blocked in a read cannot be interrupted; only join one
        // that has already finished.
        if let Some(producer) = self.producer.take() {
            if producer.is_finished() {
                let _ = producer.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read};

    use super::*;

    #[test]
    fn test_lines_become_frames() {
        let mut source = LineFrameSource::new(Cursor::new("alpha\n\nbeta"));
        let frames: Vec<_> = std::iter::from_fn(|| source.next_frame().unwrap()).collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[2].data, b"beta");
        assert!(TextCodeReader.decode(&frames[1]).is_empty());
    }

    #[test]
    fn test_text_reader_keeps_payload_verbatim() {
        let frame = Frame {
            sequence: 0,
            width: 0,
            height: 0,
            data: b"Name: Ada | ID: AX12345 |  \r\n".to_vec(),
        };
        let detections = TextCodeReader.decode(&frame);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].payload, "Name: Ada | ID: AX12345 |  ");
    }

    #[test]
    fn test_invalid_utf8_yields_nothing() {
        let frame = Frame {
            sequence: 0,
            width: 0,
            height: 0,
            data: vec![0xff, 0xfe, b'\n'],
        };
        assert!(TextCodeReader.decode(&frame).is_empty());
    }

    struct FailingRead;

    impl Read for FailingRead {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "camera gone"))
        }
    }

    #[test]
    fn test_threaded_source_forwards_frames() {
        let source = LineFrameSource::new(Cursor::new("a\nb\n"));
        let mut threaded =
            ThreadedFrameSource::spawn(source, StopSignal::new(), Duration::from_millis(10));

        assert_eq!(threaded.next_frame().unwrap().unwrap().data, b"a\n");
        assert_eq!(threaded.next_frame().unwrap().unwrap().data, b"b\n");
        assert!(threaded.next_frame().unwrap().is_none());
    }

    /// Never produces a frame.
    struct Stalled;

    impl FrameSource for Stalled {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            thread::sleep(Duration::from_secs(3600));
            Ok(None)
        }
    }

    #[test]
    fn test_threaded_source_honours_stop() {
        let stop = StopSignal::new();
        let mut threaded = ThreadedFrameSource::spawn(Stalled, stop.clone(), Duration::from_millis(5));
        stop.stop();
        assert!(threaded.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_read_error_is_frame_error() {
        let mut source = LineFrameSource::new(io::BufReader::new(FailingRead));
        assert!(matches!(
            source.next_frame(),
            Err(Error::FrameAcquisition { .. })
        ));
    }
}
