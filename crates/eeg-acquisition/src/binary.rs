//! Raw framing: one little-endian `u16` per sample, no delimiter

use crate::source::{is_transient, ReadOutcome, SampleSource};
use eeg_core::{EegError, EegResult, Sample};
use std::io::{ErrorKind, Read};
use tracing::warn;

/// Bytes per binary sample
pub const FRAME_SIZE: usize = 2;

/// Reads fixed two-byte frames, keeping a half-read frame across timeouts
pub struct BinaryFrameReader<R> {
    reader: R,
    source_name: String,
    pending: [u8; FRAME_SIZE],
    filled: usize,
}

impl<R: Read + Send> BinaryFrameReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            pending: [0; FRAME_SIZE],
            filled: 0,
        }
    }

    fn disconnected(&self) -> EegError {
        if self.filled > 0 {
            warn!(source = %self.source_name, bytes = self.filled, "stream ended inside a frame");
        }
        EegError::SourceDisconnected {
            source_name: self.source_name.clone(),
        }
    }
}

impl<R: Read + Send> SampleSource for BinaryFrameReader<R> {
    fn next_sample(&mut self) -> EegResult<ReadOutcome> {
        while self.filled < FRAME_SIZE {
            match self.reader.read(&mut self.pending[self.filled..]) {
                Ok(0) => return Err(self.disconnected()),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_transient(&e) => return Ok(ReadOutcome::Idle),
                Err(e) => return Err(EegError::io(self.source_name.clone(), &e)),
            }
        }

        self.filled = 0;
        let code = u16::from_le_bytes(self.pending);
        Ok(ReadOutcome::Sample(Sample::new(i32::from(code))))
    }

    fn describe(&self) -> String {
        format!("{} (binary)", self.source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::ScriptedReader;
    use std::io::Cursor;

    #[test]
    fn test_little_endian_frames() {
        let bytes = vec![0x00, 0x08, 0xff, 0x0f, 0x01, 0x00];
        let mut reader = BinaryFrameReader::new(Cursor::new(bytes), "test");

        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Sample(Sample::new(2048)));
        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Sample(Sample::new(4095)));
        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Sample(Sample::new(1)));
        assert!(matches!(
            reader.next_sample(),
            Err(EegError::SourceDisconnected { .. })
        ));
    }

    #[test]
    fn test_split_frame_across_timeout() {
        let script = ScriptedReader::new(vec![
            Ok(vec![0x34]),
            ScriptedReader::timeout(),
            Ok(vec![0x12, 0xcd]),
            Ok(vec![0xab]),
        ]);
        let mut reader = BinaryFrameReader::new(script, "serial");

        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Idle);
        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Sample(Sample::new(0x1234)));
        assert_eq!(reader.next_sample().unwrap(), ReadOutcome::Sample(Sample::new(0xabcd)));
    }

    #[test]
    fn test_trailing_odd_byte_is_disconnect() {
        let mut reader = BinaryFrameReader::new(Cursor::new(vec![0x01, 0x00, 0x07]), "test");
        assert!(matches!(reader.next_sample().unwrap(), ReadOutcome::Sample(_)));
        assert!(reader.next_sample().unwrap_err().is_fatal_io());
    }
}
