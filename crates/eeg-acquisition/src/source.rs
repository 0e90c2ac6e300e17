//! The acquisition source contract

use eeg_core::{EegResult, Sample};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an input frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Line did not have exactly two comma-separated fields
    FieldCount { found: usize },
    /// Timestamp field is not a non-negative integer
    InvalidTimestamp,
    /// Value field is not an integer
    InvalidValue,
    /// Line is not valid UTF-8
    Encoding,
    /// No newline within the line length limit; input resumes after the next newline
    LineTooLong,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FieldCount { found } => write!(f, "expected 2 fields, found {}", found),
            SkipReason::InvalidTimestamp => write!(f, "invalid timestamp"),
            SkipReason::InvalidValue => write!(f, "invalid sample value"),
            SkipReason::Encoding => write!(f, "invalid UTF-8"),
            SkipReason::LineTooLong => write!(f, "line too long"),
        }
    }
}

/// Result of one read attempt that did not fail fatally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Sample(Sample),
    /// Malformed input; count it and keep reading
    Skipped(SkipReason),
    /// Read timed out with nothing complete yet
    Idle,
}

/// Blocking producer of raw samples
///
/// `Err` is reserved for fatal faults (disconnect, unrecoverable read
/// failure); the acquisition loop stops on the first one.
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> EegResult<ReadOutcome>;

    /// Human readable source name for logs and errors
    fn describe(&self) -> String;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self) -> EegResult<ReadOutcome> {
        (**self).next_sample()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// True for I/O errors that only mean "nothing arrived yet"
pub(crate) fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::io::{self, Read};

    /// Reader that replays a fixed script of chunks and errors
    pub struct ScriptedReader {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedReader {
        pub fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        pub fn timeout() -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.steps.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }
}
