//! EEG-Acquisition: sources of raw samples
//!
//! Every source is a blocking [`SampleSource`] meant to run on a dedicated
//! thread. Malformed frames come back as [`ReadOutcome::Skipped`]; only a
//! disconnect or an unrecoverable read failure is an error.

pub mod binary;
pub mod source;
pub mod synthetic;
pub mod text;

#[cfg(feature = "serial")]
pub mod serial;

pub use binary::BinaryFrameReader;
pub use source::{ReadOutcome, SampleSource, SkipReason};
pub use synthetic::{SineComponent, SyntheticConfig, SyntheticSource};
pub use text::TextFrameReader;

#[cfg(feature = "serial")]
pub use serial::{open_serial, SerialSettings};

use eeg_core::{EegError, EegResult, Framing};
use std::io::{BufReader, Read};
use std::path::Path;

/// Wrap a byte stream in the reader for `framing`
pub fn frame_reader<R>(
    reader: R,
    framing: Framing,
    source_name: impl Into<String>,
) -> Box<dyn SampleSource>
where
    R: Read + Send + 'static,
{
    match framing {
        Framing::Text => Box::new(TextFrameReader::new(BufReader::new(reader), source_name)),
        Framing::Binary => Box::new(BinaryFrameReader::new(reader, source_name)),
    }
}

/// Replay a recorded capture; end of file is reported as a disconnect
pub fn open_file(path: impl AsRef<Path>, framing: Framing) -> EegResult<Box<dyn SampleSource>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| EegError::io(path.display().to_string(), &e))?;
    Ok(frame_reader(file, framing, path.display().to_string()))
}

/// Read frames from standard input
pub fn stdin_source(framing: Framing) -> Box<dyn SampleSource> {
    frame_reader(std::io::stdin(), framing, "stdin")
}
