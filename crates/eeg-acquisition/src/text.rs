//! Line framing: `<timestamp_ms>,<integer_value>` per sample

use crate::source::{is_transient, ReadOutcome, SampleSource, SkipReason};
use eeg_core::{EegError, EegResult, Sample};
use std::io::BufRead;
use tracing::debug;

/// Longest unterminated line kept while waiting for its newline
pub const MAX_LINE_LEN: usize = 256;

/// Parses one text frame, ignoring surrounding whitespace and `\r`
///
/// Timestamps are unsigned milliseconds, so a negative timestamp is an
/// `InvalidTimestamp` skip like any other unparsable field.
pub fn parse_line(line: &str) -> Result<Sample, SkipReason> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() != 2 {
        return Err(SkipReason::FieldCount {
            found: fields.len(),
        });
    }

    let timestamp = fields[0]
        .trim()
        .parse::<u64>()
        .map_err(|_| SkipReason::InvalidTimestamp)?;
    let value = fields[1]
        .trim()
        .parse::<i32>()
        .map_err(|_| SkipReason::InvalidValue)?;

    Ok(Sample::with_timestamp(value, timestamp))
}

/// Reads newline-terminated frames from any buffered reader
pub struct TextFrameReader<R> {
    reader: R,
    source_name: String,
    /// Bytes of the line being assembled; survives read timeouts
    line: Vec<u8>,
    /// Dropping the rest of an overlong line
    discarding: bool,
    eof: bool,
}

impl<R: BufRead + Send> TextFrameReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            line: Vec::with_capacity(64),
            discarding: false,
            eof: false,
        }
    }

    fn finish_line(&mut self) -> ReadOutcome {
        let outcome = match std::str::from_utf8(&self.line) {
            Ok(text) => match parse_line(text) {
                Ok(sample) => ReadOutcome::Sample(sample),
                Err(reason) => {
                    debug!(
                        source = %self.source_name,
                        line = text.trim(),
                        %reason,
                        "skipping malformed line"
                    );
                    ReadOutcome::Skipped(reason)
                }
            },
            Err(_) => ReadOutcome::Skipped(SkipReason::Encoding),
        };
        self.line.clear();
        outcome
    }
}

impl<R: BufRead + Send> SampleSource for TextFrameReader<R> {
    fn next_sample(&mut self) -> EegResult<ReadOutcome> {
        if self.eof {
            return Err(EegError::SourceDisconnected {
                source_name: self.source_name.clone(),
            });
        }

        loop {
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if is_transient(&e) => return Ok(ReadOutcome::Idle),
                Err(e) => return Err(EegError::io(self.source_name.clone(), &e)),
            };

            if chunk.is_empty() {
                self.eof = true;
                if self.line.is_empty() {
                    return Err(EegError::SourceDisconnected {
                        source_name: self.source_name.clone(),
                    });
                }
                // Unterminated last line, delivered before the disconnect
                return Ok(self.finish_line());
            }

            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    if !self.discarding {
                        self.line.extend_from_slice(&chunk[..=end]);
                    }
                    self.reader.consume(end + 1);
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    return Ok(self.finish_line());
                }
                None => {
                    let len = chunk.len();
                    if !self.discarding {
                        self.line.extend_from_slice(chunk);
                    }
                    self.reader.consume(len);
                    if self.discarding {
                        return Ok(ReadOutcome::Idle);
                    }
                    if self.line.len() > MAX_LINE_LEN {
                        debug!(
                            source = %self.source_name,
                            limit = MAX_LINE_LEN,
                            "line too long, discarding until newline"
                        );
                        self.line.clear();
                        self.discarding = true;
                        return Ok(ReadOutcome::Skipped(SkipReason::LineTooLong));
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} (text)", self.source_name)
    }
}
