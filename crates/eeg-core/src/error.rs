//! Error handling for the EEG monitor
//!
//! Only two kinds of failure ever leave a stage: configuration errors, which
//! stop the pipeline before it starts, and fatal I/O faults from the
//! acquisition source. Skippable input and degenerate data are resolved
//! locally and never show up here.

use thiserror::Error;

/// Result type alias for EEG monitor operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type shared by every crate in the workspace
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum EegError {
    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// Filter design rejected its parameters
    #[error("Invalid filter design: {message}")]
    InvalidFilter {
        /// Which constraint was violated
        message: String,
    },

    /// Unrecoverable read failure on the acquisition source
    #[error("I/O error on {source_name}: {message}")]
    Io {
        /// Source the read was issued against
        source_name: String,
        /// Underlying I/O error description
        message: String,
    },

    /// The acquisition source reached end of stream or was unplugged
    #[error("Acquisition source {source_name} disconnected")]
    SourceDisconnected {
        /// Source that went away
        source_name: String,
    },

    /// Configuration (de)serialization failure
    #[error("Serialization error: {message}")]
    Serialization {
        /// Serializer error description
        message: String,
    },

    /// A runtime task ended abnormally (panic or cancellation)
    #[error("Task {task} failed: {message}")]
    TaskFailed {
        /// Which task
        task: String,
        message: String,
    },
}

impl EegError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        EegError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a filter design error
    pub fn filter(message: impl Into<String>) -> Self {
        EegError::InvalidFilter {
            message: message.into(),
        }
    }

    /// Wrap an I/O error raised while reading `source_name`
    pub fn io(source_name: impl Into<String>, error: &std::io::Error) -> Self {
        EegError::Io {
            source_name: source_name.into(),
            message: error.to_string(),
        }
    }

    /// Wrap a failed runtime task
    pub fn task(task: impl Into<String>, message: impl ToString) -> Self {
        EegError::TaskFailed {
            task: task.into(),
            message: message.to_string(),
        }
    }

    /// True for faults that end acquisition
    pub fn is_fatal_io(&self) -> bool {
        matches!(self, EegError::Io { .. } | EegError::SourceDisconnected { .. })
    }

    /// True for errors that must be reported before the pipeline starts
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EegError::Configuration { .. }
                | EegError::InvalidFilter { .. }
                | EegError::Serialization { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EegError::SourceDisconnected {
            source_name: "/dev/ttyUSB0".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("disconnected"));
        assert!(display.contains("/dev/ttyUSB0"));
    }

    #[test]
    fn test_error_classification() {
        let pipe = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let io = EegError::io("stdin", &pipe);
        assert!(io.is_fatal_io());
        assert!(!io.is_configuration());

        let bad_cutoff = EegError::filter("low cutoff must be below high cutoff");
        assert!(bad_cutoff.is_configuration());
        assert!(!bad_cutoff.is_fatal_io());
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(EegError::config("test"), EegError::config("test"));
        assert_ne!(EegError::config("test"), EegError::filter("test"));
    }
}
