//! Error handling for the vitals decoder and denoising pipeline
//!
//! Decode errors are fatal for the file being read. Denoise errors carry the
//! index of the channel that failed so callers can isolate it.

use thiserror::Error;

/// Result type alias for vitals operations
pub type VitalsResult<T> = Result<T, VitalsError>;

/// Error type for all vitals operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VitalsError {
    /// Header region unreadable, sentinel missing, or a field not parseable
    #[error("Malformed header: {reason}")]
    MalformedHeader {
        /// Description of the header problem
        reason: String,
    },

    /// Sampling rates that cannot produce an interleave schedule
    #[error("Invalid sampling rates: {reason}")]
    InvalidSamplingRates {
        /// Description of the rate problem
        reason: String,
    },

    /// Not even one full interleave cycle of sample data
    #[error("Truncated stream: {available_bytes} bytes of sample data, one cycle needs {cycle_bytes}")]
    TruncatedStream {
        /// Bytes present after the data offset
        available_bytes: usize,
        /// Bytes required by a single cycle
        cycle_bytes: usize,
    },

    /// A single channel's denoising stage failed
    #[error("Denoising failed for channel {channel}: {reason}")]
    ChannelDenoiseFailure {
        /// Index of the failing channel
        channel: usize,
        /// Description of the failure
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// File extension does not map to a known recording format
    #[error("Unknown recording format for '{path}' (expected *.raw or *.bin)")]
    UnknownFormat {
        /// Offending path
        path: String,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VitalsError {
    /// Channel index carried by a denoise failure, if any
    pub fn channel(&self) -> Option<usize> {
        match self {
            VitalsError::ChannelDenoiseFailure { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

/// Convenience macro for creating header errors
#[macro_export]
macro_rules! header_error {
    ($($arg:tt)+) => {
        $crate::error::VitalsError::MalformedHeader {
            reason: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating sampling-rate errors
#[macro_export]
macro_rules! rate_error {
    ($($arg:tt)+) => {
        $crate::error::VitalsError::InvalidSamplingRates {
            reason: format!($($arg)+),
        }
    };
}
