//! Error types for the CoAP codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CoapResult<T> = Result<T, CoapError>;

/// Errors that can occur while encoding or decoding CoAP messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoapError {
    /// Datagram ended before the structure it announced.
    #[error("message truncated: {context}")]
    Truncated {
        /// What was being read when input ran out.
        context: &'static str,
    },

    /// Unsupported protocol version in the header.
    #[error("unsupported CoAP version {0}")]
    InvalidVersion(u8),

    /// Token longer than 8 bytes.
    #[error("invalid token length {0}")]
    InvalidTokenLength(usize),

    /// An empty (0.00) message carried bytes after the header.
    #[error("empty message must not carry token, options or payload")]
    InvalidEmptyMessage,

    /// Option header used a reserved nibble.
    #[error("invalid option header: {message}")]
    InvalidOptionHeader {
        /// Description of the problem.
        message: String,
    },

    /// Payload marker present but no payload followed.
    #[error("payload marker followed by empty payload")]
    EmptyPayload,

    /// Option value too large to encode.
    #[error("option {number} value too long ({len} bytes)")]
    OptionTooLong {
        /// Option number.
        number: u16,
        /// Value length.
        len: usize,
    },

    /// Unsigned integer option value wider than 4 bytes.
    #[error("uint option value of {len} bytes exceeds 4 bytes")]
    InvalidUint {
        /// Value length.
        len: usize,
    },

    /// Block option value out of range.
    #[error("invalid block option: {message}")]
    InvalidBlock {
        /// Description of the problem.
        message: String,
    },
}

impl CoapError {
    /// Create a truncated-input error.
    pub fn truncated(context: &'static str) -> Self {
        Self::Truncated { context }
    }

    /// Create an invalid option header error.
    pub fn invalid_option_header(message: impl Into<String>) -> Self {
        Self::InvalidOptionHeader {
            message: message.into(),
        }
    }

    /// Create an invalid block error.
    pub fn invalid_block(message: impl Into<String>) -> Self {
        Self::InvalidBlock {
            message: message.into(),
        }
    }
}
