/// Errors produced while encoding or decoding GPA wire messages.
///
/// All of them are recoverable: the caller logs the failure and drops the
/// offending bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpaError {
    #[error("data too short: need {needed} more bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown message type {tag:#04x}, data starts with {prefix}")]
    UnknownMessageType { tag: u8, prefix: String },

    #[error("unexpected message type: expected {expected:#04x}, got {got:#04x}")]
    UnexpectedMessageType { expected: u8, got: u8 },

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("trailing data: {0} bytes left after decoding")]
    TrailingData(usize),
}

impl GpaError {
    /// Build an [`GpaError::UnknownMessageType`] carrying a short hex prefix
    /// of the rejected buffer.
    pub fn unknown_message_type(data: &[u8]) -> Self {
        const PREFIX_LEN: usize = 20;
        let tag = data.first().copied().unwrap_or_default();
        let prefix = hex::encode(&data[..data.len().min(PREFIX_LEN)]);
        GpaError::UnknownMessageType { tag, prefix }
    }
}
