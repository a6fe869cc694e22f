#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base64 envelope: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed {context}: {source}")]
    Malformed {
        context: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    /// Unknown message kinds are never skipped.
    #[error("Unsupported message type: {type_url}")]
    UnsupportedMessageType { type_url: String },

    #[error("Invalid address in {field}: expected 20 bytes, got {len}")]
    InvalidAddress { field: &'static str, len: usize },

    #[error("Address encoding failed: {0}")]
    AddressEncoding(String),

    #[error("Transaction carries {count} messages, more than the limit of {}", i16::MAX)]
    TooManyMessages { count: usize },
}

impl DecodeError {
    pub(crate) fn malformed(context: &'static str) -> impl FnOnce(prost::DecodeError) -> Self {
        move |source| DecodeError::Malformed { context, source }
    }
}
