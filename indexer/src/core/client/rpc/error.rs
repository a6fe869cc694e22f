use std::fmt;

/// What an RPC call was asking for, so failures can be correlated and retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcTarget {
    Height(u64),
    Hash(String),
    Latest,
    Health,
}

impl fmt::Display for RpcTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcTarget::Height(height) => write!(f, "block #{height}"),
            RpcTarget::Hash(hash) => write!(f, "tx {hash}"),
            RpcTarget::Latest => write!(f, "latest height"),
            RpcTarget::Health => write!(f, "health"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// Network failures, timeouts and non-2xx statuses
    #[error("Request for {target} failed: {message}")]
    Transport { target: RpcTarget, message: String },

    /// The node answered with a JSON-RPC error object
    #[error("Node returned error {code} for {target}: {message}")]
    Node { target: RpcTarget, code: i64, message: String },

    #[error("Unexpected response for {target}: {message}")]
    InvalidResponse { target: RpcTarget, message: String },

    #[error("Rate limit exhausted for {target}")]
    RateLimitExhausted { target: RpcTarget },
}

impl RpcError {
    pub fn target(&self) -> &RpcTarget {
        match self {
            RpcError::Transport { target, .. }
            | RpcError::Node { target, .. }
            | RpcError::InvalidResponse { target, .. }
            | RpcError::RateLimitExhausted { target } => target,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Transport { .. } | RpcError::RateLimitExhausted { .. })
    }

    /// Get error type as a string for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            RpcError::Transport { .. } => "transport",
            RpcError::Node { .. } => "node",
            RpcError::InvalidResponse { .. } => "invalid_response",
            RpcError::RateLimitExhausted { .. } => "rate_limit_exhausted",
        }
    }

    pub(crate) fn from_reqwest(target: RpcTarget, source: reqwest::Error) -> Self {
        let message = if source.is_timeout() {
            "request timed out".to_string()
        } else if source.is_connect() {
            format!("connection failed: {source}")
        } else if let Some(status) = source.status() {
            format!("http status {status}")
        } else if source.is_decode() {
            return RpcError::InvalidResponse { target, message: source.to_string() };
        } else {
            format!("request failed: {source}")
        };
        RpcError::Transport { target, message }
    }
}
