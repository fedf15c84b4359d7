use thiserror::Error;

/// Failure of a single delivery attempt through one channel adapter.
///
/// Transport failures (network errors, non-2xx status) are kept apart from
/// application-level rejections, where the platform answered with a JSON
/// body carrying a non-zero error code.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Platform rejected the message (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Unreadable platform response: {0}")]
    Decode(String),

    #[error("Delivery cancelled")]
    Cancelled,

    #[error("Notifier misconfigured: {0}")]
    Misconfigured(String),

    #[error("Notifier task panicked: {0}")]
    Panicked(String),
}

impl ChannelError {
    /// True for failures below the application protocol (network, HTTP status)
    pub fn is_transport(&self) -> bool {
        matches!(self, ChannelError::Transport(_) | ChannelError::Status { .. })
    }

    /// True when the platform understood the request and refused it
    pub fn is_rejection(&self) -> bool {
        matches!(self, ChannelError::Rejected { .. })
    }

    pub(crate) fn rejected(code: i64, message: impl Into<String>) -> Self {
        ChannelError::Rejected {
            code,
            message: message.into(),
        }
    }
}
