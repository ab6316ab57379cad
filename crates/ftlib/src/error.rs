use std::io;

/// Result alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Everything that can end a transfer early.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Header length or content is invalid.
    #[error("malformed meta frame: {0}")]
    MalformedFrame(String),

    /// Peer closed the connection before the declared byte count arrived.
    #[error("connection lost after {transferred} of {expected} bytes")]
    ConnectionLost { transferred: u64, expected: u64 },

    /// Local source ran dry before the declared size was sent.
    #[error("source exhausted after {read} of {expected} bytes")]
    ShortSource { read: u64, expected: u64 },

    /// Tag verification failed on a received secure chunk.
    #[error("authentication failed on chunk {chunk}")]
    AuthenticationFailed { chunk: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// True for errors that must never be retried on the same session data.
    ///
    /// `ConnectionLost` and transport-level I/O failures are left to the caller's retry policy,
    /// which must always start a fresh session.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedFrame(_)
            | Self::AuthenticationFailed { .. }
            | Self::ShortSource { .. }
            | Self::InvalidArgument(_) => true,
            Self::ConnectionLost { .. } | Self::Io(_) => false,
        }
    }

    /// Short machine-friendly name, used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrame(_) => "malformed_frame",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::ShortSource { .. } => "short_source",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Io(_) => "io",
        }
    }
}
