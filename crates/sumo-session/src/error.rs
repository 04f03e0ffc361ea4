/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sumo_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sumo_frame::FrameError),

    /// Control-port exchange, UDP bind or connect did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A bounded wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Spawning a worker thread or an image sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was closed, or a worker it depends on has exited.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether the error means the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::HandshakeFailed(_) | SessionError::Closed
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
