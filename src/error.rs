/// Errors that end (or prevent) a game session.
///
/// Missing face models, empty frames and ignored commands are ordinary
/// observations and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Capture device returned an error
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Capture source has no more frames
    #[error("Capture ended")]
    CaptureEnded,

    /// Configuration is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
