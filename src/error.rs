use thiserror::Error;

/// A single remote write attempt failed. Retried by the termination
/// executor, never surfaced per attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("remote session gateway unreachable: {0}")]
    Unreachable(String),
    #[error("remote request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote backend rejected write with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// The local session record could not be read or written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("session store unavailable")]
    Unavailable,
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("persisted session record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuardError {
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error("session {0} is already in flight")]
    SessionInFlight(String),
    #[error("no session in flight")]
    NoActiveSession,
    #[error("session {0} is already finalizing")]
    AlreadyFinalizing(String),
    #[error("countdown is already running")]
    CountdownRunning,
    #[error("backend refused to activate session {session_id}: {source}")]
    ActivationRejected {
        session_id: String,
        #[source]
        source: GatewayError,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
