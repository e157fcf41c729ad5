/// Core error type for the exporter.
///
/// Adapter crates map their specific errors into this type so the run loop
/// can tell fatal failures from per-message ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("could not resolve channel: {0}")]
    Resolution(String),

    #[error("message {message_id}: {reason}")]
    MessageProcessing { message_id: i32, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Per-message failures are recovered by the run loop; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MessageProcessing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
