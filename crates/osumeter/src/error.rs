use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    #[error("Failed to fetch offsets: {0}")]
    OffsetFetchFailed(String),

    #[error("Invalid offset file: {0}")]
    InvalidOffsetFile(String),

    #[error("Failed to parse beatmap file: {0}")]
    BeatmapParse(String),

    #[error("Failed to parse replay file: {0}")]
    ReplayParse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Http(String),
}

impl Error {
    /// Create a MemoryReadFailed error for the given address.
    pub fn memory_read(address: u64, message: impl Into<String>) -> Self {
        Self::MemoryReadFailed {
            address,
            message: message.into(),
        }
    }

    /// Returns true if the error is an I/O "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "remote")]
impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        let message = match &e {
            ureq::Error::StatusCode(code) => format!("HTTP {} error", code),
            ureq::Error::Timeout(_) => format!("Request timed out: {}", e),
            _ => format!("HTTP error: {}", e),
        };
        Error::Http(message)
    }
}
