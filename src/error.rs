use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// How a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    /// Rejected input; nothing changed.
    Validation,
    /// Storage, payload, export or remote failure; the triggering operation was abandoned.
    Io,
    /// The rendering engine is missing for the rest of the session.
    CapabilityLoss,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("viewer error: {0}")]
    Viewer(#[from] ViewerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) | Self::Payload(_) | Self::Remote(_) | Self::Io(_) => ErrorKind::Io,
            Self::Viewer(err) => err.kind(),
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("not a pdf file: {0}")]
    NotPdf(String),

    #[error("no pdf files in selection")]
    NoPdfFiles,

    #[error("name cannot be empty")]
    EmptyName,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("the reserved category cannot be changed")]
    ReservedCategory,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("quota exceeded: {size} bytes exceeds {quota} bytes")]
    QuotaExceeded { size: u64, quota: u64 },

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported blob version: {0}")]
    UnsupportedVersion(u32),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("invalid payload reference: {0}")]
    InvalidReference(String),

    #[error("payload decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("payload fetch failed: {0}")]
    Fetch(#[from] RemoteError),
}

/// Remote collaborators report a single generic failure; details go to the log.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum RemoteError {
    #[error("remote storage is not configured")]
    NotConfigured,

    #[error("remote request failed")]
    Failed,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ViewerError {
    #[error("pdf viewer unavailable: {0}")]
    Unavailable(String),

    #[error("no document is open")]
    NotOpen,

    #[error("failed to open document: {0}")]
    OpenFailed(String),

    #[error("failed to render page {page}: {reason}")]
    RenderFailed { page: usize, reason: String },
}

impl ViewerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::CapabilityLoss,
            Self::NotOpen => ErrorKind::Validation,
            Self::OpenFailed(_) | Self::RenderFailed { .. } => ErrorKind::Io,
        }
    }
}
