//! Error types shared by the conversion tools, stores and HTTP layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The upload could not be parsed as a PDF
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// The upload could not be decoded as an image
    #[error("Invalid image file: {reason}")]
    InvalidImage { reason: String },

    #[error("Invalid format. Supported: PNG, JPG, WebP, GIF")]
    UnsupportedFormat,

    #[error("Invalid dimensions")]
    InvalidDimensions,

    #[error("Maximum dimension is {max}px")]
    DimensionTooLarge { max: u32 },

    #[error("No file provided")]
    NoFile,

    #[error("No files provided")]
    NoFiles,

    #[error("At least {required} PDF files are required")]
    NotEnoughFiles { required: usize },

    #[error("No pages specified")]
    NoPagesSpecified,

    #[error("No valid pages specified")]
    NoValidPages,

    #[error("Daily limit reached. Upgrade to Pro for unlimited access.")]
    QuotaExceeded,

    #[error("File {name} exceeds the {limit_mb}MB upload limit")]
    PayloadTooLarge { name: String, limit_mb: u64 },

    #[error("Malformed form data: {reason}")]
    BadForm { reason: String },

    #[error("Missing stripe-signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {reason}")]
    InvalidPayload { reason: String },

    /// A PDF or image library failed on input it had already accepted
    #[error("Processing failed: {reason}")]
    Processing { reason: String },

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream(err.to_string())
    }
}
