use thiserror::Error;

/// Fatal errors surfaced to the caller of a removal operation
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF is encrypted and cannot be opened without a password: {0}")]
    Encrypted(String),

    #[error("Invalid removal configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Per-stream failures; these are logged and the stream is left untouched
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    #[error("Failed to inflate stream: {0}")]
    Inflate(std::io::Error),

    #[error("Failed to deflate stream: {0}")]
    Deflate(std::io::Error),

    #[error("Object {0:?} is not a stream")]
    NotAStream(lopdf::ObjectId),
}
