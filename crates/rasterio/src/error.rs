use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open raster source '{path}': {reason}")]
    OpenFailed { path: String, reason: String },
    #[error("coordinate transform failed: {reason}")]
    TransformFailed { reason: String },
    #[error("read of raster source '{path}' failed: {reason}")]
    ReadFailed { path: String, reason: String, retryable: bool },
    #[error("coordinate ({x}, {y}) is outside the raster extent")]
    OutOfBounds { x: f64, y: f64 },
    #[error("raster memory pool exhausted: requested {requested_bytes} bytes, budget is {budget_bytes}")]
    MemoryPoolExhausted { requested_bytes: u64, budget_bytes: u64 },
    #[error("failed to write raster output '{path}': {reason}")]
    WriteFailed { path: String, reason: String },
    #[error("raster source '{name}' is not registered")]
    UnknownSource { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
