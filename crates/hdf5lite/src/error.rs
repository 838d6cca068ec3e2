use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("corrupt HDF5 input: {reason}")]
    Corrupt { reason: String },
    #[error("inflate did not terminate cleanly")]
    InflateIncomplete,
    #[error("dataset path did not resolve at level {level}")]
    InvalidPath { level: usize },
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("row range [{start}, {start}+{count}) exceeds dimension 0 size {size}")]
    OutOfRange { start: u64, count: u64, size: u64 },
    #[error(transparent)]
    Io(#[from] ioblock::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Error::Corrupt { reason: reason.into() }
    }
}
