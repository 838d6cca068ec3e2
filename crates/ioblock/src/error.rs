use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("short read at offset {offset}: requested {requested} bytes, got {got}")]
    IoShort { offset: u64, requested: u64, got: u64 },
    #[error("I/O error at offset {offset}, length {length}: {cause}")]
    IoError { offset: u64, length: u64, cause: std::io::Error },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
