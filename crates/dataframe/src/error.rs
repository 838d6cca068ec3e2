use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("column '{name}' not found in dataframe")]
    UnknownColumn { name: String },
    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },
    #[error("wire record is corrupt: {reason}")]
    Corrupt { reason: String },
    #[error("timed out waiting for dataframe with key {key}")]
    TimeoutReceivingDataframe { key: u64 },
    #[error("frame {frame_key} is incomplete: received {received} of {expected} records")]
    IncompleteFrame { frame_key: u32, received: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
