use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("frame runner stage '{stage}' returned a fatal error")]
    RunnerError { stage: String },
    #[error(transparent)]
    Raster(#[from] rasterio::Error),
    #[error(transparent)]
    Frame(#[from] dataframe::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
