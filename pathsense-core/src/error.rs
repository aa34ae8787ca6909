use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Resource exhaustion: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, Error>;
