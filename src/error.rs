use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("framing error: {0}")]
    Framing(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("application id mismatch: got {0}")]
    AppIdMismatch(i16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
