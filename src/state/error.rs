use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
