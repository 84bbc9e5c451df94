//! Error types for whisper context operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The native layer handed back the invalid handle.
    #[error("couldn't create whisper context: {0}")]
    InitializationFailed(String),

    /// The context was released, never created, or its worker is gone.
    #[error("whisper context not initialized")]
    NotInitialized,

    #[error("native call failed: {0}")]
    NativeCallFailure(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn init_failed<S: Into<String>>(msg: S) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn native<S: Into<String>>(msg: S) -> Self {
        Self::NativeCallFailure(msg.into())
    }

    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::Audio(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<hound::Error> for EngineError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Self::Io(e),
            other => Self::Audio(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
