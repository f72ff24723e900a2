use crate::executor::ExecutorError;

#[derive(Debug, thiserror::Error)]
pub enum MemDbError {
    #[error("invalid arguments for {method}: {message}")]
    ArgumentValidation {
        method: &'static str,
        message: String,
    },

    #[error("execution of {method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: ExecutorError,
    },

    #[error("result of {method} did not match its schema: {message}")]
    ResultDecoding {
        method: &'static str,
        message: String,
    },
}

impl MemDbError {
    pub fn method(&self) -> &'static str {
        match self {
            Self::ArgumentValidation { method, .. }
            | Self::Transport { method, .. }
            | Self::ResultDecoding { method, .. } => method,
        }
    }
}

pub type MemDbResult<T> = Result<T, MemDbError>;
