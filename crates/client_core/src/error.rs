use shared::domain::ValidationError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NetworkFailure,
    ServerError,
    DecodeFailure,
    ExecutionFailure,
    TaskFailure,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server responded with status {status}: {message}")]
    Server { status: u16, message: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("dispatch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Server { .. } => ErrorKind::ServerError,
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::Execution(_) => ErrorKind::ExecutionFailure,
            Self::Task(_) => ErrorKind::TaskFailure,
        }
    }
}

impl From<ValidationError> for BridgeError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidInput(format!("invalid server url: {value}"))
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed UTF-8 sequence at byte offset {offset}")]
    Malformed { offset: u64 },
    #[error("stream ended inside a multi-byte sequence ({pending} dangling bytes)")]
    Truncated { pending: usize },
    #[error("response stream failed before completion: {0}")]
    Source(#[source] BoxError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("runtime error at line {line}: {message}")]
    Runtime { line: usize, message: String },
    #[error("uncaught exception: {0}")]
    Thrown(String),
    #[error("failed to load module '{specifier}': {message}")]
    Module { specifier: String, message: String },
}
