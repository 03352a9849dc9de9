//! Error types for the impact engine.

use serde::Serialize;
use thiserror::Error;

/// Malformed numeric input reaching the physics model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Failures of one backend prediction attempt.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The request never reached the server, or no answer came in time.
    #[error("network error: {0}")]
    Network(String),

    /// The connection broke after the request may have been delivered.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::Network(_) | PredictError::Transport(_) => ErrorKind::Network,
            PredictError::Protocol { .. } => ErrorKind::Protocol,
            PredictError::Decode(_) => ErrorKind::ResponseShape,
            PredictError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Connect and timeout failures; only these qualify for the optional retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, PredictError::Network(_))
    }
}

impl From<reqwest::Error> for PredictError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PredictError::Decode(err.to_string())
        } else if err.is_connect() || err.is_timeout() {
            PredictError::Network(err.to_string())
        } else {
            PredictError::Transport(err.to_string())
        }
    }
}

/// Scheduler lifecycle failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("render target not ready after {attempts} attempts")]
    TargetNeverReady { attempts: u32 },

    #[error("scheduler task stopped unexpectedly")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidParameter,
    Network,
    Protocol,
    ResponseShape,
    Internal,
}

/// What the UI shows for a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl From<&PredictError> for ErrorDetail {
    fn from(err: &PredictError) -> Self {
        match err {
            PredictError::Protocol { status, body } => ErrorDetail {
                kind: ErrorKind::Protocol,
                message: format!("server error: HTTP {status}: {body}"),
                status: Some(*status),
                body: Some(body.clone()),
            },
            other => ErrorDetail {
                kind: other.kind(),
                message: "server error".to_string(),
                status: None,
                body: None,
            },
        }
    }
}
