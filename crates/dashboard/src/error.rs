use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Panel returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("Failed to decode panel response: {0}")]
    Decode(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Not logged in")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}
