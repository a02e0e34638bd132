use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::service::RemoteError;

#[derive(Error, Debug)]
pub enum MillError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to fetch image {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("search volume too high, try again later")]
    Throttled,

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("image search error: {0}")]
    Search(String),

    #[error("retry budget exhausted")]
    RecursionExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl MillError {
    /// True when the remote side asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            MillError::Throttled => true,
            MillError::Remote(remote) => remote.is_rate_limited(),
            _ => false,
        }
    }
}

impl From<url::ParseError> for MillError {
    fn from(e: url::ParseError) -> Self {
        MillError::InvalidConfig(format!("endpoint is not a valid URL: {}", e))
    }
}

impl ResponseError for MillError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            MillError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MillError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MillError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            MillError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            MillError::Throttled => StatusCode::TOO_MANY_REQUESTS,
            MillError::Remote(_) => StatusCode::BAD_GATEWAY,
            MillError::Search(_) => StatusCode::BAD_GATEWAY,
            MillError::RecursionExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            MillError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MillError::Json(_) => StatusCode::BAD_REQUEST,
        }
    }
}
