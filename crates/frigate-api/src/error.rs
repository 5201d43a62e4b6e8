use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("empty response body from {0}")]
    EmptyBody(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
