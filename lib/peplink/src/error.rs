use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("Appliance rejected {endpoint} (code {code:?}): {message}")]
    Status {
        endpoint: String,
        code: Option<i64>,
        message: String,
    },

    #[error("Appliance returned no response body for {0}")]
    MissingResponse(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
