use thiserror::Error;

#[derive(Debug, Error)]
pub enum SonarError {
    #[error("{url} not found")]
    NotFound { url: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to encode field values: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("setting {0} has no values to send")]
    EmptyValue(String),
}

impl SonarError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SonarError::NotFound { .. })
    }
}
