use thiserror::Error;

/// Failure talking to a Radarr/Sonarr instance.
#[derive(Debug, Error)]
pub enum ArrError {
    #[error("connection failed for {path}: {message}")]
    Connection { path: String, message: String },

    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("malformed response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ArrError {
    pub(crate) fn from_reqwest(path: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArrError::Timeout {
                path: path.to_string(),
            }
        } else if let Some(status) = err.status() {
            ArrError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            ArrError::Decode {
                path: path.to_string(),
                message: err.to_string(),
            }
        } else {
            ArrError::Connection {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArrError::Connection { .. } | ArrError::Timeout { .. } | ArrError::Status { .. }
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ArrError::Status { status: 401, .. })
    }
}
