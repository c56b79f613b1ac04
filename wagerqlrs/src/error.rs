use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    #[error("invalid column: {0}")]
    InvalidColumn(String),
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("store failure: {0}")]
    StoreFailure(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body returned to callers on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

const INTERNAL_ERROR: &str = "Internal server error";

impl EngineError {
    /// HTTP status the transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::MissingParameter(_)
            | EngineError::InvalidColumn(_)
            | EngineError::InvalidDateRange(_)
            | EngineError::InvalidPagination(_)
            | EngineError::InvalidParameter(_) => 400,
            EngineError::Unauthorized => 401,
            _ => 500,
        }
    }

    /// True for failures caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Response body for this error. Server-side detail is never echoed.
    pub fn response_body(&self) -> ErrorBody {
        let error = if self.is_client_error() {
            self.to_string()
        } else {
            INTERNAL_ERROR.to_string()
        };
        ErrorBody { error }
    }
}
