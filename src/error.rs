use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("Unknown service key: {0}")]
    UnknownServiceKey(String),

    #[error("Invalid configuration effective {effective_from}: {details}")]
    InvalidConfig {
        effective_from: NaiveDate,
        details: String,
    },

    #[error("No configuration snapshot is effective on {0}")]
    ConfigNotFound(NaiveDate),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
