/// Failures surfaced to the operator. Each kind maps to exactly one
/// displayed message; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Failure(String),
}

impl StatusError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StatusError::Connection(_) => "Network error - please check your connection",
            StatusError::Validation(_) => "Invalid request - please check the selected filters",
            StatusError::Failure(_) => "Operation failed",
        }
    }
}

impl From<sqlx::Error> for StatusError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StatusError::Connection(err.to_string()),
            sqlx::Error::Database(db) => {
                let class = db
                    .code()
                    .map(|code| code.chars().take(2).collect::<String>())
                    .unwrap_or_default();
                match class.as_str() {
                    // invalid authorization
                    "28" => StatusError::Connection(err.to_string()),
                    // data exception, integrity constraint violation
                    "22" | "23" => StatusError::Validation(err.to_string()),
                    _ => StatusError::Failure(err.to_string()),
                }
            }
            _ => StatusError::Failure(err.to_string()),
        }
    }
}
