use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::error::StatusError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub actor: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_connections = match non_empty("STATUS_MATRIX_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring invalid STATUS_MATRIX_MAX_CONNECTIONS");
                DEFAULT_MAX_CONNECTIONS
            }),
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Self {
            database_url: non_empty("DATABASE_URL"),
            max_connections,
            actor: non_empty("STATUS_MATRIX_ACTOR")
                .or_else(|| non_empty("USER"))
                .unwrap_or_else(|| "cli".to_string()),
        }
    }
}

/// Store handle plus the identity that store writes are attributed to.
/// Passed explicitly to every database operation.
pub struct Session {
    pub pool: PgPool,
    pub actor: String,
}

impl Session {
    pub async fn connect(settings: &Settings) -> Result<Self, StatusError> {
        let url = settings.database_url.as_deref().ok_or_else(|| {
            StatusError::Connection(
                "DATABASE_URL must be set to a production Postgres instance".to_string(),
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(url)
            .await?;
        debug!(actor = %settings.actor, "connected to Postgres");

        Ok(Self {
            pool,
            actor: settings.actor.clone(),
        })
    }
}
