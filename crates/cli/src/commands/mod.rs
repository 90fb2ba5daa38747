//! CLI command implementations.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string, or the `DB_USER`,
//!   `DB_PASSWORD`, `DB_HOST`, `DB_PORT` and `DB_NAME` parts

pub mod order;
pub mod schema;

use order_service::config::{self, ConfigError};
use order_service::db::{self, RepositoryError};
use order_service_core::{OrderId, OrderIdError};
use sqlx::PgPool;
use thiserror::Error;

/// Pool size for one-shot commands.
const MAX_CONNECTIONS: u32 = 2;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Database location is not configured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Order identifier is invalid.
    #[error("Invalid order id: {0}")]
    InvalidOrderId(#[from] OrderIdError),

    /// Order does not exist.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// Reading the input file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Order JSON could not be parsed or printed.
    #[error("Invalid order JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the order database configured in the environment.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = config::database_url_from_env()?;

    tracing::info!("Connecting to order database...");
    Ok(db::create_pool(&database_url, MAX_CONNECTIONS).await?)
}
