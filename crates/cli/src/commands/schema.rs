//! Schema bootstrap command.
//!
//! # Usage
//!
//! ```bash
//! order-cli schema init
//! ```

use order_service::db::schema;

use super::{CommandError, connect};

/// Create the order schema if it does not exist yet.
pub async fn init() -> Result<(), CommandError> {
    let pool = connect().await?;

    if schema::init_schema(&pool).await? {
        tracing::info!("Order schema created");
    } else {
        tracing::info!("Order schema already exists, nothing to do");
    }
    Ok(())
}
