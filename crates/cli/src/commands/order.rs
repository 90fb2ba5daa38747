//! Order inspection and import commands.
//!
//! # Usage
//!
//! ```bash
//! # Print a stored order
//! order-cli order get b563feb7b2b84b6test
//!
//! # Save an order from a JSON file (same shape as the HTTP API)
//! order-cli order import order.json
//! ```
//!
//! Both commands talk to the database directly; a running service does not
//! see imported orders until they are looked up or the service restarts.

use std::path::Path;

use order_service::db::PgOrderRepository;
use order_service_core::{Order, OrderId};

use super::{CommandError, connect};

/// Print a stored order as pretty JSON.
pub async fn get(order_id: &str) -> Result<(), CommandError> {
    let order_id = OrderId::parse(order_id)?;
    let repository = PgOrderRepository::new(connect().await?);

    let order = repository
        .get_order(&order_id)
        .await?
        .ok_or(CommandError::NotFound(order_id))?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&order)?);
    }
    Ok(())
}

/// Save an order read from a JSON file.
pub async fn import(path: &Path) -> Result<(), CommandError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let order = parse_order(&contents)?;

    let repository = PgOrderRepository::new(connect().await?);
    let saved = repository.save_order(&order).await?;

    tracing::info!(
        order_id = %saved.order_id,
        lines = saved.items.len(),
        "Order imported"
    );
    Ok(())
}

fn parse_order(contents: &str) -> Result<Order, CommandError> {
    Ok(serde_json::from_str(contents)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        let order = parse_order(
            r#"{
                "order_id": "b563feb7b2b84b6test",
                "client_id": 42,
                "locale": "en",
                "delivery": {"name": "Test Testov", "type": "courier", "city": "Kiryat Mozkin"},
                "payment": {"transaction_id": "b563feb7b2b84b6test", "amount": 1817},
                "items": [{"product_id": 9934930, "name": "Mascaras", "price": 453, "quantity": 1}]
            }"#,
        )
        .unwrap();

        assert_eq!(order.order_id.as_str(), "b563feb7b2b84b6test");
        assert_eq!(order.payment.currency, "RUB");
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_parse_order_rejects_missing_id() {
        let err = parse_order(r#"{"client_id": 1}"#).unwrap_err();
        assert!(matches!(err, CommandError::Json(_)));
    }
}
