//! Schema bootstrap.
//!
//! Creates the five order relations and their indexes when the `orders` table
//! is missing. An existing `orders` table is taken to mean the schema is in
//! place; nothing is altered.

use sqlx::PgPool;
use tracing::{info, instrument};

use super::RepositoryError;

/// DDL statements in creation order, each with the step name used in errors.
const SCHEMA: &[(&str, &str)] = &[
    (
        "create orders table",
        r"
        CREATE TABLE orders (
            order_id VARCHAR(50) PRIMARY KEY,
            client_id INTEGER NOT NULL,
            locale VARCHAR(10),
            date_created TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        ",
    ),
    (
        "create delivery table",
        r"
        CREATE TABLE delivery (
            order_id VARCHAR(50) PRIMARY KEY REFERENCES orders(order_id) ON DELETE CASCADE,
            name VARCHAR(255),
            phone VARCHAR(20),
            email VARCHAR(255),
            type VARCHAR(10),
            city VARCHAR(100),
            address TEXT
        )
        ",
    ),
    (
        "create item table",
        r"
        CREATE TABLE item (
            product_id BIGINT PRIMARY KEY,
            name VARCHAR(255),
            brand VARCHAR(255),
            price DECIMAL(10, 2),
            size VARCHAR(255)
        )
        ",
    ),
    (
        "create items table",
        r"
        CREATE TABLE items (
            items_id SERIAL PRIMARY KEY,
            order_id VARCHAR(50) NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            product_id BIGINT NOT NULL REFERENCES item(product_id) ON DELETE RESTRICT,
            quantity INTEGER NOT NULL
        )
        ",
    ),
    (
        "create payment table",
        r"
        CREATE TABLE payment (
            payment_id BIGSERIAL PRIMARY KEY,
            order_id VARCHAR(50) NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            transaction_id VARCHAR(50),
            currency VARCHAR(10) DEFAULT 'RUB',
            provider VARCHAR(50),
            amount DECIMAL(10, 2),
            date_pay BIGINT,
            bank VARCHAR(50)
        )
        ",
    ),
    (
        "create orders.client_id index",
        "CREATE INDEX idx_orders_client_id ON orders(client_id)",
    ),
    (
        "create items.order_id index",
        "CREATE INDEX idx_items_order_id ON items(order_id)",
    ),
    (
        "create items.product_id index",
        "CREATE INDEX idx_items_product_id ON items(product_id)",
    ),
    (
        "create payment.order_id index",
        "CREATE INDEX idx_payment_order_id ON payment(order_id)",
    ),
    (
        "create payment.transaction_id index",
        "CREATE INDEX idx_payment_transaction_id ON payment(transaction_id)",
    ),
    (
        "create item.brand index",
        "CREATE INDEX idx_item_brand ON item(brand)",
    ),
];

/// Create the order schema if the `orders` table does not exist.
///
/// Returns `true` if the schema was created, `false` if it already existed.
/// The DDL runs in one transaction, so a failed bootstrap leaves no tables
/// behind.
///
/// # Errors
///
/// Returns `RepositoryError::Schema` naming the statement that failed.
#[instrument(skip(pool))]
pub async fn init_schema(pool: &PgPool) -> Result<bool, RepositoryError> {
    let exists: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = 'orders'
        )
        ",
    )
    .fetch_one(pool)
    .await
    .map_err(|source| RepositoryError::Schema {
        step: "check table existence",
        source,
    })?;

    if exists {
        info!("order schema already present");
        return Ok(false);
    }

    let mut tx = pool.begin().await.map_err(|source| RepositoryError::Schema {
        step: "begin schema transaction",
        source,
    })?;

    for &(step, ddl) in SCHEMA {
        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|source| RepositoryError::Schema { step, source })?;
    }

    tx.commit().await.map_err(|source| RepositoryError::Schema {
        step: "commit schema transaction",
        source,
    })?;

    info!(statements = SCHEMA.len(), "order schema created");
    Ok(true)
}
