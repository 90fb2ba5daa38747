//! `PostgreSQL` persistence of order aggregates.
//!
//! Saves run in a single transaction. Reads are plain queries against the
//! pool and are not wrapped in a transaction: a save that commits between the
//! sub-fetches of a read can be observed partially by that read.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use order_service_core::{
    ClientId, DEFAULT_CURRENCY, Delivery, Order, OrderId, OrderLine, Payment, Product, ProductId,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::{FetchStage, OrderRepository, RECENT_ORDERS_LIMIT, RepositoryError, SaveStep};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    client_id: i32,
    locale: Option<String>,
    date_created: Option<NaiveDateTime>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let order_id = OrderId::parse(&self.order_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order_id in database: {e}"))
        })?;

        Ok(Order {
            order_id,
            client_id: ClientId::new(self.client_id),
            locale: self.locale.unwrap_or_default(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            date_created: self.date_created.unwrap_or_default().and_utc(),
        })
    }
}

/// Internal row type for `delivery`.
#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    order_id: String,
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    #[sqlx(rename = "type")]
    delivery_type: Option<String>,
    city: Option<String>,
    address: Option<String>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.name.unwrap_or_default(),
            phone: row.phone.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            delivery_type: row.delivery_type.unwrap_or_default(),
            city: row.city.unwrap_or_default(),
            address: row.address.unwrap_or_default(),
        }
    }
}

/// Internal row type for `payment`.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    order_id: String,
    transaction_id: Option<String>,
    currency: Option<String>,
    provider: Option<String>,
    amount: Option<Decimal>,
    date_pay: Option<i64>,
    bank: Option<String>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction_id: row.transaction_id.unwrap_or_default(),
            currency: row
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
            provider: row.provider.unwrap_or_default(),
            amount: row.amount.unwrap_or_default(),
            date_pay: row.date_pay.unwrap_or_default(),
            bank: row.bank.unwrap_or_default(),
        }
    }
}

/// Internal row type for `items` joined with `item`.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    order_id: String,
    product_id: i64,
    name: Option<String>,
    brand: Option<String>,
    price: Option<Decimal>,
    size: Option<String>,
    quantity: i32,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            product: Product {
                product_id: ProductId::new(row.product_id),
                name: row.name.unwrap_or_default(),
                brand: row.brand.unwrap_or_default(),
                price: row.price.unwrap_or_default(),
                size: row.size.unwrap_or_default(),
            },
            quantity: row.quantity,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Order repository backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Save an order aggregate in one transaction and return it as stored.
    ///
    /// Steps run in foreign-key order: header, delivery, payment, products,
    /// order lines. The aggregate is then read back inside the same
    /// transaction. If any step fails the transaction is rolled back when it
    /// is dropped and the error names the failing step.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Persistence` if any step fails.
    #[instrument(skip(self, order), fields(order_id = %order.order_id, lines = order.items.len()))]
    pub async fn save_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        let failed = |step: SaveStep| {
            let order_id = order.order_id.clone();
            move |source: sqlx::Error| RepositoryError::Persistence {
                order_id,
                step,
                source,
            }
        };

        let mut tx = self.pool.begin().await.map_err(failed(SaveStep::Begin))?;

        sqlx::query(
            r"
            INSERT INTO orders (order_id, client_id, locale, date_created)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                locale = EXCLUDED.locale,
                date_created = EXCLUDED.date_created
            ",
        )
        .bind(&order.order_id)
        .bind(order.client_id)
        .bind(&order.locale)
        .bind(order.date_created.naive_utc())
        .execute(&mut *tx)
        .await
        .map_err(failed(SaveStep::Header))?;

        let delivery = &order.delivery;
        sqlx::query(
            r"
            INSERT INTO delivery (order_id, name, phone, email, type, city, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                type = EXCLUDED.type,
                city = EXCLUDED.city,
                address = EXCLUDED.address
            ",
        )
        .bind(&order.order_id)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.email)
        .bind(&delivery.delivery_type)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .execute(&mut *tx)
        .await
        .map_err(failed(SaveStep::Delivery))?;

        // The header upsert above holds the row lock on `orders` until commit,
        // so concurrent saves of one order serialize and the existence checks
        // below cannot race.
        let payment = &order.payment;
        let inserted = sqlx::query(
            r"
            INSERT INTO payment (order_id, transaction_id, currency, provider, amount, date_pay, bank)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM payment WHERE order_id = $1)
            ",
        )
        .bind(&order.order_id)
        .bind(&payment.transaction_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.date_pay)
        .bind(&payment.bank)
        .execute(&mut *tx)
        .await
        .map_err(failed(SaveStep::Payment))?
        .rows_affected();
        if inserted == 0 {
            debug!("payment already recorded, keeping the existing row");
        }

        for line in &order.items {
            let product = &line.product;
            sqlx::query(
                r"
                INSERT INTO item (product_id, name, brand, price, size)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    brand = EXCLUDED.brand,
                    price = EXCLUDED.price,
                    size = EXCLUDED.size
                ",
            )
            .bind(product.product_id)
            .bind(&product.name)
            .bind(&product.brand)
            .bind(product.price)
            .bind(&product.size)
            .execute(&mut *tx)
            .await
            .map_err(failed(SaveStep::Product))?;
        }

        for line in &order.items {
            sqlx::query(
                r"
                INSERT INTO items (order_id, product_id, quantity)
                SELECT $1, $2, $3
                WHERE NOT EXISTS (
                    SELECT 1 FROM items WHERE order_id = $1 AND product_id = $2
                )
                ",
            )
            .bind(&order.order_id)
            .bind(line.product.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(failed(SaveStep::OrderLine))?;
        }

        let saved = fetch_order(&mut *tx, &order.order_id)
            .await
            .map_err(|err| match err {
                RepositoryError::Lookup { source, .. } => failed(SaveStep::Reload)(source),
                other => other,
            })?
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "order {} missing after save",
                    order.order_id
                ))
            })?;

        tx.commit().await.map_err(failed(SaveStep::Commit))?;

        debug!("order committed");
        Ok(saved)
    }

    /// Get an order aggregate by identifier.
    ///
    /// A missing delivery or payment row yields the default value and missing
    /// order lines yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Lookup` if any query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored identifier is invalid.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|source| RepositoryError::Lookup {
                order_id: Some(order_id.clone()),
                stage: FetchStage::Connection,
                source,
            })?;

        fetch_order(&mut *conn, order_id).await
    }

    /// Get the most recently created orders, newest first.
    ///
    /// At most [`RECENT_ORDERS_LIMIT`] headers are read. Deliveries, payments
    /// and order lines for all of them are then fetched with one query per
    /// sub-entity instead of one per order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Lookup` if any query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored identifier is invalid.
    #[instrument(skip(self))]
    pub async fn get_recent_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let failed = |stage: FetchStage| {
            move |source: sqlx::Error| RepositoryError::Lookup {
                order_id: None,
                stage,
                source,
            }
        };

        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT order_id, client_id, locale, date_created
            FROM orders
            ORDER BY date_created DESC NULLS LAST, order_id
            LIMIT $1
            ",
        )
        .bind(RECENT_ORDERS_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(failed(FetchStage::Header))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|row| row.order_id.clone()).collect();

        let deliveries = sqlx::query_as::<_, DeliveryRow>(
            r"
            SELECT order_id, name, phone, email, type, city, address
            FROM delivery
            WHERE order_id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(failed(FetchStage::Delivery))?;

        // First payment per order, matching `get_order`.
        let payments = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT DISTINCT ON (order_id)
                order_id, transaction_id, currency, provider, amount, date_pay, bank
            FROM payment
            WHERE order_id = ANY($1)
            ORDER BY order_id, payment_id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(failed(FetchStage::Payment))?;

        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT it.order_id, i.product_id, i.name, i.brand, i.price, i.size, it.quantity
            FROM items it
            JOIN item i ON it.product_id = i.product_id
            WHERE it.order_id = ANY($1)
            ORDER BY it.items_id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(failed(FetchStage::OrderLines))?;

        let orders = assemble(rows, deliveries, payments, lines)?;
        debug!(count = orders.len(), "loaded recent orders");
        Ok(orders)
    }
}

/// Read one aggregate over `conn`, which may be inside a transaction.
async fn fetch_order(
    conn: &mut PgConnection,
    order_id: &OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let failed = |stage: FetchStage| {
        move |source: sqlx::Error| RepositoryError::Lookup {
            order_id: Some(order_id.clone()),
            stage,
            source,
        }
    };

    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT order_id, client_id, locale, date_created
        FROM orders
        WHERE order_id = $1
        ",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(failed(FetchStage::Header))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut order = row.into_order()?;

    let delivery = sqlx::query_as::<_, DeliveryRow>(
        r"
        SELECT order_id, name, phone, email, type, city, address
        FROM delivery
        WHERE order_id = $1
        ",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(failed(FetchStage::Delivery))?;
    order.delivery = delivery.map(Delivery::from).unwrap_or_default();

    let payment = sqlx::query_as::<_, PaymentRow>(
        r"
        SELECT order_id, transaction_id, currency, provider, amount, date_pay, bank
        FROM payment
        WHERE order_id = $1
        ORDER BY payment_id
        LIMIT 1
        ",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(failed(FetchStage::Payment))?;
    order.payment = payment.map(Payment::from).unwrap_or_default();

    let lines = sqlx::query_as::<_, OrderLineRow>(
        r"
        SELECT it.order_id, i.product_id, i.name, i.brand, i.price, i.size, it.quantity
        FROM items it
        JOIN item i ON it.product_id = i.product_id
        WHERE it.order_id = $1
        ORDER BY it.items_id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(failed(FetchStage::OrderLines))?;
    order.items = lines.into_iter().map(OrderLine::from).collect();

    Ok(Some(order))
}

/// Stitch sub-entity rows onto their headers, preserving header order.
fn assemble(
    rows: Vec<OrderRow>,
    deliveries: Vec<DeliveryRow>,
    payments: Vec<PaymentRow>,
    lines: Vec<OrderLineRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let mut deliveries: HashMap<String, Delivery> = deliveries
        .into_iter()
        .map(|row| (row.order_id.clone(), Delivery::from(row)))
        .collect();
    let mut payments: HashMap<String, Payment> = payments
        .into_iter()
        .map(|row| (row.order_id.clone(), Payment::from(row)))
        .collect();
    let mut lines_by_order: HashMap<String, Vec<OrderLine>> = HashMap::new();
    for row in lines {
        lines_by_order
            .entry(row.order_id.clone())
            .or_default()
            .push(OrderLine::from(row));
    }

    rows.into_iter()
        .map(|row| {
            let key = row.order_id.clone();
            let mut order = row.into_order()?;
            order.delivery = deliveries.remove(&key).unwrap_or_default();
            order.payment = payments.remove(&key).unwrap_or_default();
            order.items = lines_by_order.remove(&key).unwrap_or_default();
            Ok(order)
        })
        .collect()
}

impl OrderRepository for PgOrderRepository {
    async fn save_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        Self::save_order(self, order).await
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Self::get_order(self, order_id).await
    }

    async fn get_recent_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Self::get_recent_orders(self).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|source| RepositoryError::Lookup {
                order_id: None,
                stage: FetchStage::Connection,
                source,
            })
    }
}
