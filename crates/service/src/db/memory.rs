//! In-process order repository.
//!
//! [`MemoryOrderRepository`] keeps the five relations in memory with the same
//! write semantics as [`PgOrderRepository`](super::PgOrderRepository):
//! header, delivery and products are upserted; payment and order lines are
//! insert-if-absent; recent orders are capped and newest first. Values are
//! kept at column precision (microsecond timestamps, two-digit decimals). A
//! save is applied under one lock, so it is all-or-nothing.
//!
//! Failures and latency can be injected, which makes it the store double for
//! coordinator and HTTP tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use order_service_core::{ClientId, Delivery, Order, OrderId, OrderLine, Payment, Product, ProductId};

use rust_decimal::{Decimal, RoundingStrategy};

use super::{FetchStage, OrderRepository, RECENT_ORDERS_LIMIT, RepositoryError, SaveStep};

#[derive(Debug, Clone)]
struct HeaderRecord {
    client_id: ClientId,
    locale: String,
    date_created: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<OrderId, HeaderRecord>,
    delivery: HashMap<OrderId, Delivery>,
    payment: HashMap<OrderId, Payment>,
    item: HashMap<ProductId, Product>,
    /// Order lines in insertion order.
    items: Vec<(OrderId, ProductId, i32)>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_save_at: Option<SaveStep>,
    fail_lookups: bool,
    latency: Duration,
}

/// Order repository held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryOrderRepository {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl MemoryOrderRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail at `step` (or succeed again with `None`).
    pub fn fail_saves_at(&self, step: Option<SaveStep>) {
        lock(&self.faults).fail_save_at = step;
    }

    /// Make every subsequent lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        lock(&self.faults).fail_lookups = fail;
    }

    /// Delay every operation by `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.faults).latency = latency;
    }

    /// Number of stored order headers.
    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.tables).orders.len()
    }

    async fn delay(&self) {
        let latency = lock(&self.faults).latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected_save_failure(&self, order_id: &OrderId) -> Result<(), RepositoryError> {
        match lock(&self.faults).fail_save_at {
            Some(step) => Err(RepositoryError::Persistence {
                order_id: order_id.clone(),
                step,
                source: sqlx::Error::Protocol(format!("injected failure at {step}")),
            }),
            None => Ok(()),
        }
    }

    fn injected_lookup_failure(
        &self,
        order_id: Option<&OrderId>,
        stage: FetchStage,
    ) -> Result<(), RepositoryError> {
        if lock(&self.faults).fail_lookups {
            return Err(RepositoryError::Lookup {
                order_id: order_id.cloned(),
                stage,
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `DECIMAL(10, 2)` rounding.
fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Tables {
    fn save(&mut self, order: &Order) {
        let id = &order.order_id;

        self.orders.insert(
            id.clone(),
            HeaderRecord {
                client_id: order.client_id,
                locale: order.locale.clone(),
                date_created: order.date_created.trunc_subsecs(6),
            },
        );
        self.delivery.insert(id.clone(), order.delivery.clone());
        self.payment
            .entry(id.clone())
            .or_insert_with(|| Payment {
                amount: money(order.payment.amount),
                ..order.payment.clone()
            });

        for line in &order.items {
            self.item.insert(
                line.product.product_id,
                Product {
                    price: money(line.product.price),
                    ..line.product.clone()
                },
            );
        }
        for line in &order.items {
            let product_id = line.product.product_id;
            let exists = self
                .items
                .iter()
                .any(|(order_id, pid, _)| order_id == id && *pid == product_id);
            if !exists {
                self.items.push((id.clone(), product_id, line.quantity));
            }
        }
    }

    fn load(&self, order_id: &OrderId) -> Option<Order> {
        let header = self.orders.get(order_id)?;

        let items = self
            .items
            .iter()
            .filter(|(id, _, _)| id == order_id)
            .filter_map(|(_, product_id, quantity)| {
                self.item.get(product_id).map(|product| OrderLine {
                    product: product.clone(),
                    quantity: *quantity,
                })
            })
            .collect();

        Some(Order {
            order_id: order_id.clone(),
            client_id: header.client_id,
            locale: header.locale.clone(),
            delivery: self.delivery.get(order_id).cloned().unwrap_or_default(),
            payment: self.payment.get(order_id).cloned().unwrap_or_default(),
            items,
            date_created: header.date_created,
        })
    }
}

impl OrderRepository for MemoryOrderRepository {
    async fn save_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        self.delay().await;
        self.injected_save_failure(&order.order_id)?;

        let mut tables = lock(&self.tables);
        tables.save(order);
        tables.load(&order.order_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {} missing after save", order.order_id))
        })
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.delay().await;
        self.injected_lookup_failure(Some(order_id), FetchStage::Header)?;
        Ok(lock(&self.tables).load(order_id))
    }

    async fn get_recent_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        self.delay().await;
        self.injected_lookup_failure(None, FetchStage::Header)?;

        let tables = lock(&self.tables);
        let mut headers: Vec<(&OrderId, &HeaderRecord)> = tables.orders.iter().collect();
        headers.sort_by(|(a_id, a), (b_id, b)| {
            b.date_created
                .cmp(&a.date_created)
                .then_with(|| a_id.cmp(b_id))
        });

        let limit = usize::try_from(RECENT_ORDERS_LIMIT).unwrap_or(usize::MAX);
        Ok(headers
            .into_iter()
            .take(limit)
            .filter_map(|(id, _)| tables.load(id))
            .collect())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.injected_lookup_failure(None, FetchStage::Connection)
    }
}
