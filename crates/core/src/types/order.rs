//! The order aggregate.
//!
//! An [`Order`] is persisted across five relations (header, delivery, payment,
//! product catalog, order lines) but is always read and written as one unit.
//! The JSON shape is flat and matches what order producers submit:
//!
//! ```json
//! {
//!   "order_id": "b563feb7b2b84b6test",
//!   "client_id": 42,
//!   "locale": "en",
//!   "delivery": { "name": "Test Testov", "city": "Moscow", ... },
//!   "payment": { "transaction_id": "b563feb7b2b84b6test", "amount": 1817, ... },
//!   "items": [{ "product_id": 100, "name": "Mascaras", "quantity": 2, ... }],
//!   "date_created": "2021-11-26T06:22:19Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ClientId, ProductId};
use super::order_id::OrderId;

/// Currency recorded for a payment when none is supplied.
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Root of the order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    #[serde(default)]
    pub client_id: ClientId,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub payment: Payment,
    /// Catalog products referenced by this order with their quantities.
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
}

impl Order {
    /// Create an order with an empty delivery, default payment and no lines.
    #[must_use]
    pub fn new(order_id: OrderId, client_id: ClientId, date_created: DateTime<Utc>) -> Self {
        Self {
            order_id,
            client_id,
            locale: String::new(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            date_created,
        }
    }

    /// Identifiers of every product referenced by this order, in line order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.items.iter().map(|line| line.product.product_id)
    }
}

/// Delivery details, one per order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(rename = "type")]
    pub delivery_type: String,
    pub city: String,
    pub address: String,
}

/// Payment details.
///
/// At most one payment row is ever stored per order; later saves of the same
/// order leave the first payment in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction_id: String,
    pub currency: String,
    pub provider: String,
    /// Amount with two fractional digits, written as a JSON number.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    /// Payment time as seconds since the Unix epoch.
    pub date_pay: i64,
    pub bank: String,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            transaction_id: String::new(),
            currency: DEFAULT_CURRENCY.to_owned(),
            provider: String::new(),
            amount: Decimal::ZERO,
            date_pay: 0,
            bank: String::new(),
        }
    }
}

/// A catalog product, shared across orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default, serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(default)]
    pub size: String,
}

/// A product referenced by an order together with the ordered quantity.
///
/// Serialized flat: the product fields and `quantity` share one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub product: Product,
    #[serde(default)]
    pub quantity: i32,
}
