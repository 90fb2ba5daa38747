//! Order identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OrderId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderIdError {
    /// The input string is empty or only whitespace.
    #[error("order_id is required")]
    Empty,
    /// The input string is too long.
    #[error("order_id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// The external key of an order aggregate.
///
/// Order identifiers are opaque strings chosen by the producer of the order.
/// They address an order both in the relational store and in the cache.
///
/// ## Constraints
///
/// - Must not be empty or whitespace-only
/// - Length: at most 50 characters (the `VARCHAR(50)` key column)
///
/// ## Examples
///
/// ```
/// use order_service_core::OrderId;
///
/// assert!(OrderId::parse("b563feb7b2b84b6test").is_ok());
///
/// assert!(OrderId::parse("").is_err());
/// assert!(OrderId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    /// Maximum length of an order identifier.
    pub const MAX_LENGTH: usize = 50;

    /// Parse an `OrderId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, whitespace-only, or longer
    /// than [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, OrderIdError> {
        if s.trim().is_empty() {
            return Err(OrderIdError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(OrderIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `OrderId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = OrderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderId {
    type Error = OrderIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)?;
        Ok(Self(value))
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::try_from(s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(OrderId::parse("O1").unwrap().as_str(), "O1");
        assert!(OrderId::parse(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(OrderId::parse(""), Err(OrderIdError::Empty));
        assert_eq!(OrderId::parse(" \t"), Err(OrderIdError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        assert!(matches!(
            OrderId::parse(&"x".repeat(51)),
            Err(OrderIdError::TooLong { max: 50 })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<OrderId>(r#""O1""#).is_ok());
        assert!(serde_json::from_str::<OrderId>(r#""""#).is_err());
    }

    #[test]
    fn test_serialize_as_plain_string() {
        let id = OrderId::parse("O1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""O1""#);
    }
}
