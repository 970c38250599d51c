//! Database operations for the shopping cart tables.
//!
//! ## Tables
//!
//! - `visitor_shopping_cart` - Anonymous visitor carts, keyed by `visitor_id`
//! - `member_shopping_cart` - Per-site carts owned by a member or a visitor
//!
//! The schema is owned by the application; repositories only issue
//! parameterized statements against the columns listed above each query.

pub mod member_cart;
mod predicate;
pub mod visitor_cart;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopping_cart_core::IdentityError;

use crate::config::CartStoreConfig;

pub use member_cart::{
    CartLineKey, MemberCartItem, MemberCartRepository, MoveCartQuantity, NewMemberCartItem,
};
pub use visitor_cart::{VisitorCartItem, VisitorCartRepository};

pub(crate) const VISITOR_CART_TABLE: &str = "visitor_shopping_cart";
pub(crate) const MEMBER_CART_TABLE: &str = "member_shopping_cart";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx (connectivity, pool, malformed statement).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Constraint violation reported by the schema (e.g., a unique line key).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Raw inputs could not be resolved into a cart owner.
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),
}

impl RepositoryError {
    /// Map an insert failure, turning unique violations into `Conflict`.
    pub(crate) fn from_insert(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(db_err.message().to_owned());
        }
        Self::Database(e)
    }
}

/// Result of an atomic add-or-update of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No line matched the key; a new row was inserted.
    Inserted(shopping_cart_core::CartItemId),
    /// An existing line had its quantity overwritten.
    Updated(shopping_cart_core::CartItemId),
}

impl UpsertOutcome {
    /// The row that now holds the line.
    #[must_use]
    pub const fn id(&self) -> shopping_cart_core::CartItemId {
        match self {
            Self::Inserted(id) | Self::Updated(id) => *id,
        }
    }
}

/// Create a `PostgreSQL` connection pool from the cart store configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &CartStoreConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(config.database_url.expose_secret())
        .await
}

/// Serialize writers of one cart line for the rest of the transaction.
///
/// Uses a transaction-scoped advisory lock, so no unique constraint is needed
/// on the externally owned schema.
pub(crate) async fn lock_line(
    tx: &mut sqlx::PgConnection,
    line_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(line_key)
        .execute(tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_outcome_id() {
        let id = shopping_cart_core::CartItemId::new(4);
        assert_eq!(UpsertOutcome::Inserted(id).id(), id);
        assert_eq!(UpsertOutcome::Updated(id).id(), id);
    }

    #[test]
    fn test_error_display() {
        let err = RepositoryError::from(sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("database error"));

        let err = RepositoryError::from(IdentityError::Missing);
        assert_eq!(
            err.to_string(),
            "invalid identity: either a member id or a visitor id is required"
        );
    }

    #[test]
    fn test_from_insert_passes_through_non_constraint_errors() {
        let err = RepositoryError::from_insert(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::PoolTimedOut)));
    }
}
