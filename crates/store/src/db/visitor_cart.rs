//! Visitor cart repository.
//!
//! Rows in `visitor_shopping_cart` belong to a single anonymous visitor and
//! are keyed by `(visitor_id, product_id, suffix)`. The key is unique by
//! convention only: `add_item` inserts unconditionally, so callers check with
//! `find_item` first or use `upsert_item`.

use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use shopping_cart_core::{CartItemId, ProductId, VisitorId};

use super::predicate::Predicate;
use super::{RepositoryError, UpsertOutcome, VISITOR_CART_TABLE, lock_line};

const COLUMNS: &str = "id, visitor_id, product_id, quantity, suffix";

/// A row of `visitor_shopping_cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VisitorCartItem {
    /// Surrogate key.
    pub id: CartItemId,
    /// Owning visitor.
    pub visitor_id: VisitorId,
    /// Product in the cart.
    pub product_id: ProductId,
    /// Number of units.
    pub quantity: i32,
    /// Variant discriminator; empty when the product has no variants.
    pub suffix: String,
}

/// Repository for visitor cart operations.
pub struct VisitorCartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VisitorCartRepository<'a> {
    /// Create a new visitor cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a cart line without checking for an existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the schema rejects a duplicate key.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        visitor_id: &VisitorId,
        product_id: ProductId,
        quantity: i32,
        suffix: &str,
    ) -> Result<CartItemId, RepositoryError> {
        let mut qb = insert(visitor_id, product_id, quantity, suffix);
        let id = qb
            .build_query_scalar::<CartItemId>()
            .fetch_one(self.pool)
            .await
            .map_err(RepositoryError::from_insert)?;

        debug!(%id, "Added visitor cart item");
        Ok(id)
    }

    /// Find the lines matching an exact product and suffix.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn find_item(
        &self,
        visitor_id: &VisitorId,
        product_id: ProductId,
        suffix: &str,
    ) -> Result<Vec<VisitorCartItem>, RepositoryError> {
        let predicate = line_predicate(visitor_id, product_id, Some(suffix));
        self.select(&predicate).await
    }

    /// All lines in a visitor's cart, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        visitor_id: &VisitorId,
    ) -> Result<Vec<VisitorCartItem>, RepositoryError> {
        let predicate = Predicate::new().eq("visitor_id", visitor_id.as_str());
        self.select(&predicate).await
    }

    /// Delete lines for a product.
    ///
    /// With a suffix only the exact variant is removed; without one every
    /// variant of the product goes. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        visitor_id: &VisitorId,
        product_id: ProductId,
        suffix: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let predicate = line_predicate(visitor_id, product_id, suffix);
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {VISITOR_CART_TABLE}"));
        predicate.push_where(&mut qb);

        let removed = qb.build().execute(self.pool).await?.rows_affected();
        debug!(removed, "Removed visitor cart items");
        Ok(removed)
    }

    /// Delete every line in a visitor's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, visitor_id: &VisitorId) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {VISITOR_CART_TABLE}"));
        Predicate::new()
            .eq("visitor_id", visitor_id.as_str())
            .push_where(&mut qb);

        let removed = qb.build().execute(self.pool).await?.rows_affected();
        debug!(removed, "Cleared visitor cart");
        Ok(removed)
    }

    /// Overwrite the quantity of the matching line(s).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        visitor_id: &VisitorId,
        product_id: ProductId,
        suffix: &str,
        quantity: i32,
    ) -> Result<u64, RepositoryError> {
        let predicate = line_predicate(visitor_id, product_id, Some(suffix));
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {VISITOR_CART_TABLE} SET quantity = "
        ));
        qb.push_bind(quantity);
        predicate.push_where(&mut qb);

        let updated = qb.build().execute(self.pool).await?.rows_affected();
        debug!(updated, "Updated visitor cart quantity");
        Ok(updated)
    }

    /// Set the quantity of a line, inserting it if it does not exist.
    ///
    /// Concurrent upserts of the same line are serialized, so this never
    /// creates duplicate rows for one key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    #[instrument(skip(self))]
    pub async fn upsert_item(
        &self,
        visitor_id: &VisitorId,
        product_id: ProductId,
        quantity: i32,
        suffix: &str,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let line_key = format!("{VISITOR_CART_TABLE}:{visitor_id}:{product_id}:{suffix}");
        lock_line(&mut *tx, &line_key).await?;

        let predicate = line_predicate(visitor_id, product_id, Some(suffix));
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {VISITOR_CART_TABLE} SET quantity = "
        ));
        qb.push_bind(quantity);
        predicate.push_where(&mut qb);
        qb.push(" RETURNING id");

        let updated: Vec<CartItemId> = qb
            .build_query_scalar::<CartItemId>()
            .fetch_all(&mut *tx)
            .await?;

        let outcome = if let Some(id) = updated.first() {
            UpsertOutcome::Updated(*id)
        } else {
            let mut insert_qb = insert(visitor_id, product_id, quantity, suffix);
            let id = insert_qb
                .build_query_scalar::<CartItemId>()
                .fetch_one(&mut *tx)
                .await
                .map_err(RepositoryError::from_insert)?;
            UpsertOutcome::Inserted(id)
        };

        tx.commit().await?;

        debug!(?outcome, "Upserted visitor cart item");
        Ok(outcome)
    }

    async fn select(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<VisitorCartItem>, RepositoryError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM {VISITOR_CART_TABLE}"));
        predicate.push_where(&mut qb);

        let items = qb
            .build_query_as::<VisitorCartItem>()
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }
}

/// `INSERT ... RETURNING id` for a new line.
fn insert(
    visitor_id: &VisitorId,
    product_id: ProductId,
    quantity: i32,
    suffix: &str,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {VISITOR_CART_TABLE} (visitor_id, product_id, quantity, suffix) VALUES ("
    ));
    qb.separated(", ")
        .push_bind(visitor_id.as_str().to_owned())
        .push_bind(product_id.as_i32())
        .push_bind(quantity)
        .push_bind(suffix.to_owned());
    qb.push(") RETURNING id");
    qb
}

/// `visitor_id` + `product_id`, plus `suffix` when one is given.
fn line_predicate(
    visitor_id: &VisitorId,
    product_id: ProductId,
    suffix: Option<&str>,
) -> Predicate {
    Predicate::new()
        .eq("visitor_id", visitor_id.as_str())
        .eq("product_id", product_id.as_i32())
        .eq_opt("suffix", suffix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn visitor() -> VisitorId {
        VisitorId::parse("v1").unwrap()
    }

    #[test]
    fn test_line_predicate_with_suffix() {
        let predicate = line_predicate(&visitor(), ProductId::new(42), Some("red"));
        assert_eq!(predicate.columns(), vec!["visitor_id", "product_id", "suffix"]);
    }

    #[test]
    fn test_line_predicate_without_suffix_matches_all_variants() {
        let predicate = line_predicate(&visitor(), ProductId::new(42), None);
        assert_eq!(predicate.columns(), vec!["visitor_id", "product_id"]);
    }

    #[test]
    fn test_insert_sql() {
        let qb = insert(&visitor(), ProductId::new(42), 2, "red");
        assert_eq!(
            qb.sql(),
            "INSERT INTO visitor_shopping_cart (visitor_id, product_id, quantity, suffix) \
             VALUES ($1, $2, $3, $4) RETURNING id"
        );
    }

    #[test]
    fn test_item_serializes_with_column_names() {
        let item = VisitorCartItem {
            id: CartItemId::new(1),
            visitor_id: visitor(),
            product_id: ProductId::new(42),
            quantity: 2,
            suffix: "red".to_owned(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "visitor_id": "v1",
                "product_id": 42,
                "quantity": 2,
                "suffix": "red",
            })
        );
    }
}
