//! Boolean-result cart API for existing callers.
//!
//! These adapters keep the older calling convention: raw integer IDs, a
//! `member_id` of 0 for "no member", and results that never carry an error.
//! Every failure is logged and reported as `false` (writes) or an empty list
//! (reads), so a caller cannot tell an empty cart from an unreachable
//! database. New code should use the repositories in [`crate::db`] instead.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, warn};

use shopping_cart_core::{
    CartItemId, Identity, MemberId, ProductId, SiteId, SpecFilter, VisitorId,
};

use crate::db::{
    CartLineKey, MemberCartRepository, MoveCartQuantity, NewMemberCartItem, RepositoryError,
    VisitorCartRepository,
};

/// One row as a column name -> value map.
pub type CartRecord = serde_json::Map<String, serde_json::Value>;

/// Visitor cart with the legacy boolean surface.
pub struct LegacyVisitorCart<'a> {
    repo: VisitorCartRepository<'a>,
}

impl<'a> LegacyVisitorCart<'a> {
    /// Create a new adapter over the pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            repo: VisitorCartRepository::new(pool),
        }
    }

    /// Insert a line. Returns `false` on any failure.
    pub async fn add_product_to_cart(
        &self,
        visitor_id: &str,
        product_id: i32,
        quantity: i32,
        suffix: &str,
    ) -> bool {
        const OP: &str = "visitor.add_product_to_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return false;
        };
        succeeded(
            OP,
            self.repo
                .add_item(&visitor, ProductId::new(product_id), quantity, suffix)
                .await,
        )
    }

    /// All lines for the visitor; empty on any failure.
    pub async fn get_products_in_cart(&self, visitor_id: &str) -> Vec<CartRecord> {
        const OP: &str = "visitor.get_products_in_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return Vec::new();
        };
        records(OP, self.repo.list_items(&visitor).await)
    }

    /// Lines matching product and suffix; empty on any failure.
    pub async fn check_product_in_cart(
        &self,
        visitor_id: &str,
        product_id: i32,
        suffix: &str,
    ) -> Vec<CartRecord> {
        const OP: &str = "visitor.check_product_in_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return Vec::new();
        };
        records(
            OP,
            self.repo
                .find_item(&visitor, ProductId::new(product_id), suffix)
                .await,
        )
    }

    /// Delete a product's lines; without a suffix every variant is removed.
    pub async fn remove_product_from_cart(
        &self,
        visitor_id: &str,
        product_id: i32,
        suffix: Option<&str>,
    ) -> bool {
        const OP: &str = "visitor.remove_product_from_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return false;
        };
        succeeded(
            OP,
            self.repo
                .remove_item(&visitor, ProductId::new(product_id), suffix)
                .await,
        )
    }

    /// Delete every line for the visitor.
    pub async fn clear_cart(&self, visitor_id: &str) -> bool {
        const OP: &str = "visitor.clear_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return false;
        };
        succeeded(OP, self.repo.clear_cart(&visitor).await)
    }

    /// Overwrite the quantity of the matching line(s).
    pub async fn update_product_quantity(
        &self,
        visitor_id: &str,
        product_id: i32,
        suffix: &str,
        quantity: i32,
    ) -> bool {
        const OP: &str = "visitor.update_product_quantity";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return false;
        };
        succeeded(
            OP,
            self.repo
                .update_quantity(&visitor, ProductId::new(product_id), suffix, quantity)
                .await,
        )
    }
}

/// Member cart with the legacy boolean surface.
pub struct LegacyMemberCart<'a> {
    repo: MemberCartRepository<'a>,
}

impl<'a> LegacyMemberCart<'a> {
    /// Create a new adapter over the pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            repo: MemberCartRepository::new(pool),
        }
    }

    /// Insert a line. Returns `false` on any failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_product_to_cart(
        &self,
        site_id: i32,
        visitor_id: Option<&str>,
        member_id: i32,
        product_id: i32,
        suffix: &str,
        quantity: i32,
        main_spec: Option<i32>,
        sub_spec: Option<i32>,
    ) -> bool {
        const OP: &str = "member.add_product_to_cart";
        let identity = match legacy_identity(member_id, visitor_id) {
            Ok(identity) => identity,
            Err(e) => return succeeded::<()>(OP, Err(e)),
        };
        let mut item = NewMemberCartItem::new(
            SiteId::new(site_id),
            identity,
            ProductId::new(product_id),
            suffix,
        )
        .with_quantity(quantity)
        .with_specs(SpecFilter::from_legacy(main_spec, sub_spec));
        if let Some(visitor) = origin_visitor(OP, &item.owner, visitor_id) {
            item = item.with_origin_visitor(visitor);
        }
        succeeded(OP, self.repo.add_item(&item).await)
    }

    /// Lines matching the key; empty on any failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn check_product_in_cart(
        &self,
        site_id: i32,
        visitor_id: Option<&str>,
        member_id: i32,
        product_id: i32,
        suffix: &str,
        main_spec: Option<i32>,
        sub_spec: Option<i32>,
    ) -> Vec<CartRecord> {
        const OP: &str = "member.check_product_in_cart";
        let key = legacy_key(
            site_id, visitor_id, member_id, product_id, suffix, main_spec, sub_spec,
        );
        match key {
            Ok(key) => records(OP, self.repo.find_item(&key).await),
            Err(e) => records::<()>(OP, Err(e)),
        }
    }

    /// All lines of the member (or visitor when `member_id` is 0) on a site.
    pub async fn get_products_in_cart(
        &self,
        site_id: i32,
        visitor_id: Option<&str>,
        member_id: i32,
    ) -> Vec<CartRecord> {
        const OP: &str = "member.get_products_in_cart";
        match legacy_identity(member_id, visitor_id) {
            Ok(identity) => records(
                OP,
                self.repo.list_items(SiteId::new(site_id), &identity).await,
            ),
            Err(e) => records::<()>(OP, Err(e)),
        }
    }

    /// Delete lines matching the key.
    #[allow(clippy::too_many_arguments)]
    pub async fn remove_product_from_cart(
        &self,
        site_id: i32,
        visitor_id: Option<&str>,
        member_id: i32,
        product_id: i32,
        suffix: &str,
        main_spec: Option<i32>,
        sub_spec: Option<i32>,
    ) -> bool {
        const OP: &str = "member.remove_product_from_cart";
        let key = legacy_key(
            site_id, visitor_id, member_id, product_id, suffix, main_spec, sub_spec,
        );
        match key {
            Ok(key) => succeeded(OP, self.repo.remove_item(&key).await),
            Err(e) => succeeded::<()>(OP, Err(e)),
        }
    }

    /// Delete a row by its surrogate key.
    pub async fn remove_product_by_id(&self, id: i32) -> bool {
        succeeded(
            "member.remove_product_by_id",
            self.repo.remove_item_by_id(CartItemId::new(id)).await,
        )
    }

    /// Delete every line of a member, on every site.
    ///
    /// A `member_id` of 0 is refused and reported as `false`; as a filter it
    /// would match every visitor-owned line in the table.
    pub async fn clear_cart(&self, member_id: i32) -> bool {
        succeeded(
            "member.clear_cart",
            self.repo.clear_cart(MemberId::new(member_id)).await,
        )
    }

    /// Overwrite the quantity of lines matching the key.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_product_quantity(
        &self,
        site_id: i32,
        visitor_id: Option<&str>,
        member_id: i32,
        product_id: i32,
        suffix: &str,
        quantity: i32,
        main_spec: Option<i32>,
        sub_spec: Option<i32>,
    ) -> bool {
        const OP: &str = "member.update_product_quantity";
        let key = legacy_key(
            site_id, visitor_id, member_id, product_id, suffix, main_spec, sub_spec,
        );
        match key {
            Ok(key) => succeeded(OP, self.repo.update_quantity(&key, quantity).await),
            Err(e) => succeeded::<()>(OP, Err(e)),
        }
    }

    /// Reassign a visitor's lines to a member, setting every line to `quantity`.
    pub async fn move_cart(
        &self,
        site_id: i32,
        visitor_id: &str,
        member_id: i32,
        quantity: i32,
    ) -> bool {
        const OP: &str = "member.move_cart";
        let Some(visitor) = parse_visitor(OP, visitor_id) else {
            return false;
        };
        succeeded(
            OP,
            self.repo
                .move_cart(
                    SiteId::new(site_id),
                    &visitor,
                    MemberId::new(member_id),
                    MoveCartQuantity::Overwrite(quantity),
                )
                .await,
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolve the `member_id == 0` sentinel into an owner.
fn legacy_identity(
    member_id: i32,
    visitor_id: Option<&str>,
) -> Result<Identity, RepositoryError> {
    let visitor = visitor_id.and_then(|v| VisitorId::parse(v).ok());
    Ok(Identity::from_legacy(MemberId::new(member_id), visitor)?)
}

fn legacy_key(
    site_id: i32,
    visitor_id: Option<&str>,
    member_id: i32,
    product_id: i32,
    suffix: &str,
    main_spec: Option<i32>,
    sub_spec: Option<i32>,
) -> Result<CartLineKey, RepositoryError> {
    let identity = legacy_identity(member_id, visitor_id)?;
    Ok(CartLineKey::new(
        SiteId::new(site_id),
        identity,
        ProductId::new(product_id),
        suffix,
    )
    .with_specs(SpecFilter::from_legacy(main_spec, sub_spec)))
}

/// Visitor recorded on a member-owned line; invalid ids are logged and dropped.
fn origin_visitor(
    operation: &'static str,
    owner: &Identity,
    visitor_id: Option<&str>,
) -> Option<VisitorId> {
    if !owner.is_member() {
        return None;
    }
    visitor_id.and_then(|v| parse_visitor(operation, v))
}

fn parse_visitor(operation: &'static str, raw: &str) -> Option<VisitorId> {
    match VisitorId::parse(raw) {
        Ok(visitor) => Some(visitor),
        Err(e) => {
            warn!(operation, error = %e, "Rejected cart call with invalid visitor id");
            None
        }
    }
}

/// Collapse a write result into a success flag, logging the failure.
fn succeeded<T>(operation: &'static str, result: Result<T, RepositoryError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            error!(operation, error = %e, "Cart operation failed");
            false
        }
    }
}

/// Collapse a read result into row records, logging the failure.
fn records<T: Serialize>(
    operation: &'static str,
    result: Result<Vec<T>, RepositoryError>,
) -> Vec<CartRecord> {
    match result {
        Ok(items) => items.iter().filter_map(to_record).collect(),
        Err(e) => {
            error!(operation, error = %e, "Cart query failed");
            Vec::new()
        }
    }
}

fn to_record<T: Serialize>(item: &T) -> Option<CartRecord> {
    match serde_json::to_value(item) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            error!(error = %e, "Failed to convert cart row to record");
            None
        }
    }
}
