//! Member cart repository.
//!
//! Rows in `member_shopping_cart` are partitioned by `site_id` and owned by
//! either a member or a visitor (see [`Identity`]). Natural-key operations
//! take a [`CartLineKey`]; its spec dimensions only constrain the query when
//! they are set.

use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use shopping_cart_core::{
    CartItemId, Identity, IdentityError, MemberId, ProductId, SiteId, SpecFilter, SpecId,
    VisitorId,
};

use super::predicate::Predicate;
use super::{MEMBER_CART_TABLE, RepositoryError, UpsertOutcome, lock_line};

const COLUMNS: &str = "id, site_id, visitor_id, member_id, product_id, suffix, quantity, \
                       main_spec_id, sub_spec_id";

/// A row of `member_shopping_cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MemberCartItem {
    /// Surrogate key.
    pub id: CartItemId,
    /// Site partition.
    pub site_id: SiteId,
    /// Visitor the line belongs to (or originated from, once moved).
    pub visitor_id: Option<VisitorId>,
    /// Owning member; 0 for visitor-owned lines.
    pub member_id: MemberId,
    /// Product in the cart.
    pub product_id: ProductId,
    /// Variant discriminator.
    pub suffix: String,
    /// Number of units.
    pub quantity: i32,
    /// Main specification dimension.
    pub main_spec_id: Option<SpecId>,
    /// Sub specification dimension.
    pub sub_spec_id: Option<SpecId>,
}

impl MemberCartItem {
    /// Resolve the row's owner from the on-disk sentinel encoding.
    ///
    /// Returns `None` for a visitor-owned row without a visitor id.
    #[must_use]
    pub fn owner(&self) -> Option<Identity> {
        Identity::from_legacy(self.member_id, self.visitor_id.clone()).ok()
    }

    /// The row's spec dimensions.
    #[must_use]
    pub const fn specs(&self) -> SpecFilter {
        SpecFilter::new(self.main_spec_id, self.sub_spec_id)
    }
}

/// A line to insert into a member cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMemberCartItem {
    /// Site partition.
    pub site_id: SiteId,
    /// Owner of the line.
    pub owner: Identity,
    /// Visitor the line originated from, recorded on member-owned lines.
    pub origin_visitor: Option<VisitorId>,
    /// Product to add.
    pub product_id: ProductId,
    /// Variant discriminator.
    pub suffix: String,
    /// Number of units.
    pub quantity: i32,
    /// Spec dimensions stored on the row.
    pub specs: SpecFilter,
}

impl NewMemberCartItem {
    /// A single unit of a product without spec dimensions.
    #[must_use]
    pub fn new(
        site_id: SiteId,
        owner: Identity,
        product_id: ProductId,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            site_id,
            owner,
            origin_visitor: None,
            product_id,
            suffix: suffix.into(),
            quantity: 1,
            specs: SpecFilter::NONE,
        }
    }

    /// Set the quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the spec dimensions.
    #[must_use]
    pub const fn with_specs(mut self, specs: SpecFilter) -> Self {
        self.specs = specs;
        self
    }

    /// Record the visitor a member-owned line came from.
    #[must_use]
    pub fn with_origin_visitor(mut self, visitor_id: VisitorId) -> Self {
        self.origin_visitor = Some(visitor_id);
        self
    }

    /// Value for the `visitor_id` column.
    fn visitor_column(&self) -> Option<&VisitorId> {
        self.owner.visitor_id().or(self.origin_visitor.as_ref())
    }

    /// The natural key of this line.
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey {
            site_id: self.site_id,
            identity: self.owner.clone(),
            product_id: self.product_id,
            suffix: self.suffix.clone(),
            specs: self.specs,
        }
    }
}

/// Natural key of a member cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineKey {
    /// Site partition.
    pub site_id: SiteId,
    /// Owner the line is looked up by.
    pub identity: Identity,
    /// Product.
    pub product_id: ProductId,
    /// Variant discriminator.
    pub suffix: String,
    /// Optional spec dimensions; unset ones match any value.
    pub specs: SpecFilter,
}

impl CartLineKey {
    /// A key without spec constraints.
    #[must_use]
    pub fn new(
        site_id: SiteId,
        identity: Identity,
        product_id: ProductId,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            site_id,
            identity,
            product_id,
            suffix: suffix.into(),
            specs: SpecFilter::NONE,
        }
    }

    /// Constrain the key by spec dimensions.
    #[must_use]
    pub const fn with_specs(mut self, specs: SpecFilter) -> Self {
        self.specs = specs;
        self
    }

    /// Site, identity, product and suffix, plus whichever specs are set.
    pub(crate) fn predicate(&self) -> Predicate {
        Predicate::new()
            .eq("site_id", self.site_id.as_i32())
            .identity(&self.identity)
            .eq("product_id", self.product_id.as_i32())
            .eq("suffix", self.suffix.as_str())
            .specs(self.specs)
    }

    /// Exact match on every key column, used by upserts.
    ///
    /// Visitor lines also require `member_id = 0` so a line already moved to
    /// a member is not picked up again by its originating visitor.
    fn exact_predicate(&self) -> Predicate {
        let predicate = Predicate::new()
            .eq("site_id", self.site_id.as_i32())
            .identity(&self.identity);
        let predicate = if self.identity.is_member() {
            predicate
        } else {
            predicate.eq("member_id", MemberId::ANONYMOUS.as_i32())
        };
        predicate
            .eq("product_id", self.product_id.as_i32())
            .eq("suffix", self.suffix.as_str())
            .exact_specs(self.specs)
    }

    /// Advisory lock key for this line.
    fn lock_key(&self) -> String {
        let owner = match &self.identity {
            Identity::Member(id) => format!("m{id}"),
            Identity::Visitor(id) => format!("v{id}"),
        };
        let spec = |s: Option<SpecId>| s.map_or_else(String::new, |id| id.to_string());
        format!(
            "{MEMBER_CART_TABLE}:{}:{owner}:{}:{}:{}:{}",
            self.site_id,
            self.product_id,
            self.suffix,
            spec(self.specs.main),
            spec(self.specs.sub),
        )
    }
}

/// How `move_cart` treats the quantities of the lines it reassigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCartQuantity {
    /// Keep each line's quantity; only ownership changes.
    Preserve,
    /// Set every moved line to the same quantity.
    Overwrite(i32),
}

/// Repository for member cart operations.
pub struct MemberCartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MemberCartRepository<'a> {
    /// Create a new member cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a cart line without checking for an existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for a member owner with id 0.
    /// Returns `RepositoryError::Conflict` if the schema rejects a duplicate key.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        item: &NewMemberCartItem,
    ) -> Result<CartItemId, RepositoryError> {
        item.owner.validate()?;
        let mut qb = insert(item);
        let id = qb
            .build_query_scalar::<CartItemId>()
            .fetch_one(self.pool)
            .await
            .map_err(RepositoryError::from_insert)?;

        debug!(%id, "Added member cart item");
        Ok(id)
    }

    /// Find lines matching a key; unset spec dimensions match any value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn find_item(
        &self,
        key: &CartLineKey,
    ) -> Result<Vec<MemberCartItem>, RepositoryError> {
        key.identity.validate()?;
        self.select(&key.predicate()).await
    }

    /// All lines of one owner on a site, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        site_id: SiteId,
        identity: &Identity,
    ) -> Result<Vec<MemberCartItem>, RepositoryError> {
        identity.validate()?;
        let predicate = Predicate::new()
            .eq("site_id", site_id.as_i32())
            .identity(identity);
        self.select(&predicate).await
    }

    /// Delete lines matching a key. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, key: &CartLineKey) -> Result<u64, RepositoryError> {
        key.identity.validate()?;
        self.delete(&key.predicate()).await
    }

    /// Delete a single row by surrogate key, ignoring site and owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn remove_item_by_id(&self, id: CartItemId) -> Result<u64, RepositoryError> {
        self.delete(&Predicate::new().eq("id", id.as_i32())).await
    }

    /// Delete every line of a member on every site.
    ///
    /// This is not scoped by site; use [`Self::clear_site_cart`] to clear a
    /// single site.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` if `member_id` is the
    /// anonymous sentinel, which would match every visitor-owned line.
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, member_id: MemberId) -> Result<u64, RepositoryError> {
        if member_id.is_anonymous() {
            return Err(IdentityError::AnonymousMember.into());
        }
        self.delete(&Predicate::new().eq("member_id", member_id.as_i32()))
            .await
    }

    /// Delete every line of one owner on one site.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn clear_site_cart(
        &self,
        site_id: SiteId,
        identity: &Identity,
    ) -> Result<u64, RepositoryError> {
        identity.validate()?;
        let predicate = Predicate::new()
            .eq("site_id", site_id.as_i32())
            .identity(identity);
        self.delete(&predicate).await
    }

    /// Overwrite the quantity of lines matching a key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        key: &CartLineKey,
        quantity: i32,
    ) -> Result<u64, RepositoryError> {
        key.identity.validate()?;
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("UPDATE {MEMBER_CART_TABLE} SET quantity = "));
        qb.push_bind(quantity);
        key.predicate().push_where(&mut qb);

        let updated = qb.build().execute(self.pool).await?.rows_affected();
        debug!(updated, "Updated member cart quantity");
        Ok(updated)
    }

    /// Reassign a visitor's lines on a site to a member, typically on login.
    ///
    /// Every row matching `(site_id, visitor_id)` gets `member_id`; quantities
    /// follow `quantity`. Returns the number of rows moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` if `member_id` is the
    /// anonymous sentinel.
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(self))]
    pub async fn move_cart(
        &self,
        site_id: SiteId,
        visitor_id: &VisitorId,
        member_id: MemberId,
        quantity: MoveCartQuantity,
    ) -> Result<u64, RepositoryError> {
        if member_id.is_anonymous() {
            return Err(IdentityError::AnonymousMember.into());
        }

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("UPDATE {MEMBER_CART_TABLE} SET member_id = "));
        qb.push_bind(member_id.as_i32());
        if let MoveCartQuantity::Overwrite(q) = quantity {
            qb.push(", quantity = ").push_bind(q);
        }
        Predicate::new()
            .eq("site_id", site_id.as_i32())
            .eq("visitor_id", visitor_id.as_str())
            .push_where(&mut qb);

        let moved = qb.build().execute(self.pool).await?.rows_affected();
        debug!(moved, "Moved visitor cart to member");
        Ok(moved)
    }

    /// Set the quantity of a line, inserting it if it does not exist.
    ///
    /// The key is matched exactly, including unset spec dimensions. Concurrent
    /// upserts of the same line are serialized, so this never creates
    /// duplicate rows for one key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidIdentity` for `Identity::Member` with id 0.
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    #[instrument(skip(self))]
    pub async fn upsert_item(
        &self,
        item: &NewMemberCartItem,
    ) -> Result<UpsertOutcome, RepositoryError> {
        item.owner.validate()?;
        let key = item.key();
        let mut tx = self.pool.begin().await?;
        lock_line(&mut *tx, &key.lock_key()).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("UPDATE {MEMBER_CART_TABLE} SET quantity = "));
        qb.push_bind(item.quantity);
        key.exact_predicate().push_where(&mut qb);
        qb.push(" RETURNING id");

        let updated: Vec<CartItemId> = qb
            .build_query_scalar::<CartItemId>()
            .fetch_all(&mut *tx)
            .await?;

        let outcome = if let Some(id) = updated.first() {
            UpsertOutcome::Updated(*id)
        } else {
            let mut insert_qb = insert(item);
            let id = insert_qb
                .build_query_scalar::<CartItemId>()
                .fetch_one(&mut *tx)
                .await
                .map_err(RepositoryError::from_insert)?;
            UpsertOutcome::Inserted(id)
        };

        tx.commit().await?;

        debug!(?outcome, "Upserted member cart item");
        Ok(outcome)
    }

    async fn select(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<MemberCartItem>, RepositoryError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM {MEMBER_CART_TABLE}"));
        predicate.push_where(&mut qb);

        let items = qb
            .build_query_as::<MemberCartItem>()
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }

    async fn delete(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {MEMBER_CART_TABLE}"));
        predicate.push_where(&mut qb);

        let removed = qb.build().execute(self.pool).await?.rows_affected();
        debug!(removed, "Removed member cart items");
        Ok(removed)
    }
}

/// `INSERT ... RETURNING id` for a new line.
fn insert(item: &NewMemberCartItem) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {MEMBER_CART_TABLE} \
         (site_id, visitor_id, member_id, product_id, suffix, quantity, main_spec_id, sub_spec_id) "
    ));
    qb.push_values(std::iter::once(item), |mut row, item| {
        row.push_bind(item.site_id.as_i32())
            .push_bind(item.visitor_column().map(|v| v.as_str().to_owned()))
            .push_bind(item.owner.member_id().as_i32())
            .push_bind(item.product_id.as_i32())
            .push_bind(item.suffix.clone())
            .push_bind(item.quantity)
            .push_bind(item.specs.main.map(|s| s.as_i32()))
            .push_bind(item.specs.sub.map(|s| s.as_i32()));
    });
    qb.push(" RETURNING id");
    qb
}
