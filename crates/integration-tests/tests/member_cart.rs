//! Member cart repository against a live database.
//!
//! Run with `CART_DATABASE_URL` set and `--include-ignored`.

use shopping_cart_core::{Identity, MemberId, ProductId, SiteId, SpecFilter, SpecId, VisitorId};
use shopping_cart_integration_tests::{test_pool, unique_member, unique_site, unique_visitor};
use shopping_cart_store::compat::LegacyMemberCart;
use shopping_cart_store::db::{
    CartLineKey, MemberCartRepository, MoveCartQuantity, NewMemberCartItem, RepositoryError,
    UpsertOutcome,
};

fn specs(main: Option<i32>, sub: Option<i32>) -> SpecFilter {
    SpecFilter::new(main.map(SpecId::new), sub.map(SpecId::new))
}

fn visitor_line(
    site: SiteId,
    visitor: &VisitorId,
    product: i32,
    suffix: &str,
) -> NewMemberCartItem {
    NewMemberCartItem::new(
        site,
        Identity::Visitor(visitor.clone()),
        ProductId::new(product),
        suffix,
    )
}

fn member_line(site: SiteId, member: MemberId, product: i32, suffix: &str) -> NewMemberCartItem {
    NewMemberCartItem::new(site, Identity::Member(member), ProductId::new(product), suffix)
}

// =============================================================================
// Spec Filters
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_find_item_filters_only_by_set_specs() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let member = unique_member();

    for (main, sub) in [(1, 5), (2, 5), (1, 6), (2, 6)] {
        let item = member_line(site, member, 42, "red").with_specs(specs(Some(main), Some(sub)));
        repo.add_item(&item).await.unwrap();
    }

    let key = CartLineKey::new(site, Identity::Member(member), ProductId::new(42), "red");

    let all = repo.find_item(&key).await.unwrap();
    assert_eq!(all.len(), 4);

    let sub_only = repo
        .find_item(&key.clone().with_specs(specs(None, Some(5))))
        .await
        .unwrap();
    assert_eq!(sub_only.len(), 2);
    assert!(sub_only.iter().all(|i| i.sub_spec_id == Some(SpecId::new(5))));

    let main_only = repo
        .find_item(&key.clone().with_specs(specs(Some(1), None)))
        .await
        .unwrap();
    assert_eq!(main_only.len(), 2);

    let both = repo
        .find_item(&key.with_specs(specs(Some(2), Some(6))))
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].specs(), specs(Some(2), Some(6)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_remove_item_respects_spec_filter() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let member = unique_member();

    for sub in [5, 6] {
        let item = member_line(site, member, 42, "").with_specs(specs(None, Some(sub)));
        repo.add_item(&item).await.unwrap();
    }

    let key = CartLineKey::new(site, Identity::Member(member), ProductId::new(42), "")
        .with_specs(specs(None, Some(6)));
    assert_eq!(repo.remove_item(&key).await.unwrap(), 1);

    let left = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].sub_spec_id, Some(SpecId::new(5)));
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_member_listing_ignores_visitor_rows() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let member = unique_member();

    repo.add_item(&visitor_line(site, &visitor, 1, ""))
        .await
        .unwrap();
    let member_row = repo
        .add_item(&member_line(site, member, 2, "").with_origin_visitor(visitor.clone()))
        .await
        .unwrap();

    let owned = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, member_row);
    assert_eq!(owned[0].member_id, member);
    assert_eq!(owned[0].visitor_id.as_ref(), Some(&visitor));
    assert_eq!(owned[0].owner(), Some(Identity::Member(member)));

    // A visitor listing filters by visitor id only.
    let by_visitor = repo
        .list_items(site, &Identity::Visitor(visitor.clone()))
        .await
        .unwrap();
    assert_eq!(by_visitor.len(), 2);

    let stranger = repo
        .list_items(site, &Identity::Visitor(unique_visitor()))
        .await
        .unwrap();
    assert!(stranger.is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_listing_is_scoped_by_site() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let member = unique_member();
    let site = unique_site();
    let other_site = SiteId::new(site.as_i32().wrapping_add(1).max(1));

    repo.add_item(&member_line(site, member, 1, "")).await.unwrap();
    repo.add_item(&member_line(other_site, member, 1, ""))
        .await
        .unwrap();

    let items = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].site_id, site);
}

// =============================================================================
// Move Cart
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_move_cart_overwrite_reassigns_visitor_lines() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let member = unique_member();

    repo.add_item(&visitor_line(site, &visitor, 42, "red").with_quantity(2))
        .await
        .unwrap();

    let moved = repo
        .move_cart(site, &visitor, member, MoveCartQuantity::Overwrite(2))
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let items = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.member_id, member);
    assert_eq!(item.visitor_id.as_ref(), Some(&visitor));
    assert_eq!(item.product_id, ProductId::new(42));
    assert_eq!(item.suffix, "red");
    assert_eq!(item.quantity, 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_move_cart_overwrite_sets_every_line() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let member = unique_member();

    repo.add_item(&visitor_line(site, &visitor, 1, "").with_quantity(3))
        .await
        .unwrap();
    repo.add_item(&visitor_line(site, &visitor, 2, "").with_quantity(5))
        .await
        .unwrap();

    let moved = repo
        .move_cart(site, &visitor, member, MoveCartQuantity::Overwrite(1))
        .await
        .unwrap();
    assert_eq!(moved, 2);

    let items = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.quantity == 1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_move_cart_preserve_keeps_quantities() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let member = unique_member();

    repo.add_item(&visitor_line(site, &visitor, 1, "").with_quantity(3))
        .await
        .unwrap();
    repo.add_item(&visitor_line(site, &visitor, 2, "").with_quantity(5))
        .await
        .unwrap();

    repo.move_cart(site, &visitor, member, MoveCartQuantity::Preserve)
        .await
        .unwrap();

    let mut quantities: Vec<i32> = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap()
        .iter()
        .map(|i| i.quantity)
        .collect();
    quantities.sort_unstable();
    assert_eq!(quantities, vec![3, 5]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_move_cart_only_touches_the_given_site() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let other_site = SiteId::new(site.as_i32().wrapping_add(1).max(1));
    let visitor = unique_visitor();
    let member = unique_member();

    repo.add_item(&visitor_line(site, &visitor, 1, ""))
        .await
        .unwrap();
    repo.add_item(&visitor_line(other_site, &visitor, 1, ""))
        .await
        .unwrap();

    let moved = repo
        .move_cart(site, &visitor, member, MoveCartQuantity::Preserve)
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let untouched = repo
        .list_items(other_site, &Identity::Visitor(visitor))
        .await
        .unwrap();
    assert_eq!(untouched[0].member_id, MemberId::ANONYMOUS);
}

// =============================================================================
// Removal and Updates
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_remove_item_by_id() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let member = unique_member();

    let keep = repo.add_item(&member_line(site, member, 1, "")).await.unwrap();
    let removed = repo.add_item(&member_line(site, member, 2, "")).await.unwrap();

    assert_eq!(repo.remove_item_by_id(removed).await.unwrap(), 1);
    assert_eq!(repo.remove_item_by_id(removed).await.unwrap(), 0);

    let items = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, keep);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_clear_cart_spans_sites_but_clear_site_cart_does_not() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let member = unique_member();
    let site = unique_site();
    let other_site = SiteId::new(site.as_i32().wrapping_add(1).max(1));
    let identity = Identity::Member(member);

    repo.add_item(&member_line(site, member, 1, "")).await.unwrap();
    repo.add_item(&member_line(other_site, member, 1, ""))
        .await
        .unwrap();

    assert_eq!(repo.clear_site_cart(site, &identity).await.unwrap(), 1);
    assert!(repo.list_items(site, &identity).await.unwrap().is_empty());
    assert_eq!(repo.list_items(other_site, &identity).await.unwrap().len(), 1);

    repo.add_item(&member_line(site, member, 1, "")).await.unwrap();
    assert_eq!(repo.clear_cart(member).await.unwrap(), 2);
    assert!(repo.list_items(site, &identity).await.unwrap().is_empty());
    assert!(repo.list_items(other_site, &identity).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_anonymous_member_never_matches_visitor_lines() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let anonymous = Identity::Member(MemberId::ANONYMOUS);

    repo.add_item(&visitor_line(site, &visitor, 42, "red"))
        .await
        .unwrap();

    assert!(matches!(
        repo.clear_cart(MemberId::ANONYMOUS).await,
        Err(RepositoryError::InvalidIdentity(_))
    ));
    assert!(matches!(
        repo.clear_site_cart(site, &anonymous).await,
        Err(RepositoryError::InvalidIdentity(_))
    ));
    assert!(matches!(
        repo.list_items(site, &anonymous).await,
        Err(RepositoryError::InvalidIdentity(_))
    ));

    let left = repo
        .list_items(site, &Identity::Visitor(visitor))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_update_quantity_preserves_other_columns() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();

    let item = visitor_line(site, &visitor, 42, "red").with_specs(specs(Some(1), Some(5)));
    let id = repo.add_item(&item).await.unwrap();

    let updated = repo.update_quantity(&item.key(), 9).await.unwrap();
    assert_eq!(updated, 1);

    let rows = repo.find_item(&item.key()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.id, id);
    assert_eq!(row.quantity, 9);
    assert_eq!(row.site_id, site);
    assert_eq!(row.visitor_id.as_ref(), Some(&visitor));
    assert_eq!(row.member_id, MemberId::ANONYMOUS);
    assert_eq!(row.suffix, "red");
    assert_eq!(row.specs(), specs(Some(1), Some(5)));
}

// =============================================================================
// Upsert
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_upsert_matches_specs_exactly() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let member = unique_member();

    let with_spec = member_line(site, member, 42, "")
        .with_specs(specs(None, Some(5)))
        .with_quantity(2);
    let without_spec = member_line(site, member, 42, "").with_quantity(3);

    let first = repo.upsert_item(&with_spec).await.unwrap();
    assert!(matches!(first, UpsertOutcome::Inserted(_)));

    // No spec is its own line, not a wildcard over the one above.
    let second = repo.upsert_item(&without_spec).await.unwrap();
    assert!(matches!(second, UpsertOutcome::Inserted(_)));
    assert_ne!(first.id(), second.id());

    let third = repo
        .upsert_item(&with_spec.clone().with_quantity(4))
        .await
        .unwrap();
    assert_eq!(third, UpsertOutcome::Updated(first.id()));

    let items = repo
        .list_items(site, &Identity::Member(member))
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    let updated = items.iter().find(|i| i.id == first.id()).unwrap();
    assert_eq!(updated.quantity, 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_visitor_upsert_skips_moved_lines() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let visitor = unique_visitor();
    let member = unique_member();

    let line = visitor_line(site, &visitor, 42, "red");
    let moved_id = repo.upsert_item(&line).await.unwrap().id();
    repo.move_cart(site, &visitor, member, MoveCartQuantity::Preserve)
        .await
        .unwrap();

    let outcome = repo.upsert_item(&line.with_quantity(2)).await.unwrap();
    assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
    assert_ne!(outcome.id(), moved_id);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_concurrent_upserts_create_one_line() {
    let pool = test_pool().await;
    let repo = MemberCartRepository::new(&pool);
    let site = unique_site();
    let member = unique_member();
    let line = member_line(site, member, 42, "red").with_specs(specs(Some(1), None));
    let larger = line.clone().with_quantity(3);

    let (a, b) = tokio::join!(repo.upsert_item(&line), repo.upsert_item(&larger));
    assert_eq!(a.unwrap().id(), b.unwrap().id());

    let items = repo.find_item(&line.key()).await.unwrap();
    assert_eq!(items.len(), 1);
}

// =============================================================================
// Legacy Adapter
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (set CART_DATABASE_URL)"]
async fn test_legacy_member_cart_login_flow() {
    let pool = test_pool().await;
    let cart = LegacyMemberCart::new(&pool);
    let site = unique_site().as_i32();
    let member = unique_member().as_i32();
    let visitor = unique_visitor();
    let v = visitor.as_str();

    // Anonymous shopping; a zero spec means "no spec".
    assert!(
        cart.add_product_to_cart(site, Some(v), 0, 42, "red", 2, Some(0), Some(5))
            .await
    );
    let found = cart
        .check_product_in_cart(site, Some(v), 0, 42, "red", None, Some(5))
        .await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("main_spec_id"), Some(&serde_json::Value::Null));
    assert_eq!(found[0].get("member_id"), Some(&serde_json::json!(0)));

    // Login.
    assert!(cart.move_cart(site, v, member, 2).await);
    assert_eq!(cart.get_products_in_cart(site, None, member).await.len(), 1);

    assert!(
        cart.update_product_quantity(site, None, member, 42, "red", 4, None, None)
            .await
    );
    let rows = cart.get_products_in_cart(site, None, member).await;
    assert_eq!(rows[0].get("quantity"), Some(&serde_json::json!(4)));

    let id = rows[0]
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
        .unwrap();
    assert!(cart.remove_product_by_id(id).await);
    assert!(cart.get_products_in_cart(site, None, member).await.is_empty());

    assert!(
        cart.add_product_to_cart(site, Some(v), member, 7, "", 1, None, None)
            .await
    );
    assert!(cart.clear_cart(member).await);
    assert!(cart.get_products_in_cart(site, None, member).await.is_empty());
}
