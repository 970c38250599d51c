//! Shopping cart store.
//!
//! `PostgreSQL` data access for two cart tables:
//! - [`db::VisitorCartRepository`] - anonymous visitor carts
//! - [`db::MemberCartRepository`] - per-site carts owned by a member or a
//!   visitor, including the visitor-to-member move on login
//!
//! Repositories borrow a caller-managed `PgPool` and issue one parameterized
//! statement per call (the upserts use one short transaction). Errors come
//! back as [`db::RepositoryError`]; [`compat`] offers the boolean-only API for
//! callers that expect it.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopping_cart_core::{ProductId, VisitorId};
//! use shopping_cart_store::config::CartStoreConfig;
//! use shopping_cart_store::db::{VisitorCartRepository, create_pool};
//!
//! let pool = create_pool(&CartStoreConfig::from_env()?).await?;
//! let carts = VisitorCartRepository::new(&pool);
//!
//! let visitor = VisitorId::parse("6f1c0c8e")?;
//! carts.add_item(&visitor, ProductId::new(42), 1, "red").await?;
//! let items = carts.list_items(&visitor).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod compat;
pub mod config;
pub mod db;
