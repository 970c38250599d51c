//! Shopping Cart Core - Shared types library.
//!
//! This crate provides the types shared by the cart store and its callers:
//! - newtype IDs for sites, members, products, specs and cart rows
//! - [`VisitorId`], the anonymous session identifier
//! - [`Identity`], the member-or-visitor owner of a cart line
//! - [`SpecFilter`], the optional main/sub specification dimensions
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O and no database access.
//! Enable the `postgres` feature to get `sqlx` encode/decode support.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
