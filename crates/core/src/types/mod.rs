//! Core types for the shopping cart.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod identity;
pub mod spec;
pub mod visitor;

pub use id::*;
pub use identity::{Identity, IdentityError};
pub use spec::SpecFilter;
pub use visitor::{VisitorId, VisitorIdError};
