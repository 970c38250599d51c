//! Optional specification dimensions of a cart line.

use serde::{Deserialize, Serialize};

use super::SpecId;

/// Main/sub specification dimensions (e.g. color and size).
///
/// Used both as the spec columns of a new line and as a filter: a `None`
/// dimension places no constraint on the matching column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecFilter {
    /// Main specification, stored in `main_spec_id`.
    pub main: Option<SpecId>,
    /// Sub specification, stored in `sub_spec_id`.
    pub sub: Option<SpecId>,
}

impl SpecFilter {
    /// No spec dimensions.
    pub const NONE: Self = Self {
        main: None,
        sub: None,
    };

    /// Create a filter from both dimensions.
    #[must_use]
    pub const fn new(main: Option<SpecId>, sub: Option<SpecId>) -> Self {
        Self { main, sub }
    }

    /// Normalize raw legacy values, where `0` was treated like an absent spec.
    #[must_use]
    pub fn from_legacy(main: Option<i32>, sub: Option<i32>) -> Self {
        let keep = |v: Option<i32>| v.filter(|id| *id != 0).map(SpecId::new);
        Self {
            main: keep(main),
            sub: keep(sub),
        }
    }

    /// Whether neither dimension is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.main.is_none() && self.sub.is_none()
    }
}
