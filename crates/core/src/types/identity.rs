//! Cart ownership: a cart line belongs to either a member or a visitor.

use serde::{Deserialize, Serialize};

use super::{MemberId, VisitorId};

/// Errors that can occur when resolving an [`Identity`] from raw inputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// `member_id` was the anonymous sentinel and no visitor id was supplied.
    #[error("either a member id or a visitor id is required")]
    Missing,
    /// `Identity::Member` cannot carry the anonymous sentinel.
    #[error("member id 0 is reserved for anonymous visitors")]
    AnonymousMember,
}

/// Owner of a member-cart line.
///
/// On disk the owner is encoded with a sentinel: `member_id = 0` means the
/// row is scoped by `visitor_id`. Queries filter by exactly one of the two
/// columns, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// An anonymous visitor, scoped by `visitor_id`.
    Visitor(VisitorId),
    /// An authenticated member, scoped by `member_id`.
    Member(MemberId),
}

impl Identity {
    /// Create a member identity.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::AnonymousMember` for member id 0.
    pub const fn member(member_id: MemberId) -> Result<Self, IdentityError> {
        if member_id.is_anonymous() {
            return Err(IdentityError::AnonymousMember);
        }
        Ok(Self::Member(member_id))
    }

    /// Resolve the sentinel encoding used by legacy callers.
    ///
    /// A nonzero `member_id` wins and the visitor id is ignored.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Missing` if `member_id` is 0 and there is no
    /// visitor id.
    pub fn from_legacy(
        member_id: MemberId,
        visitor_id: Option<VisitorId>,
    ) -> Result<Self, IdentityError> {
        if !member_id.is_anonymous() {
            return Ok(Self::Member(member_id));
        }
        visitor_id.map(Self::Visitor).ok_or(IdentityError::Missing)
    }

    /// Check that a member identity does not carry the anonymous sentinel.
    ///
    /// `Identity::Member` can be built directly, so stores call this before
    /// turning an identity into a `member_id` filter.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::AnonymousMember` for `Member(0)`.
    pub const fn validate(&self) -> Result<(), IdentityError> {
        match self {
            Self::Member(id) if id.is_anonymous() => Err(IdentityError::AnonymousMember),
            _ => Ok(()),
        }
    }

    /// Value stored in the `member_id` column for rows owned by this identity.
    #[must_use]
    pub const fn member_id(&self) -> MemberId {
        match self {
            Self::Visitor(_) => MemberId::ANONYMOUS,
            Self::Member(id) => *id,
        }
    }

    /// The visitor id, if this is a visitor identity.
    #[must_use]
    pub const fn visitor_id(&self) -> Option<&VisitorId> {
        match self {
            Self::Visitor(id) => Some(id),
            Self::Member(_) => None,
        }
    }

    /// Whether this identity is an authenticated member.
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }
}

impl From<VisitorId> for Identity {
    fn from(id: VisitorId) -> Self {
        Self::Visitor(id)
    }
}
