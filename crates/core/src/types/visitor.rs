//! Anonymous visitor identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`VisitorId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VisitorIdError {
    /// The input string is empty or only whitespace.
    #[error("visitor id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("visitor id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// An anonymous session identifier.
///
/// Visitors are identified by an opaque string issued by the session layer
/// (a cookie value, a session UUID). The cart store never interprets it.
///
/// ## Constraints
///
/// - Length: 1-128 characters
/// - Must not be blank
///
/// ## Examples
///
/// ```
/// use shopping_cart_core::VisitorId;
///
/// assert!(VisitorId::parse("v1").is_ok());
/// assert!(VisitorId::parse("6f1c0c8e-5d1a-4f43-8e0b-6c8d7d3a9b21").is_ok());
///
/// assert!(VisitorId::parse("").is_err());
/// assert!(VisitorId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    /// Maximum length of a visitor identifier.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `VisitorId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than 128 characters.
    pub fn parse(s: &str) -> Result<Self, VisitorIdError> {
        if s.trim().is_empty() {
            return Err(VisitorIdError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(VisitorIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the visitor id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `VisitorId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VisitorId {
    type Err = VisitorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for VisitorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for VisitorId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for VisitorId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for VisitorId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
