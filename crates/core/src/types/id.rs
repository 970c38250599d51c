//! Integer keys of the cart tables.
//!
//! Every key column is an `INTEGER`; wrapping each one in its own type stops a
//! product id from being bound where a site id belongs.

/// Declare an `i32` key type.
///
/// The generated type is `Copy`, serializes as a bare number, converts back
/// with `as_i32()` / `i32::from`, and with the `postgres` feature binds and
/// decodes as `INTEGER`.
///
/// `define_id!(Name)` also implements `From<i32>`. `define_id!(@no_from Name)`
/// leaves it out for keys with reserved values, so construction stays explicit
/// through `Name::new`.
///
/// ```rust
/// # use shopping_cart_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(ShelfId);
///
/// let warehouse = WarehouseId::from(3);
/// assert_eq!(warehouse.as_i32(), 3);
/// // `ShelfId` and `WarehouseId` do not unify:
/// // let _: WarehouseId = ShelfId::new(3);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        $crate::define_id!(@no_from $name);

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }
    };
    (@no_from $name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw key.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw key.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::core::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value).map(Self)
            }
        }
    };
}

// Surrogate key of a cart row in either table.
define_id!(CartItemId);
define_id!(SiteId);
define_id!(ProductId);
define_id!(SpecId);
// 0 is reserved for visitor-owned rows; no `From<i32>`.
define_id!(@no_from MemberId);

impl MemberId {
    /// The on-disk value stored in `member_id` for rows without a member.
    pub const ANONYMOUS: Self = Self(0);

    /// Whether this is the "no member" sentinel.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.0 == 0
    }
}
