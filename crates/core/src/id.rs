// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference-counted-handle identifiers.
//!
//! Every distinct kind of handle in the workspace (an `Operation`, a SQL
//! `Connection`, an `Observable` registration) gets a small newtype wrapping
//! a random v4 UUID, generated with [`define_id!`].

/// Define a newtype ID wrapper around a random v4 UUID with a type prefix
/// used only for its `Display` rendering (`"{prefix}{uuid}"`).
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct OperationId("op-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random ID.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing UUID (for deserialization/round-tripping).
            pub fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self::from_uuid(id)
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
