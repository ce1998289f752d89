// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier newtypes shared by every graph element.
//!
//! All ids wrap a [`Uuid`]. The nil uuid is the "null" id: it never names a
//! live element and an endpoint holding one can never be connected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The null id
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Build an id from a fixed value
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Whether this id can name a live element
            pub fn is_valid(&self) -> bool {
                !self.0.is_nil()
            }

            /// The underlying uuid
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a node
    NodeId
);
id_type!(
    /// Unique identifier for a slot, scoped to its owning node
    SlotId
);
id_type!(
    /// Unique identifier for a connection
    ConnectionId
);
id_type!(
    /// Unique identifier for a graph variable
    VariableId
);
id_type!(
    /// Identifier of an entity that lives outside the graph (the graph owner,
    /// world entities referenced by slot values)
    EntityId
);
id_type!(
    /// Identifier of a live graph instance
    GraphId
);
id_type!(
    /// Identifier of an external asset a node depends on
    AssetId
);

impl EntityId {
    /// Placeholder stored in assets for "the entity that owns this graph".
    /// Replaced by the owner's id during activation.
    pub const GRAPH_OWNER: EntityId = EntityId::from_u128(0xacedc0de);

    /// Placeholder stored in assets for "this graph's unique id".
    /// Replaced by the live [`GraphId`] during activation.
    pub const GRAPH_UNIQUE: EntityId = EntityId::from_u128(0xfee1baad);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_is_invalid() {
        assert!(!NodeId::nil().is_valid());
        assert!(NodeId::new().is_valid());
        assert_ne!(SlotId::new(), SlotId::new());
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(EntityId::GRAPH_OWNER, EntityId::GRAPH_UNIQUE);
        assert!(EntityId::GRAPH_OWNER.is_valid());
    }
}
