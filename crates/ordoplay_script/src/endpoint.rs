// SPDX-License-Identifier: MIT OR Apache-2.0
//! Endpoints: the (node, slot) pairs connections attach to.

use crate::ids::{NodeId, SlotId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning node
    pub node_id: NodeId,
    /// Slot on that node
    pub slot_id: SlotId,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node_id: NodeId, slot_id: SlotId) -> Self {
        Self { node_id, slot_id }
    }

    /// An endpoint with a null id can never take part in a connection
    pub fn is_valid(&self) -> bool {
        self.node_id.is_valid() && self.slot_id.is_valid()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node_id, self.slot_id)
    }
}

impl From<(NodeId, SlotId)> for Endpoint {
    fn from((node_id, slot_id): (NodeId, SlotId)) -> Self {
        Self::new(node_id, slot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_validity_requires_both_ids() {
        assert!(Endpoint::new(NodeId::new(), SlotId::new()).is_valid());
        assert!(!Endpoint::new(NodeId::nil(), SlotId::new()).is_valid());
        assert!(!Endpoint::new(NodeId::new(), SlotId::nil()).is_valid());
    }

    #[test]
    fn test_value_equality() {
        let node = NodeId::new();
        let slot = SlotId::new();
        let mut set = HashSet::new();
        set.insert(Endpoint::new(node, slot));
        assert!(set.contains(&Endpoint::from((node, slot))));
    }
}
