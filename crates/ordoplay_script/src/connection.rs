// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::data::Outcome;
use crate::endpoint::Endpoint;
use crate::graph::Graph;
use crate::ids::{ConnectionId, NodeId};
use crate::node::{EntityState, Node};
use crate::slot::Slot;
use serde::{Deserialize, Serialize};

/// A directed edge between two endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    id: ConnectionId,
    /// Source endpoint
    source: Endpoint,
    /// Target endpoint
    target: Endpoint,
    /// Diagnostic name
    #[serde(default)]
    name: String,
    #[serde(skip)]
    state: EntityState,
}

impl Connection {
    /// Create a new connection
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            target,
            name: String::new(),
            state: EntityState::Constructed,
        }
    }

    /// Use a specific id
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Source endpoint
    pub fn source_endpoint(&self) -> Endpoint {
        self.source
    }

    /// Target endpoint
    pub fn target_endpoint(&self) -> Endpoint {
        self.target
    }

    /// Source node
    pub fn source_node(&self) -> NodeId {
        self.source.node_id
    }

    /// Target node
    pub fn target_node(&self) -> NodeId {
        self.target.node_id
    }

    pub(crate) fn endpoints_mut(&mut self) -> (&mut Endpoint, &mut Endpoint) {
        (&mut self.source, &mut self.target)
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the diagnostic name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Lifecycle state
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node_id == node_id || self.target.node_id == node_id
    }

    /// Check if this connection touches a specific endpoint
    pub fn involves_endpoint(&self, endpoint: &Endpoint) -> bool {
        self.source == *endpoint || self.target == *endpoint
    }

    /// Whether this connection joins `a` and `b`, in either orientation
    pub fn connects(&self, a: &Endpoint, b: &Endpoint) -> bool {
        (self.source == *a && self.target == *b) || (self.source == *b && self.target == *a)
    }

    /// Run both slots' contracts against each other, then the type match for
    /// data connections
    pub fn validate_connection(
        source_node: &Node,
        source_slot: &Slot,
        target_node: &Node,
        target_slot: &Slot,
        graph: &Graph,
    ) -> Outcome {
        for contract in source_slot.contracts() {
            contract.evaluate(source_slot, target_slot, graph)?;
        }
        for contract in target_slot.contracts() {
            contract.evaluate(target_slot, source_slot, graph)?;
        }

        if source_slot.is_data() && target_slot.is_data() {
            source_slot.is_type_match_for_slot(source_node, target_slot, target_node)?;
        }
        Ok(())
    }

    pub(crate) fn init(&mut self) {
        if self.state == EntityState::Constructed {
            self.state = EntityState::Initialized;
        }
    }

    pub(crate) fn activate(&mut self) {
        if self.state == EntityState::Initialized {
            self.state = EntityState::Active;
        }
    }

    pub(crate) fn deactivate(&mut self) {
        if self.state == EntityState::Active {
            self.state = EntityState::Initialized;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SlotId;

    #[test]
    fn test_connects_either_orientation() {
        let a = Endpoint::new(NodeId::new(), SlotId::new());
        let b = Endpoint::new(NodeId::new(), SlotId::new());
        let connection = Connection::new(a, b);

        assert!(connection.connects(&a, &b));
        assert!(connection.connects(&b, &a));
        assert!(connection.involves_node(a.node_id));
        assert!(connection.involves_endpoint(&b));
        assert!(!connection.involves_node(NodeId::new()));
    }

    #[test]
    fn test_ron_round_trip_keeps_endpoints() {
        let connection = Connection::new(
            Endpoint::new(NodeId::new(), SlotId::new()),
            Endpoint::new(NodeId::new(), SlotId::new()),
        );
        let text = ron::to_string(&connection).unwrap();
        let loaded: Connection = ron::from_str(&text).unwrap();
        assert_eq!(loaded.id(), connection.id());
        assert_eq!(loaded.source_endpoint(), connection.source_endpoint());
        assert_eq!(loaded.state(), EntityState::Constructed);
    }
}
