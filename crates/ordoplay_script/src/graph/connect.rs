// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connect, disconnect, reachability and connection refresh.

use super::{ConnectionError, Graph};
use crate::connection::Connection;
use crate::data::Outcome;
use crate::endpoint::Endpoint;
use crate::ids::{ConnectionId, NodeId, SlotId};
use crate::node::Node;
use crate::slot::SlotDescriptor;
use std::collections::{HashSet, VecDeque};

/// Outcome of [`Graph::refresh_connection_validity`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Connections removed, in removal order
    pub removed: Vec<ConnectionId>,
    /// Sweeps that removed at least one connection
    pub passes: usize,
}

impl Graph {
    /// Check that a connection between `source` and `target` would be legal,
    /// ignoring whether it already exists
    pub fn can_connection_exist_between(&self, source: &Endpoint, target: &Endpoint) -> Result<(), ConnectionError> {
        for endpoint in [source, target] {
            if !endpoint.is_valid() {
                return Err(ConnectionError::InvalidEndpoint(*endpoint));
            }
        }
        let source_node = self
            .nodes
            .get(&source.node_id)
            .ok_or(ConnectionError::NodeNotFound(source.node_id))?;
        let target_node = self
            .nodes
            .get(&target.node_id)
            .ok_or(ConnectionError::NodeNotFound(target.node_id))?;
        let source_slot = source_node
            .slot(source.slot_id)
            .ok_or(ConnectionError::SlotNotFound(*source))?;
        let target_slot = target_node
            .slot(target.slot_id)
            .ok_or(ConnectionError::SlotNotFound(*target))?;

        Connection::validate_connection(source_node, source_slot, target_node, target_slot, self)
            .map_err(ConnectionError::Rejected)
    }

    /// Check that a new connection between `source` and `target` may be created
    pub fn can_create_connection_between(&self, source: &Endpoint, target: &Endpoint) -> Result<(), ConnectionError> {
        if self.find_connection_between(source, target).is_some() {
            return Err(ConnectionError::Duplicate {
                from: *source,
                to: *target,
            });
        }
        self.can_connection_exist_between(source, target)
    }

    /// Validate, create and add a connection. Dynamic slots on either side
    /// adopt the concrete type of the other.
    pub fn connect_by_endpoint(&mut self, source: Endpoint, target: Endpoint) -> Result<ConnectionId, ConnectionError> {
        if let Err(error) = self.can_create_connection_between(&source, &target) {
            tracing::warn!("Failed to create connection: {}", error);
            return Err(error);
        }

        let mut connection = Connection::new(source, target);
        connection.set_name(self.connection_name(&source, &target));
        connection.init();
        connection.activate();

        let connection_id = self
            .insert_connection(connection)
            .map_err(|error| ConnectionError::Rejected(error.to_string()))?;
        self.adopt_display_type(target, source);
        self.adopt_display_type(source, target);

        tracing::debug!("Connected {} -> {} in graph '{}'", source, target, self.name);
        self.flush_events();
        Ok(connection_id)
    }

    /// Connect two slots given by node and slot id
    pub fn connect(
        &mut self,
        source_node: NodeId,
        source_slot: SlotId,
        target_node: NodeId,
        target_slot: SlotId,
    ) -> Result<ConnectionId, ConnectionError> {
        self.connect_by_endpoint(
            Endpoint::new(source_node, source_slot),
            Endpoint::new(target_node, target_slot),
        )
    }

    /// Remove the connection joining `source` and `target`
    pub fn disconnect_by_endpoint(&mut self, source: Endpoint, target: Endpoint) -> Result<ConnectionId, ConnectionError> {
        let connection_id = self
            .find_connection_between(&source, &target)
            .map(Connection::id)
            .ok_or(ConnectionError::NotFound { from: source, to: target })?;

        self.detach_connection(connection_id);
        tracing::debug!("Disconnected {} -> {} in graph '{}'", source, target, self.name);
        self.flush_events();
        Ok(connection_id)
    }

    /// Disconnect two slots given by node and slot id
    pub fn disconnect(
        &mut self,
        source_node: NodeId,
        source_slot: SlotId,
        target_node: NodeId,
        target_slot: SlotId,
    ) -> Result<ConnectionId, ConnectionError> {
        self.disconnect_by_endpoint(
            Endpoint::new(source_node, source_slot),
            Endpoint::new(target_node, target_slot),
        )
    }

    /// Remove a connection by id
    pub fn disconnect_by_id(&mut self, connection_id: ConnectionId) -> Result<Connection, ConnectionError> {
        let connection = self
            .detach_connection(connection_id)
            .ok_or(ConnectionError::ConnectionNotFound(connection_id))?;
        self.flush_events();
        Ok(connection)
    }

    /// Whether `to` can be reached from `from` by following at least one
    /// execution connection
    pub fn is_execution_reachable(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.execution_successors(from).into();

        while let Some(node_id) = queue.pop_front() {
            if node_id == to {
                return true;
            }
            if visited.insert(node_id) {
                queue.extend(self.execution_successors(node_id));
            }
        }
        false
    }

    fn execution_successors(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        node.slots_by_descriptor(SlotDescriptor::execution_out())
            .flat_map(|slot| self.get_connected_endpoints(&slot.endpoint()))
            .map(|endpoint| endpoint.node_id)
            .collect()
    }

    /// Whether data produced by `producer` is available when `consumer` runs.
    ///
    /// Pure-data nodes are evaluated on demand and are always in the path.
    pub fn is_in_data_flow_path(&self, producer: NodeId, consumer: NodeId) -> bool {
        let is_pure = |node_id: NodeId| self.nodes.get(&node_id).is_some_and(Node::is_pure_data);
        is_pure(producer) || is_pure(consumer) || self.is_execution_reachable(producer, consumer)
    }

    /// Nodes connected to the slots of `node_id` that have `descriptor`
    pub fn find_connected_nodes_by_descriptor(&self, node_id: NodeId, descriptor: SlotDescriptor) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        node.slots_by_descriptor(descriptor)
            .flat_map(|slot| self.get_connected_endpoints(&slot.endpoint()))
            .map(|endpoint| endpoint.node_id)
            .filter(|connected| seen.insert(*connected))
            .collect()
    }

    /// Check that a data connection's consumer runs after its producer.
    ///
    /// A connection whose source slot is an input is read backwards: the
    /// target produces and the source consumes.
    pub fn validate_data_connection(&self, connection: &Connection) -> Outcome {
        let source = connection.source_endpoint();
        let target = connection.target_endpoint();
        let (Some(source_node), Some(target_node)) = (self.nodes.get(&source.node_id), self.nodes.get(&target.node_id))
        else {
            return Err(format!("Connection {} has an unknown endpoint", connection.id()));
        };
        let Some(source_slot) = source_node.slot(source.slot_id) else {
            return Err(format!("Unknown source slot {}", source));
        };
        if !source_slot.is_data() {
            return Ok(());
        }

        let in_path = if source_slot.is_input() {
            self.is_in_data_flow_path(target.node_id, source.node_id)
        } else {
            self.is_in_data_flow_path(source.node_id, target.node_id)
        };
        if in_path {
            return Ok(());
        }

        Err(format!(
            "There is an invalid data connection {}.{} --> {}.{}, the data is not in the execution path between nodes. \
             Either route execution {} --> {}, or store the data in a variable if it is needed.",
            source_node.name(),
            source_node.slot_name(source.slot_id),
            target_node.name(),
            target_node.slot_name(target.slot_id),
            source_node.name(),
            target_node.name()
        ))
    }

    /// Structural, type and data-flow checks for an existing connection.
    /// Connection-count contracts are not re-run.
    fn check_connection(&self, connection: &Connection) -> Outcome {
        let source = connection.source_endpoint();
        let target = connection.target_endpoint();
        let source_node = self
            .nodes
            .get(&source.node_id)
            .ok_or_else(|| format!("Unknown source node {}", source.node_id))?;
        let target_node = self
            .nodes
            .get(&target.node_id)
            .ok_or_else(|| format!("Unknown target node {}", target.node_id))?;
        let source_slot = source_node
            .slot(source.slot_id)
            .ok_or_else(|| format!("Unknown source slot {}", source))?;
        let target_slot = target_node
            .slot(target.slot_id)
            .ok_or_else(|| format!("Unknown target slot {}", target))?;

        if !source_slot.descriptor().can_connect_to(target_slot.descriptor()) {
            return Err(format!(
                "{} slot '{}' cannot connect to {} slot '{}'",
                source_slot.descriptor(),
                source_slot.name(),
                target_slot.descriptor(),
                target_slot.name()
            ));
        }

        if source_slot.is_data() {
            source_slot.is_type_match_for_slot(source_node, target_slot, target_node)?;
            self.validate_data_connection(connection)?;
        }
        Ok(())
    }

    fn is_execution_connection(&self, connection: &Connection) -> bool {
        self.find_slot(&connection.source_endpoint())
            .map_or(true, |slot| slot.is_execution())
    }

    /// Remove every connection that no longer validates, repeating until
    /// nothing changes.
    ///
    /// Only execution connections affect data-flow reachability, so after
    /// the first sweep only data connections are re-checked, and only while
    /// the previous sweep removed an execution connection.
    pub fn refresh_connection_validity(&mut self, warn_on_removal: bool) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut worklist: Vec<ConnectionId> = self.connections.keys().copied().collect();

        while !worklist.is_empty() {
            let invalid: Vec<(ConnectionId, bool, String)> = worklist
                .iter()
                .filter_map(|connection_id| {
                    let connection = self.connections.get(connection_id)?;
                    let reason = self.check_connection(connection).err()?;
                    Some((*connection_id, self.is_execution_connection(connection), reason))
                })
                .collect();
            if invalid.is_empty() {
                break;
            }
            report.passes += 1;

            let mut execution_removed = false;
            for (connection_id, is_execution, reason) in invalid {
                let Some(connection) = self.detach_connection(connection_id) else {
                    continue;
                };
                if warn_on_removal {
                    tracing::warn!("Removing invalid connection '{}': {}", connection.name(), reason);
                }
                execution_removed |= is_execution;
                report.removed.push(connection_id);
            }

            worklist = if execution_removed {
                self.connections
                    .values()
                    .filter(|connection| !self.is_execution_connection(connection))
                    .map(Connection::id)
                    .collect()
            } else {
                Vec::new()
            };
        }

        if !report.removed.is_empty() {
            tracing::debug!(
                "Refresh of graph '{}' removed {} connection(s) in {} pass(es)",
                self.name,
                report.removed.len(),
                report.passes
            );
        }
        self.flush_events();
        report
    }

    fn connection_name(&self, source: &Endpoint, target: &Endpoint) -> String {
        let describe = |endpoint: &Endpoint| {
            self.nodes.get(&endpoint.node_id).map_or_else(
                || (String::new(), String::new()),
                |node| (node.name().to_string(), node.slot_name(endpoint.slot_id).to_string()),
            )
        };
        let (source_node, source_slot) = describe(source);
        let (target_node, target_slot) = describe(target);
        format!(
            "srcEndpoint=({}: {}), destEndpoint=({}: {})",
            source_node, source_slot, target_node, target_slot
        )
    }
}
