// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure: nodes, connections and the endpoint adjacency index.
//!
//! The adjacency index maps every connected endpoint to the endpoints on the
//! far side of its connections. Both directions of a connection are always
//! inserted and removed together, so the index stays the symmetric closure
//! of the connection set.

mod connect;
mod lifecycle;
mod run;
mod slots;

pub use connect::RefreshReport;

use crate::config::EngineConfig;
use crate::connection::Connection;
use crate::endpoint::Endpoint;
use crate::events::{GraphEvent, GraphObserver};
use crate::execution::ExecutionContext;
use crate::ids::{ConnectionId, EntityId, GraphId, NodeId, SlotId};
use crate::node::{AssetBinding, Node};
use crate::slot::Slot;
use crate::validation::AssetCatalog;
use crate::variable::{GraphVariable, VariableError, VariableManager};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Lifecycle of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphState {
    /// Freshly built
    #[default]
    Constructed,
    /// Nodes and connections initialized, adjacency built
    Initialized,
    /// Running
    Activated,
    /// Stopped; may be activated again
    Deactivated,
}

/// Something that can be added to a graph
#[derive(Debug)]
pub enum GraphItem {
    /// A node
    Node(Node),
    /// A connection
    Connection(Connection),
}

/// Bundle of graph contents moved in or out as a unit
#[derive(Debug, Default)]
pub struct GraphData {
    /// Nodes
    pub nodes: Vec<Node>,
    /// Connections
    pub connections: Vec<Connection>,
    /// Variables
    pub variables: Vec<GraphVariable>,
}

/// A visual script graph
pub struct Graph {
    id: GraphId,
    name: String,
    owner: EntityId,
    config: EngineConfig,
    state: GraphState,
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
    endpoint_map: HashMap<Endpoint, Vec<Endpoint>>,
    variables: VariableManager,
    dependent_assets: IndexMap<NodeId, AssetBinding>,
    asset_catalog: Option<Box<dyn AssetCatalog>>,
    execution: ExecutionContext,
    observers: Vec<Box<dyn GraphObserver>>,
    pending_events: Vec<GraphEvent>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, EngineConfig::default())
    }

    /// Create a new empty graph with explicit engine settings
    pub fn with_config(name: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            owner: EntityId::nil(),
            config,
            state: GraphState::Constructed,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            endpoint_map: HashMap::new(),
            variables: VariableManager::new(),
            dependent_assets: IndexMap::new(),
            asset_catalog: None,
            execution: ExecutionContext::new(),
            observers: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Unique id of this graph instance
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the graph
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Entity owning the graph, set on activation
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Graph variables
    pub fn variables(&self) -> &VariableManager {
        &self.variables
    }

    /// Mutable graph variables
    pub fn variables_mut(&mut self) -> &mut VariableManager {
        &mut self.variables
    }

    /// Execution state
    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    /// Register an observer for graph events
    pub fn add_observer(&mut self, observer: impl GraphObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Install the catalog asset bindings are validated against
    pub fn set_asset_catalog(&mut self, catalog: impl AssetCatalog + 'static) {
        self.asset_catalog = Some(Box::new(catalog));
    }

    /// External assets the graph's nodes depend on
    pub fn dependent_assets(&self) -> impl Iterator<Item = (NodeId, AssetBinding)> + '_ {
        self.dependent_assets
            .iter()
            .map(|(node_id, binding)| (*node_id, *binding))
    }

    /// Add a node or a connection
    pub fn add_item(&mut self, item: GraphItem) -> Result<(), GraphError> {
        match item {
            GraphItem::Node(node) => self.add_node(node).map(|_| ()),
            GraphItem::Connection(connection) => self.add_connection(connection).map(|_| ()),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let result = self.insert_node(node);
        self.flush_events();
        result
    }

    /// Remove a node, its connections and its asset binding
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, GraphError> {
        let result = self
            .detach_node(node_id)
            .map(|(node, _)| node)
            .ok_or(GraphError::NodeNotFound(node_id));
        self.flush_events();
        result
    }

    /// Get a node by ID
    pub fn find_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn find_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve an endpoint to its slot
    pub fn find_slot(&self, endpoint: &Endpoint) -> Option<&Slot> {
        self.nodes.get(&endpoint.node_id)?.slot(endpoint.slot_id)
    }

    /// Endpoint of the slot called `slot_name` on `node_id`
    pub fn find_endpoint(&self, node_id: NodeId, slot_name: &str) -> Option<Endpoint> {
        let slot_id = self.nodes.get(&node_id)?.slot_id(slot_name)?;
        Some(Endpoint::new(node_id, slot_id))
    }

    /// Add a prepared connection. Both endpoints must resolve.
    pub fn add_connection(&mut self, connection: Connection) -> Result<ConnectionId, GraphError> {
        let result = self.insert_connection(connection);
        self.flush_events();
        result
    }

    /// Remove a connection
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Result<Connection, GraphError> {
        let result = self
            .detach_connection(connection_id)
            .ok_or(GraphError::ConnectionNotFound(connection_id));
        self.flush_events();
        result
    }

    /// Get a connection by ID
    pub fn find_connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Connection joining `a` and `b`, in either orientation
    pub fn find_connection_between(&self, a: &Endpoint, b: &Endpoint) -> Option<&Connection> {
        self.connections
            .values()
            .find(|connection| connection.connects(a, b))
    }

    /// Get all connections, in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(move |connection| connection.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Endpoints on the far side of every connection touching `endpoint`
    pub fn get_connected_endpoints(&self, endpoint: &Endpoint) -> Vec<Endpoint> {
        self.endpoint_map.get(endpoint).cloned().unwrap_or_default()
    }

    /// Whether `endpoint` has any connection
    pub fn is_endpoint_connected(&self, endpoint: &Endpoint) -> bool {
        self.endpoint_map
            .get(endpoint)
            .is_some_and(|others| !others.is_empty())
    }

    /// Every endpoint present in the adjacency index
    pub fn connected_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoint_map.keys()
    }

    /// Add a bundle of nodes, connections and variables.
    ///
    /// Items are added one by one; failures are returned and do not stop
    /// the rest of the batch.
    pub fn add_graph_data(&mut self, data: GraphData) -> Vec<GraphError> {
        self.emit(GraphEvent::BatchAddBegin);

        let mut failures = Vec::new();
        for variable in data.variables {
            if let Err(error) = self.variables.insert(variable) {
                failures.push(GraphError::from(error));
            }
        }
        for node in data.nodes {
            if let Err(error) = self.insert_node(node) {
                failures.push(error);
            }
        }
        for connection in data.connections {
            if let Err(error) = self.insert_connection(connection) {
                failures.push(error);
            }
        }

        self.emit(GraphEvent::BatchAddComplete);
        self.flush_events();

        for failure in &failures {
            tracing::warn!("Graph '{}' rejected item from batch: {}", self.name, failure);
        }
        failures
    }

    /// Remove the given nodes along with every connection touching them
    pub fn remove_graph_data(&mut self, node_ids: &[NodeId]) -> GraphData {
        let mut removed = GraphData::default();
        for node_id in node_ids {
            if let Some((node, connections)) = self.detach_node(*node_id) {
                removed.nodes.push(node);
                removed.connections.extend(connections);
            }
        }
        self.flush_events();
        removed
    }

    /// Move every node, connection and variable out of the graph
    pub fn take_graph_data(&mut self) -> GraphData {
        self.endpoint_map.clear();
        self.dependent_assets.clear();

        let connections: Vec<Connection> = self.connections.drain(..).map(|(_, c)| c).collect();
        let nodes: Vec<Node> = self.nodes.drain(..).map(|(_, n)| n).collect();
        let variables = std::mem::take(&mut self.variables)
            .data()
            .variables()
            .cloned()
            .collect();

        for connection in &connections {
            self.emit(GraphEvent::ConnectionRemoved(connection.id()));
        }
        for node in &nodes {
            self.emit(GraphEvent::NodeRemoved(node.id()));
        }
        self.flush_events();

        GraphData {
            nodes,
            connections,
            variables,
        }
    }

    fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let node_id = node.id();
        if !node_id.is_valid() {
            return Err(GraphError::InvalidId);
        }
        if self.nodes.contains_key(&node_id) {
            return Err(GraphError::DuplicateNode(node_id));
        }

        if let Some(binding) = node.logic().asset_dependency() {
            self.dependent_assets.insert(node_id, binding);
        }
        self.nodes.insert(node_id, node);
        self.emit(GraphEvent::NodeAdded(node_id));
        tracing::debug!("Added node {} to graph '{}'", node_id, self.name);
        Ok(node_id)
    }

    fn detach_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Connection>)> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }

        let touching: Vec<ConnectionId> = self
            .connections_for_node(node_id)
            .map(Connection::id)
            .collect();
        let connections = touching
            .into_iter()
            .filter_map(|connection_id| self.detach_connection(connection_id))
            .collect();

        self.dependent_assets.shift_remove(&node_id);
        let node = self.nodes.shift_remove(&node_id)?;
        self.emit(GraphEvent::NodeRemoved(node_id));
        tracing::debug!("Removed node {} from graph '{}'", node_id, self.name);
        Some((node, connections))
    }

    fn insert_connection(&mut self, connection: Connection) -> Result<ConnectionId, GraphError> {
        let connection_id = connection.id();
        if !connection_id.is_valid() {
            return Err(GraphError::InvalidId);
        }
        if !connection.source_endpoint().is_valid() || !connection.target_endpoint().is_valid() {
            return Err(GraphError::InvalidId);
        }
        if self.connections.contains_key(&connection_id) {
            return Err(GraphError::DuplicateConnection(connection_id));
        }

        let source = connection.source_endpoint();
        let target = connection.target_endpoint();
        for endpoint in [source, target] {
            if self.find_slot(&endpoint).is_none() {
                return Err(GraphError::UnresolvedEndpoint {
                    connection: connection_id,
                    endpoint,
                });
            }
        }

        self.connections.insert(connection_id, connection);
        self.link(source, target);

        self.emit(GraphEvent::ConnectionAdded(connection_id));
        self.emit(GraphEvent::EndpointConnected {
            endpoint: source,
            other: target,
        });
        self.emit(GraphEvent::EndpointConnected {
            endpoint: target,
            other: source,
        });
        Ok(connection_id)
    }

    pub(super) fn detach_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(&connection_id)?;
        let source = connection.source_endpoint();
        let target = connection.target_endpoint();
        self.unlink(source, target);

        self.emit(GraphEvent::ConnectionRemoved(connection_id));
        self.emit(GraphEvent::EndpointDisconnected {
            endpoint: source,
            other: target,
        });
        self.emit(GraphEvent::EndpointDisconnected {
            endpoint: target,
            other: source,
        });

        self.sanity_check_dynamic_display(source);
        self.sanity_check_dynamic_display(target);
        Some(connection)
    }

    fn link(&mut self, source: Endpoint, target: Endpoint) {
        self.endpoint_map.entry(source).or_default().push(target);
        self.endpoint_map.entry(target).or_default().push(source);
    }

    fn unlink(&mut self, source: Endpoint, target: Endpoint) {
        for (from, to) in [(source, target), (target, source)] {
            if let Some(others) = self.endpoint_map.get_mut(&from) {
                if let Some(index) = others.iter().position(|other| *other == to) {
                    others.remove(index);
                }
                if others.is_empty() {
                    self.endpoint_map.remove(&from);
                }
            }
        }
    }

    pub(super) fn rebuild_endpoint_map(&mut self) {
        self.endpoint_map.clear();
        let pairs: Vec<(Endpoint, Endpoint)> = self
            .connections
            .values()
            .map(|connection| (connection.source_endpoint(), connection.target_endpoint()))
            .collect();
        for (source, target) in pairs {
            self.link(source, target);
        }
    }

    pub(super) fn emit(&mut self, event: GraphEvent) {
        if !self.observers.is_empty() {
            self.pending_events.push(event);
        }
    }

    pub(super) fn emit_display_changes(&mut self, node_id: NodeId, changed: Vec<SlotId>) {
        for slot_id in changed {
            let display_type = self
                .find_slot(&Endpoint::new(node_id, slot_id))
                .and_then(Slot::display_type)
                .cloned();
            self.emit(GraphEvent::DisplayTypeChanged {
                endpoint: Endpoint::new(node_id, slot_id),
                display_type,
            });
        }
    }

    /// Deliver queued events. Observers are taken out for the duration so
    /// they can borrow the graph.
    pub(super) fn flush_events(&mut self) {
        if self.pending_events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending_events);
        let mut observers = std::mem::take(&mut self.observers);
        for event in &events {
            for observer in &mut observers {
                observer.on_event(self, event);
            }
        }
        self.observers = observers;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("variables", &self.variables.data().len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Structural errors when adding or removing graph items
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The item has a nil id
    #[error("Invalid id")]
    InvalidId,

    /// A node with this id is already in the graph
    #[error("Node already in graph: {0}")]
    DuplicateNode(NodeId),

    /// A connection with this id is already in the graph
    #[error("Connection already in graph: {0}")]
    DuplicateConnection(ConnectionId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Connection not found
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// A connection names an endpoint that does not resolve
    #[error("Connection {connection} refers to unknown endpoint {endpoint}")]
    UnresolvedEndpoint {
        /// Connection
        connection: ConnectionId,
        /// Unresolved endpoint
        endpoint: Endpoint,
    },

    /// A variable could not be added
    #[error(transparent)]
    Variable(#[from] VariableError),
}

/// Error when creating or removing a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot not found
    #[error("Slot not found: {0}")]
    SlotNotFound(Endpoint),

    /// The endpoint has a nil node or slot id
    #[error("Endpoint {0} has a nil id and cannot be connected")]
    InvalidEndpoint(Endpoint),

    /// The pair is already connected
    #[error("Attempting to create duplicate connection between source endpoint {from} and target endpoint {to}")]
    Duplicate {
        /// Source endpoint
        from: Endpoint,
        /// Target endpoint
        to: Endpoint,
    },

    /// A contract or the type match refused the connection
    #[error("{0}")]
    Rejected(String),

    /// No connection joins the pair
    #[error("No connection between {from} and {to}")]
    NotFound {
        /// Source endpoint
        from: Endpoint,
        /// Target endpoint
        to: Endpoint,
    },

    /// No connection has this id
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AssetId;
    use crate::nodes::FunctionNode;
    use crate::test_utils::{consumer, producer, scenario};
    use crate::variable::VariableSource;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_add_node_rejects_nil_and_duplicates() {
        let mut graph = Graph::new("Test");
        let node = producer();
        let id = node.id();
        graph.add_node(node).unwrap();

        let duplicate = consumer().with_id(id);
        assert!(matches!(graph.add_node(duplicate), Err(GraphError::DuplicateNode(_))));

        let nil = consumer().with_id(NodeId::nil());
        assert!(matches!(graph.add_node(nil), Err(GraphError::InvalidId)));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.find_node(NodeId::new()).is_none());
    }

    #[test]
    fn test_add_connection_requires_live_endpoints() {
        let mut graph = Graph::new("Test");
        let a = graph.add_node(producer()).unwrap();
        let out = graph.find_endpoint(a, "Out").unwrap();
        let dangling = Endpoint::new(NodeId::new(), SlotId::new());

        let result = graph.add_connection(Connection::new(out, dangling));
        assert!(matches!(result, Err(GraphError::UnresolvedEndpoint { .. })));
        assert_eq!(graph.connection_count(), 0);
        assert!(!graph.is_endpoint_connected(&out));
    }

    #[test]
    fn test_add_connection_rejects_nil_endpoints() {
        let mut graph = Graph::new("Test");
        let a = graph.add_node(producer()).unwrap();
        let out = graph.find_endpoint(a, "Out").unwrap();
        let nil_slot = Endpoint::new(a, SlotId::nil());

        let result = graph.add_connection(Connection::new(out, nil_slot));
        assert!(matches!(result, Err(GraphError::InvalidId)));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_remove_node_cascades_connections() {
        let (mut graph, a, b) = scenario();
        let out = graph.find_endpoint(a, "Out").unwrap();
        let input = graph.find_endpoint(b, "In").unwrap();
        graph.connect_by_endpoint(out, input).unwrap();

        graph.remove_node(b).unwrap();
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.get_connected_endpoints(&out).is_empty());
        assert!(graph.connected_endpoints().next().is_none());
        assert!(matches!(graph.remove_node(b), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_remove_node_drops_asset_binding() {
        let mut graph = Graph::new("Test");
        let binding = AssetBinding {
            asset_id: AssetId::new(),
            version: 2,
        };
        let node = graph
            .add_node(Node::new("Event", FunctionNode::pure().with_asset(binding)))
            .unwrap();
        assert_eq!(graph.dependent_assets().collect::<Vec<_>>(), vec![(node, binding)]);

        graph.remove_node(node).unwrap();
        assert_eq!(graph.dependent_assets().count(), 0);
    }

    #[test]
    fn test_events_follow_mutations() {
        let (mut graph, a, b) = scenario();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        graph.add_observer(move |graph: &Graph, event: &GraphEvent| {
            if let GraphEvent::EndpointConnected { endpoint, other } = event {
                assert!(graph.get_connected_endpoints(endpoint).contains(other));
            }
            sink.borrow_mut().push(event.clone());
        });

        let out = graph.find_endpoint(a, "Out").unwrap();
        let input = graph.find_endpoint(b, "In").unwrap();
        let id = graph.connect_by_endpoint(out, input).unwrap();
        graph.disconnect_by_endpoint(out, input).unwrap();

        let events = log.borrow();
        assert_eq!(events[0], GraphEvent::ConnectionAdded(id));
        assert!(events.contains(&GraphEvent::EndpointDisconnected {
            endpoint: input,
            other: out,
        }));
        assert!(events.contains(&GraphEvent::ConnectionRemoved(id)));
    }

    #[test]
    fn test_batch_add_reports_failures() {
        let mut graph = Graph::new("Test");
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        graph.add_observer(move |graph: &Graph, event: &GraphEvent| {
            if matches!(event, GraphEvent::BatchAddBegin | GraphEvent::BatchAddComplete) {
                sink.borrow_mut().push(graph.node_count());
            }
        });

        let a = producer();
        let b = consumer();
        let good = Connection::new(
            Endpoint::new(a.id(), a.slot_id("Out").unwrap()),
            Endpoint::new(b.id(), b.slot_id("In").unwrap()),
        );
        let bad = Connection::new(
            Endpoint::new(a.id(), a.slot_id("Out").unwrap()),
            Endpoint::new(NodeId::new(), SlotId::new()),
        );

        let failures = graph.add_graph_data(GraphData {
            nodes: vec![a, b],
            connections: vec![good, bad],
            variables: vec![GraphVariable::new("Score", crate::data::Datum::Int(0))],
        });
        assert_eq!(failures.len(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.variables().find_variable("Score").is_some());
        // Events are delivered once the whole batch is in.
        assert_eq!(*batches.borrow(), vec![2, 2]);
    }

    #[test]
    fn test_take_and_remove_graph_data() {
        let (mut graph, a, b) = scenario();
        let out = graph.find_endpoint(a, "Out").unwrap();
        let input = graph.find_endpoint(b, "In").unwrap();
        graph.connect_by_endpoint(out, input).unwrap();

        let removed = graph.remove_graph_data(&[a]);
        assert_eq!(removed.nodes.len(), 1);
        assert_eq!(removed.connections.len(), 1);

        let rest = graph.take_graph_data();
        assert_eq!(rest.nodes.len(), 1);
        assert_eq!(graph.node_count(), 0);
    }
}
