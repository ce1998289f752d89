// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution context and the view a node gets while it runs.

use crate::data::Datum;
use crate::endpoint::Endpoint;
use crate::ids::{EntityId, NodeId, SlotId};
use crate::node::SlotMap;
use crate::slot::Slot;
use std::collections::{HashMap, VecDeque};

/// Error raised by a node body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// The node referred to a slot it does not have, or used it the wrong way
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    /// A required input had no value
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Node-specific failure
    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    /// Node-specific failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Runtime failures that leave the execution context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// A node failed and no handler was registered for it
    #[error("Unhandled error in node {node}: {message}")]
    Unhandled {
        /// Failing node
        node: NodeId,
        /// Formatted message
        message: String,
    },

    /// Execution ran longer than the configured step budget
    #[error("Execution exceeded {0} steps")]
    StepLimitExceeded(usize),

    /// The graph is not active
    #[error("Graph is not active")]
    NotActive,

    /// A trigger named a node the graph does not have
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
}

/// What a node sees while its body runs
#[derive(Debug)]
pub struct ExecutionScope<'a> {
    node_id: NodeId,
    owner: EntityId,
    slots: &'a SlotMap,
    inputs: HashMap<SlotId, Datum>,
    outputs: Vec<(SlotId, Datum)>,
    signals: Vec<SlotId>,
    error: Option<&'a str>,
}

impl<'a> ExecutionScope<'a> {
    /// Scope for `node_id` with resolved inputs
    pub fn new(
        node_id: NodeId,
        owner: EntityId,
        slots: &'a SlotMap,
        inputs: HashMap<SlotId, Datum>,
        error: Option<&'a str>,
    ) -> Self {
        Self {
            node_id,
            owner,
            slots,
            inputs,
            outputs: Vec::new(),
            signals: Vec::new(),
            error,
        }
    }

    /// Executing node
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Entity owning the running graph
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Error being handled, when the node runs as an error handler
    pub fn error(&self) -> Option<&str> {
        self.error
    }

    fn find_slot(&self, name: &str) -> Option<&'a Slot> {
        self.slots.values().find(|slot| slot.name() == name)
    }

    /// Value of a data input
    pub fn input(&self, name: &str) -> Option<&Datum> {
        let slot = self.find_slot(name).filter(|slot| slot.is_data() && slot.is_input())?;
        self.inputs.get(&slot.id())
    }

    /// Value of a data input that must be present
    pub fn require_input(&self, name: &str) -> Result<&Datum, NodeError> {
        self.input(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Produce a value on a data output
    pub fn set_output(&mut self, name: &str, value: Datum) -> Result<(), NodeError> {
        let slot = self
            .find_slot(name)
            .filter(|slot| slot.is_data() && slot.is_output())
            .ok_or_else(|| NodeError::UnknownSlot(name.to_string()))?;
        self.outputs.push((slot.id(), value));
        Ok(())
    }

    /// Fire an execution output
    pub fn signal(&mut self, name: &str) -> Result<(), NodeError> {
        let slot = self
            .find_slot(name)
            .filter(|slot| slot.is_execution() && slot.is_output())
            .ok_or_else(|| NodeError::UnknownSlot(name.to_string()))?;
        self.signals.push(slot.id());
        Ok(())
    }

    /// Fire every immediate execution output
    pub fn signal_all(&mut self) {
        let slots = self.slots;
        self.signals.extend(
            slots
                .values()
                .filter(|slot| slot.is_execution() && slot.is_output() && !slot.is_latent())
                .map(Slot::id),
        );
    }

    pub(crate) fn into_parts(self) -> (Vec<(SlotId, Datum)>, Vec<SlotId>) {
        (self.outputs, self.signals)
    }
}

/// A node waiting on the execution stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub node: NodeId,
    pub error: Option<String>,
}

/// Per-graph execution state: entry points, error routing and the stack
#[derive(Debug, Default)]
pub struct ExecutionContext {
    entry_points: Vec<NodeId>,
    catch_all: Option<NodeId>,
    handlers: HashMap<NodeId, NodeId>,
    stack: Vec<Frame>,
    pending: VecDeque<Endpoint>,
    active: bool,
}

impl ExecutionContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry points found on activation
    pub fn entry_points(&self) -> &[NodeId] {
        &self.entry_points
    }

    pub(crate) fn add_entry_point(&mut self, node_id: NodeId) {
        if !self.entry_points.contains(&node_id) {
            self.entry_points.push(node_id);
        }
    }

    /// Bind `handler` to `sources`; no sources makes it the catch-all
    pub fn add_error_handler(&mut self, handler: NodeId, sources: &[NodeId]) {
        if sources.is_empty() {
            if let Some(previous) = self.catch_all.replace(handler) {
                tracing::warn!("Catch-all error handler {} replaced by {}", previous, handler);
            }
            return;
        }
        for source in sources {
            self.handlers.insert(*source, handler);
        }
    }

    /// Handler receiving errors from `source`
    pub fn error_handler_for(&self, source: NodeId) -> Option<NodeId> {
        self.handlers.get(&source).copied().or(self.catch_all)
    }

    /// Graph-wide handler
    pub fn catch_all(&self) -> Option<NodeId> {
        self.catch_all
    }

    /// Whether the context accepts work
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of frames waiting
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Latent signals waiting for [`Graph::run_pending`](crate::Graph::run_pending)
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn push(&mut self, node: NodeId) {
        self.stack.push(Frame { node, error: None });
    }

    pub(crate) fn push_error(&mut self, handler: NodeId, message: String) {
        self.stack.push(Frame {
            node: handler,
            error: Some(message),
        });
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    pub(crate) fn defer(&mut self, endpoint: Endpoint) {
        self.pending.push_back(endpoint);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Endpoint> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub(crate) fn activate(&mut self) {
        self.active = true;
    }

    /// Drop all bindings and queued work
    pub(crate) fn deactivate(&mut self) {
        *self = Self::default();
    }
}
