// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes: units of computation exposing a fixed set of slots.
//!
//! A [`Node`] owns its slots and the bookkeeping the graph needs (id, name,
//! lifecycle state, produced output values). What the node actually does is
//! delegated to a [`NodeLogic`] implementation; the graph only queries it
//! through capability methods and never downcasts.

use crate::data::{DataType, Datum, Outcome};
use crate::execution::{ExecutionScope, NodeError};
use crate::ids::{AssetId, NodeId, SlotId};
use crate::slot::{DynamicGroup, Slot, SlotConfig, SlotDescriptor, SlotError};
use crate::validation::ValidationResults;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Slots of a node keyed by id, in declaration order
pub type SlotMap = IndexMap<SlotId, Slot>;

/// Lifecycle of a node or connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Created, not yet initialized
    #[default]
    Constructed,
    /// Initialized and inactive
    Initialized,
    /// Active
    Active,
}

/// How a node starts execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Pushed onto the execution stack when the graph activates
    Start,
    /// Triggered by something outside the graph (events, timers)
    External,
}

/// Error-handler capability of a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorHandlerCapability {
    /// Nodes whose errors this handler receives. Empty means every node.
    pub sources: Vec<NodeId>,
}

/// External asset a node depends on, with the version it was authored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetBinding {
    /// Asset id
    pub asset_id: AssetId,
    /// Authored version
    pub version: u32,
}

/// Behavior of a node
pub trait NodeLogic: fmt::Debug {
    /// Type name used in diagnostics
    fn type_name(&self) -> &str;

    /// Slots created with the node
    fn slots(&self) -> Vec<SlotConfig> {
        Vec::new()
    }

    /// Entry-point capability
    fn entry_point(&self) -> Option<EntryPoint> {
        None
    }

    /// Error-handler capability
    fn as_error_handler(&self) -> Option<&ErrorHandlerCapability> {
        None
    }

    /// External asset this node is bound to
    fn asset_dependency(&self) -> Option<AssetBinding> {
        None
    }

    /// Node-specific validation. Return `false` to flag an internal error.
    fn validate(&self, _slots: &SlotMap, _results: &mut ValidationResults) -> bool {
        true
    }

    /// Called when the node activates
    fn on_activate(&mut self, _node_id: NodeId) {}

    /// Called when the node deactivates
    fn on_deactivate(&mut self) {}

    /// Called once every node and connection is active
    fn post_activate(&mut self) {}

    /// A literal or referenced input value changed
    fn on_input_changed(&mut self, _slot_id: SlotId, _value: &Datum) {}

    /// A slot's display type changed
    fn on_display_type_changed(&mut self, _slot_id: SlotId, _display_type: Option<&DataType>) {}

    /// Rewrite any entity ids held by the logic
    fn remap_ids(&mut self, _remapper: &mut dyn FnMut(Uuid) -> Uuid) {}

    /// Run the node body
    fn execute(&mut self, scope: &mut ExecutionScope<'_>) -> Result<(), NodeError>;
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    enabled: bool,
    state: EntityState,
    slots: SlotMap,
    logic: Box<dyn NodeLogic>,
    outputs: HashMap<SlotId, Datum>,
}

impl Node {
    /// Create a node with the slots its logic declares
    pub fn new(name: impl Into<String>, logic: impl NodeLogic + 'static) -> Self {
        Self::from_boxed(name, Box::new(logic))
    }

    /// Create a node from boxed logic
    pub fn from_boxed(name: impl Into<String>, logic: Box<dyn NodeLogic>) -> Self {
        let configs = logic.slots();
        let mut node = Self {
            id: NodeId::new(),
            name: name.into(),
            enabled: true,
            state: EntityState::Constructed,
            slots: SlotMap::new(),
            logic,
            outputs: HashMap::new(),
        };
        for config in configs {
            node.add_slot(config);
        }
        node
    }

    /// Use a specific id
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.set_id(id);
        self
    }

    /// Add a slot
    pub fn with_slot(mut self, config: SlotConfig) -> Self {
        self.add_slot(config);
        self
    }

    /// Add a slot, returning its id. A nil id is replaced with a fresh one.
    pub fn add_slot(&mut self, mut config: SlotConfig) -> SlotId {
        if !config.id.is_valid() {
            tracing::warn!("Slot '{}' on node '{}' has a nil id; assigning a new one", config.name, self.name);
            config.id = SlotId::new();
        }
        let slot = Slot::new(config, self.id);
        let id = slot.id();
        self.slots.insert(id, slot);
        id
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
        for slot in self.slots.values_mut() {
            slot.set_node_id(id);
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the display name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Disabled nodes are skipped by validation
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the node
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Lifecycle state
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Node behavior
    pub fn logic(&self) -> &dyn NodeLogic {
        self.logic.as_ref()
    }

    /// Mutable node behavior
    pub fn logic_mut(&mut self) -> &mut dyn NodeLogic {
        self.logic.as_mut()
    }

    /// Type name of the logic
    pub fn type_name(&self) -> &str {
        self.logic.type_name()
    }

    /// Get a slot by id
    pub fn slot(&self, slot_id: SlotId) -> Option<&Slot> {
        self.slots.get(&slot_id)
    }

    /// Get a mutable slot by id
    pub fn slot_mut(&mut self, slot_id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(&slot_id)
    }

    /// All slots, in declaration order
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Slot map
    pub fn slot_map(&self) -> &SlotMap {
        &self.slots
    }

    /// Find a slot by name
    pub fn slot_by_name(&self, name: &str) -> Option<&Slot> {
        self.slots.values().find(|slot| slot.name() == name)
    }

    /// Find a slot id by name
    pub fn slot_id(&self, name: &str) -> Option<SlotId> {
        self.slot_by_name(name).map(Slot::id)
    }

    /// Name of a slot, or an empty string if it does not exist
    pub fn slot_name(&self, slot_id: SlotId) -> &str {
        self.slot(slot_id).map_or("", Slot::name)
    }

    /// Slots with the given descriptor
    pub fn slots_by_descriptor(&self, descriptor: SlotDescriptor) -> impl Iterator<Item = &Slot> {
        self.slots
            .values()
            .filter(move |slot| *slot.descriptor() == descriptor)
    }

    /// Whether the node starts execution
    pub fn is_entry_point(&self) -> bool {
        self.logic.entry_point().is_some()
    }

    /// A node without execution slots; its outputs are computed on demand
    pub fn is_pure_data(&self) -> bool {
        !self.slots.values().any(Slot::is_execution)
    }

    /// Slots belonging to `group`
    pub fn slots_in_group<'a>(&'a self, group: &'a DynamicGroup) -> impl Iterator<Item = &'a Slot> + 'a {
        self.slots
            .values()
            .filter(move |slot| slot.dynamic_group() == Some(group))
    }

    /// Concrete type already committed by some member of `group`
    pub fn group_display_type<'a>(&'a self, group: &'a DynamicGroup) -> Option<&'a DataType> {
        self.slots_in_group(group).find_map(Slot::display_type)
    }

    /// Whether any member of `group` has resolved a concrete type
    pub fn has_concrete_display_type(&self, group: &DynamicGroup) -> bool {
        self.group_display_type(group).is_some()
    }

    /// Check `data_type` against every member of `group`
    pub fn is_valid_type_for_group(&self, group: &DynamicGroup, data_type: &DataType) -> Outcome {
        for slot in self.slots_in_group(group) {
            slot.is_type_match_for(data_type).map_err(|reason| {
                format!(
                    "Slot '{}' in group '{}' of node '{}' rejects {}: {}",
                    slot.name(),
                    group.0,
                    self.name,
                    data_type,
                    reason
                )
            })?;
        }
        Ok(())
    }

    /// Commit a display type on one slot, notifying the logic on change
    pub fn set_slot_display_type(&mut self, slot_id: SlotId, display_type: Option<DataType>) -> bool {
        let Some(slot) = self.slots.get_mut(&slot_id) else {
            return false;
        };
        if !slot.set_display_type(display_type) {
            return false;
        }
        let current = slot.display_type().cloned();
        self.logic.on_display_type_changed(slot_id, current.as_ref());
        true
    }

    /// Commit a display type on every member of `group`. Returns the slots that changed.
    pub fn set_group_display_type(&mut self, group: &DynamicGroup, display_type: Option<DataType>) -> Vec<SlotId> {
        let members: Vec<SlotId> = self.slots_in_group(group).map(Slot::id).collect();
        members
            .into_iter()
            .filter(|slot_id| self.set_slot_display_type(*slot_id, display_type.clone()))
            .collect()
    }

    /// Resolve the display type of a dynamic slot (and its group) to `data_type`
    /// if it has none yet. Returns the slots that changed.
    pub fn resolve_dynamic_slot(&mut self, slot_id: SlotId, data_type: &DataType) -> Vec<SlotId> {
        let Some(slot) = self.slots.get(&slot_id) else {
            return Vec::new();
        };
        if !slot.is_dynamic() || slot.has_display_type() {
            return Vec::new();
        }

        match slot.dynamic_group().cloned() {
            Some(group) => self.set_group_display_type(&group, Some(data_type.clone())),
            None if self.set_slot_display_type(slot_id, Some(data_type.clone())) => vec![slot_id],
            None => Vec::new(),
        }
    }

    /// Bind a literal value to a data slot, resolving dynamic types.
    /// Returns the slots whose display type changed.
    pub fn set_slot_value(&mut self, slot_id: SlotId, value: Datum) -> Result<Vec<SlotId>, SlotError> {
        let data_type = value.data_type();
        let slot = self
            .slots
            .get(&slot_id)
            .ok_or_else(|| SlotError::UnknownEndpoint((self.id, slot_id).into()))?;

        if !slot.is_data() || slot.is_variable_reference() {
            return Err(SlotError::NotConvertible(slot.name().to_string()));
        }
        if let Some(group) = slot.dynamic_group() {
            self.is_valid_type_for_group(group, &data_type)
                .map_err(SlotError::TypeMismatch)?;
        }
        slot.is_type_match_for(&data_type)
            .map_err(SlotError::TypeMismatch)?;

        let changed = self.resolve_dynamic_slot(slot_id, &data_type);
        if let Some(slot) = self.slots.get_mut(&slot_id) {
            slot.set_datum(Some(value.clone()));
        }
        self.logic.on_input_changed(slot_id, &value);
        Ok(changed)
    }

    /// Run node-level validation
    pub fn validate(&self, results: &mut ValidationResults) -> bool {
        self.logic.validate(&self.slots, results)
    }

    /// Value produced on an output slot during execution, falling back to the
    /// slot's literal
    pub fn output_value(&self, slot_id: SlotId) -> Option<&Datum> {
        self.outputs
            .get(&slot_id)
            .or_else(|| self.slots.get(&slot_id).and_then(Slot::datum))
    }

    pub(crate) fn store_output(&mut self, slot_id: SlotId, value: Datum) {
        self.outputs.insert(slot_id, value);
    }

    pub(crate) fn split_for_execution(&mut self) -> (&SlotMap, &mut dyn NodeLogic) {
        (&self.slots, self.logic.as_mut())
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.values_mut()
    }

    pub(crate) fn init(&mut self) {
        if self.state == EntityState::Constructed {
            self.state = EntityState::Initialized;
        }
    }

    pub(crate) fn activate(&mut self) {
        if self.state == EntityState::Initialized {
            self.state = EntityState::Active;
            self.logic.on_activate(self.id);
        }
    }

    pub(crate) fn deactivate(&mut self) {
        if self.state == EntityState::Active {
            self.state = EntityState::Initialized;
            self.outputs.clear();
            self.logic.on_deactivate();
        }
    }

    pub(crate) fn post_activate(&mut self) {
        self.logic.post_activate();
    }
}
