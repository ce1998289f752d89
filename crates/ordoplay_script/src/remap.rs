// SPDX-License-Identifier: MIT OR Apache-2.0
//! Asset-time to runtime id substitution.
//!
//! Lookups go through the graph's own table first (internal ids and the two
//! reserved sentinels), then through the entities the host loaded alongside
//! the graph. Ids known to neither pass through unchanged.

use crate::connection::Connection;
use crate::data::Datum;
use crate::ids::{EntityId, NodeId};
use crate::node::Node;
use crate::variable::VariableManager;
use std::collections::HashMap;
use uuid::Uuid;

/// Anything holding ids that must be rewritten on activation
pub trait RemapIds {
    /// Replace every held id with `remapper(id)`
    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid);
}

impl RemapIds for Datum {
    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid) {
        match self {
            Datum::Entity(entity) => *entity = EntityId(remapper(entity.0)),
            Datum::List { items, .. } => {
                for item in items {
                    item.remap_ids(remapper);
                }
            }
            Datum::Map { entries, .. } => {
                for (key, value) in entries {
                    key.remap_ids(remapper);
                    value.remap_ids(remapper);
                }
            }
            Datum::Object { fields, .. } => {
                for value in fields.values_mut() {
                    value.remap_ids(remapper);
                }
            }
            _ => {}
        }
    }
}

impl RemapIds for Node {
    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid) {
        for slot in self.slots_mut() {
            if let Some(datum) = slot.datum_mut() {
                datum.remap_ids(remapper);
            }
        }
        self.logic_mut().remap_ids(remapper);
    }
}

impl RemapIds for Connection {
    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid) {
        let (source, target) = self.endpoints_mut();
        for endpoint in [source, target] {
            endpoint.node_id = NodeId(remapper(endpoint.node_id.0));
        }
    }
}

impl RemapIds for VariableManager {
    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid) {
        for variable in self.values_mut() {
            if let Some(datum) = variable.datum.as_mut() {
                datum.remap_ids(remapper);
            }
        }
    }
}

/// What the host supplies when activating a graph
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    /// Entity that owns the running graph
    pub owner: EntityId,
    /// Asset-time ids of loaded entities mapped to their runtime ids
    pub loaded_entities: HashMap<EntityId, EntityId>,
}

impl ActivationContext {
    /// Context for `owner` with no loaded entities
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            loaded_entities: HashMap::new(),
        }
    }

    /// Register a loaded entity
    pub fn with_loaded_entity(mut self, asset_id: EntityId, runtime_id: EntityId) -> Self {
        self.loaded_entities.insert(asset_id, runtime_id);
        self
    }
}

/// Substitution function applied once over the whole graph
#[derive(Debug)]
pub struct EntityRemapper<'a> {
    internal: HashMap<Uuid, Uuid>,
    loaded: &'a HashMap<EntityId, EntityId>,
    warn_on_unmapped: bool,
    unmapped: Vec<Uuid>,
}

impl<'a> EntityRemapper<'a> {
    /// Remapper over the host's loaded entities
    pub fn new(loaded: &'a HashMap<EntityId, EntityId>, warn_on_unmapped: bool) -> Self {
        Self {
            internal: HashMap::new(),
            loaded,
            warn_on_unmapped,
            unmapped: Vec::new(),
        }
    }

    /// Add an entry to the graph's own table
    pub fn map_internal(&mut self, from: Uuid, to: Uuid) {
        self.internal.insert(from, to);
    }

    /// Runtime id for `id`
    pub fn remap(&mut self, id: Uuid) -> Uuid {
        if id.is_nil() {
            return id;
        }
        if let Some(mapped) = self.internal.get(&id) {
            return *mapped;
        }
        if let Some(mapped) = self.loaded.get(&EntityId(id)) {
            return mapped.0;
        }

        if self.warn_on_unmapped {
            tracing::warn!("Entity id {} is not known to the remap table; keeping it", id);
        }
        self.unmapped.push(id);
        id
    }

    /// Ids that passed through unchanged because nothing knew them
    pub fn unmapped(&self) -> &[Uuid] {
        &self.unmapped
    }
}
