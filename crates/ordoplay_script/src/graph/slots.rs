// SPDX-License-Identifier: MIT OR Apache-2.0
//! Literal values, variable references and dynamic display types on slots.

use super::Graph;
use crate::data::Datum;
use crate::endpoint::Endpoint;
use crate::ids::{SlotId, VariableId};
use crate::slot::{Slot, SlotError};
use crate::variable::VariableSource;

impl Graph {
    /// Bind a literal to a data slot, resolving its dynamic type
    pub fn set_slot_value(&mut self, endpoint: Endpoint, value: Datum) -> Result<(), SlotError> {
        let node = self
            .nodes
            .get_mut(&endpoint.node_id)
            .ok_or(SlotError::UnknownEndpoint(endpoint))?;
        let changed = node.set_slot_value(endpoint.slot_id, value)?;
        self.emit_display_changes(endpoint.node_id, changed);
        self.flush_events();
        Ok(())
    }

    /// Switch a slot to reference mode. Connected slots cannot switch.
    pub fn convert_slot_to_reference(&mut self, endpoint: Endpoint) -> Result<(), SlotError> {
        let is_connected = self.is_endpoint_connected(&endpoint);
        let slot = self.slot_mut(&endpoint)?;
        if slot.convert_to_reference(is_connected) {
            Ok(())
        } else if is_connected {
            Err(SlotError::Connected(slot.name().to_string()))
        } else {
            Err(SlotError::NotConvertible(slot.name().to_string()))
        }
    }

    /// Switch a slot back to value mode, dropping its variable
    pub fn convert_slot_to_value(&mut self, endpoint: Endpoint) -> Result<(), SlotError> {
        let slot = self.slot_mut(&endpoint)?;
        if !slot.convert_to_value() {
            return Err(SlotError::NotConvertible(slot.name().to_string()));
        }
        self.sanity_check_dynamic_display(endpoint);
        self.flush_events();
        Ok(())
    }

    /// Bind a slot to a graph variable.
    ///
    /// The slot is converted to reference mode if needed. The variable's type
    /// must match the slot and its dynamic group; a dynamic slot adopts it.
    pub fn set_slot_variable_reference(&mut self, endpoint: Endpoint, variable_id: VariableId) -> Result<(), SlotError> {
        let is_connected = self.is_endpoint_connected(&endpoint);
        let variable_type = self
            .variables
            .find_variable_by_id(variable_id)
            .ok_or(SlotError::VariableNotFound(variable_id))?
            .data_type();

        let node = self
            .nodes
            .get_mut(&endpoint.node_id)
            .ok_or(SlotError::UnknownEndpoint(endpoint))?;
        let slot = node
            .slot(endpoint.slot_id)
            .ok_or(SlotError::UnknownEndpoint(endpoint))?;

        if !slot.is_variable_reference() && !slot.can_convert_to_reference(is_connected) {
            return Err(if is_connected {
                SlotError::Connected(slot.name().to_string())
            } else {
                SlotError::NotConvertible(slot.name().to_string())
            });
        }
        if let Some(data_type) = &variable_type {
            if let Some(group) = slot.dynamic_group() {
                node.is_valid_type_for_group(group, data_type)
                    .map_err(SlotError::TypeMismatch)?;
            }
            slot.is_type_match_for(data_type)
                .map_err(SlotError::TypeMismatch)?;
        }

        let changed = match &variable_type {
            Some(data_type) => node.resolve_dynamic_slot(endpoint.slot_id, data_type),
            None => Vec::new(),
        };
        let node_name = node.name().to_string();
        if let Some(slot) = node.slot_mut(endpoint.slot_id) {
            slot.convert_to_reference(is_connected);
            slot.set_variable_reference_id(variable_id);
            slot.initialize_variables(&self.variables, &node_name)?;
        }

        self.emit_display_changes(endpoint.node_id, changed);
        self.flush_events();
        Ok(())
    }

    /// Unbind a slot's variable while keeping it in reference mode
    pub fn clear_slot_variable_reference(&mut self, endpoint: Endpoint) -> Result<(), SlotError> {
        let slot = self.slot_mut(&endpoint)?;
        if !slot.is_variable_reference() {
            return Err(SlotError::NotConvertible(slot.name().to_string()));
        }
        slot.set_variable_reference_id(VariableId::nil());
        self.sanity_check_dynamic_display(endpoint);
        self.flush_events();
        Ok(())
    }

    fn slot_mut(&mut self, endpoint: &Endpoint) -> Result<&mut Slot, SlotError> {
        self.nodes
            .get_mut(&endpoint.node_id)
            .and_then(|node| node.slot_mut(endpoint.slot_id))
            .ok_or(SlotError::UnknownEndpoint(*endpoint))
    }

    /// Give `target` the concrete type of `from` if `target` is dynamic and
    /// still unresolved
    pub(super) fn adopt_display_type(&mut self, target: Endpoint, from: Endpoint) {
        let Some(data_type) = self
            .find_slot(&from)
            .filter(|slot| slot.is_data())
            .and_then(Slot::data_type)
            .cloned()
        else {
            return;
        };
        let Some(node) = self.nodes.get_mut(&target.node_id) else {
            return;
        };
        let changed = node.resolve_dynamic_slot(target.slot_id, &data_type);
        self.emit_display_changes(target.node_id, changed);
    }

    /// Clear the display type of a dynamic slot's group once nothing anchors
    /// it: no member is connected or bound to an existing variable
    pub(super) fn sanity_check_dynamic_display(&mut self, endpoint: Endpoint) {
        let Some(node) = self.nodes.get(&endpoint.node_id) else {
            return;
        };
        let Some(slot) = node.slot(endpoint.slot_id) else {
            return;
        };
        if !slot.is_dynamic() || !slot.has_display_type() {
            return;
        }

        let members: Vec<SlotId> = match slot.dynamic_group() {
            Some(group) => node.slots_in_group(group).map(Slot::id).collect(),
            None => vec![slot.id()],
        };
        let anchored = members.iter().any(|slot_id| {
            let member = Endpoint::new(endpoint.node_id, *slot_id);
            self.is_endpoint_connected(&member)
                || node
                    .slot(*slot_id)
                    .and_then(Slot::variable_reference)
                    .is_some_and(|variable| self.variables.find_variable_by_id(variable).is_some())
        });
        if anchored {
            return;
        }

        let Some(node) = self.nodes.get_mut(&endpoint.node_id) else {
            return;
        };
        let changed: Vec<SlotId> = members
            .into_iter()
            .filter(|slot_id| node.set_slot_display_type(*slot_id, None))
            .collect();
        self.emit_display_changes(endpoint.node_id, changed);
    }
}
