// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slots: typed, directional connection points owned by a node.
//!
//! A slot is either an execution slot (control flow) or a data slot. Data
//! slots have a hard type, or are dynamically typed and resolve a concrete
//! display type when they are connected or bound. A data slot holds a literal
//! value, or refers to a graph variable instead.

use crate::contract::{ConnectionLimitContract, Contract, SlotTypeContract};
use crate::data::{matches_dynamic_data_type, DataType, Datum, DynamicDataType, Outcome};
use crate::endpoint::Endpoint;
use crate::ids::{NodeId, SlotId, VariableId};
use crate::node::Node;
use crate::variable::VariableSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Control flow or data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Execution flow
    Execution,
    /// Data flow
    Data,
}

/// Slot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotDirection {
    /// Input slot
    Input,
    /// Output slot
    Output,
}

/// Kind and direction of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotDescriptor {
    /// Execution or data
    pub connection_type: ConnectionType,
    /// Input or output
    pub direction: SlotDirection,
}

impl SlotDescriptor {
    /// Execution input
    pub const fn execution_in() -> Self {
        Self {
            connection_type: ConnectionType::Execution,
            direction: SlotDirection::Input,
        }
    }

    /// Execution output
    pub const fn execution_out() -> Self {
        Self {
            connection_type: ConnectionType::Execution,
            direction: SlotDirection::Output,
        }
    }

    /// Data input
    pub const fn data_in() -> Self {
        Self {
            connection_type: ConnectionType::Data,
            direction: SlotDirection::Input,
        }
    }

    /// Data output
    pub const fn data_out() -> Self {
        Self {
            connection_type: ConnectionType::Data,
            direction: SlotDirection::Output,
        }
    }

    /// Execution slot
    pub fn is_execution(&self) -> bool {
        self.connection_type == ConnectionType::Execution
    }

    /// Data slot
    pub fn is_data(&self) -> bool {
        self.connection_type == ConnectionType::Data
    }

    /// Input slot
    pub fn is_input(&self) -> bool {
        self.direction == SlotDirection::Input
    }

    /// Output slot
    pub fn is_output(&self) -> bool {
        self.direction == SlotDirection::Output
    }

    /// Same connection type, opposite direction
    pub fn can_connect_to(&self, other: &SlotDescriptor) -> bool {
        self.connection_type == other.connection_type && self.direction != other.direction
    }
}

impl fmt::Display for SlotDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.connection_type {
            ConnectionType::Execution => "Execution",
            ConnectionType::Data => "Data",
        };
        let direction = match self.direction {
            SlotDirection::Input => "In",
            SlotDirection::Output => "Out",
        };
        write!(f, "{kind} {direction}")
    }
}

/// What a slot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotDataKind {
    /// Execution slot
    #[default]
    NoData,
    /// Data slot
    Data,
    /// Data slot that only ever refers to a variable
    VariableReference,
}

/// Name of a set of dynamic slots that must resolve to one concrete type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicGroup(pub String);

impl DynamicGroup {
    /// Create a group
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Errors from slot binding and reference conversion
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    /// Endpoint does not resolve to a slot
    #[error("Endpoint {0} does not resolve to a slot")]
    UnknownEndpoint(Endpoint),

    /// Slot cannot switch between value and reference mode
    #[error("Slot '{0}' cannot be converted between value and reference")]
    NotConvertible(String),

    /// Reference slots cannot also carry connections
    #[error("Slot '{0}' is connected and cannot refer to a variable")]
    Connected(String),

    /// Referenced variable does not exist
    #[error("Variable not found: {0}")]
    VariableNotFound(VariableId),

    /// Offered type or value was rejected
    #[error("{0}")]
    TypeMismatch(String),
}

/// Construction parameters for a slot
#[derive(Debug)]
pub struct SlotConfig {
    /// Slot id
    pub id: SlotId,
    /// Display name
    pub name: String,
    /// Tooltip
    pub tool_tip: String,
    /// Kind and direction
    pub descriptor: SlotDescriptor,
    /// Declared type (data slots with a hard type)
    pub data_type: Option<DataType>,
    /// Dynamic typing rule
    pub dynamic_data_type: DynamicDataType,
    /// Dynamic group
    pub dynamic_group: Option<DynamicGroup>,
    /// Latent execution output
    pub is_latent: bool,
    /// Only refers to variables
    pub is_reference_only: bool,
    /// Initial literal value
    pub default_value: Option<Datum>,
    /// Extra contracts
    pub contracts: Vec<Box<dyn Contract>>,
}

impl SlotConfig {
    fn base(name: impl Into<String>, descriptor: SlotDescriptor) -> Self {
        Self {
            id: SlotId::new(),
            name: name.into(),
            tool_tip: String::new(),
            descriptor,
            data_type: None,
            dynamic_data_type: DynamicDataType::None,
            dynamic_group: None,
            is_latent: false,
            is_reference_only: false,
            default_value: None,
            contracts: Vec::new(),
        }
    }

    /// Execution input
    pub fn execution_in(name: impl Into<String>) -> Self {
        Self::base(name, SlotDescriptor::execution_in())
    }

    /// Execution output
    pub fn execution_out(name: impl Into<String>) -> Self {
        Self::base(name, SlotDescriptor::execution_out())
    }

    /// Execution output that fires asynchronously
    pub fn latent_out(name: impl Into<String>) -> Self {
        let mut config = Self::base(name, SlotDescriptor::execution_out());
        config.is_latent = true;
        config
    }

    /// Data input with a hard type
    pub fn data_in(name: impl Into<String>, data_type: DataType) -> Self {
        let mut config = Self::base(name, SlotDescriptor::data_in());
        config.data_type = Some(data_type);
        config
    }

    /// Data output with a hard type
    pub fn data_out(name: impl Into<String>, data_type: DataType) -> Self {
        let mut config = Self::base(name, SlotDescriptor::data_out());
        config.data_type = Some(data_type);
        config
    }

    /// Dynamically typed data input
    pub fn dynamic_in(name: impl Into<String>, dynamic: DynamicDataType) -> Self {
        let mut config = Self::base(name, SlotDescriptor::data_in());
        config.dynamic_data_type = dynamic;
        config
    }

    /// Dynamically typed data output
    pub fn dynamic_out(name: impl Into<String>, dynamic: DynamicDataType) -> Self {
        let mut config = Self::base(name, SlotDescriptor::data_out());
        config.dynamic_data_type = dynamic;
        config
    }

    /// Use a specific id
    pub fn with_id(mut self, id: SlotId) -> Self {
        self.id = id;
        self
    }

    /// Set the tooltip
    pub fn with_tool_tip(mut self, tool_tip: impl Into<String>) -> Self {
        self.tool_tip = tool_tip.into();
        self
    }

    /// Put the slot in a dynamic group
    pub fn with_group(mut self, group: DynamicGroup) -> Self {
        self.dynamic_group = Some(group);
        self
    }

    /// Set the initial literal value
    pub fn with_default(mut self, value: Datum) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Slot only ever refers to a variable
    pub fn reference_only(mut self) -> Self {
        self.is_reference_only = true;
        self
    }

    /// Attach a contract
    pub fn with_contract(mut self, contract: impl Contract + 'static) -> Self {
        self.contracts.push(Box::new(contract));
        self
    }
}

/// A connection point on a node
#[derive(Debug)]
pub struct Slot {
    id: SlotId,
    node_id: NodeId,
    name: String,
    tool_tip: String,
    descriptor: SlotDescriptor,
    data_kind: SlotDataKind,
    declared_type: Option<DataType>,
    dynamic_data_type: DynamicDataType,
    dynamic_group: Option<DynamicGroup>,
    display_type: Option<DataType>,
    is_variable_reference: bool,
    variable_reference: VariableId,
    variable_resolved: bool,
    is_latent: bool,
    datum: Option<Datum>,
    contracts: Vec<Box<dyn Contract>>,
}

impl Slot {
    /// Create a slot owned by `node_id`
    pub fn new(config: SlotConfig, node_id: NodeId) -> Self {
        let SlotConfig {
            id,
            name,
            tool_tip,
            descriptor,
            data_type,
            dynamic_data_type,
            dynamic_group,
            is_latent,
            is_reference_only,
            default_value,
            contracts: extra_contracts,
        } = config;

        let mut contracts: Vec<Box<dyn Contract>> = vec![Box::new(SlotTypeContract)];
        if descriptor.is_data() && descriptor.is_input() {
            contracts.push(Box::new(ConnectionLimitContract::single()));
        }
        contracts.extend(extra_contracts);

        let data_kind = match (descriptor.is_data(), is_reference_only) {
            (false, _) => SlotDataKind::NoData,
            (true, false) => SlotDataKind::Data,
            (true, true) => SlotDataKind::VariableReference,
        };

        let datum = default_value.or_else(|| {
            if descriptor.is_data() && descriptor.is_input() {
                data_type.as_ref().map(Datum::default_for)
            } else {
                None
            }
        });

        Self {
            id,
            node_id,
            name,
            tool_tip,
            descriptor,
            data_kind,
            declared_type: data_type,
            dynamic_data_type,
            dynamic_group,
            display_type: None,
            is_variable_reference: false,
            variable_reference: VariableId::nil(),
            variable_resolved: false,
            is_latent: is_latent && descriptor.is_execution() && descriptor.is_output(),
            datum,
            contracts,
        }
    }

    /// Slot id
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Owning node
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub(crate) fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
    }

    /// Endpoint naming this slot
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.node_id, self.id)
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the slot; returns whether the name changed
    pub fn rename(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.name == name {
            return false;
        }
        self.name = name;
        true
    }

    /// Tooltip
    pub fn tool_tip(&self) -> &str {
        &self.tool_tip
    }

    /// Kind and direction
    pub fn descriptor(&self) -> &SlotDescriptor {
        &self.descriptor
    }

    /// What the slot carries
    pub fn data_kind(&self) -> SlotDataKind {
        self.data_kind
    }

    /// Execution slot
    pub fn is_execution(&self) -> bool {
        self.descriptor.is_execution()
    }

    /// Data slot
    pub fn is_data(&self) -> bool {
        self.descriptor.is_data()
    }

    /// Input slot
    pub fn is_input(&self) -> bool {
        self.descriptor.is_input()
    }

    /// Output slot
    pub fn is_output(&self) -> bool {
        self.descriptor.is_output()
    }

    /// Latent execution output
    pub fn is_latent(&self) -> bool {
        self.is_latent
    }

    /// Mark an execution output as latent; other slots are left alone
    pub fn convert_to_latent_execution_out(&mut self) {
        if self.is_execution() && self.is_output() {
            self.is_latent = true;
        }
    }

    /// Attached contracts, in evaluation order
    pub fn contracts(&self) -> &[Box<dyn Contract>] {
        &self.contracts
    }

    /// Attach a contract
    pub fn add_contract(&mut self, contract: Box<dyn Contract>) {
        self.contracts.push(contract);
    }

    /// Dynamic typing rule
    pub fn dynamic_data_type(&self) -> DynamicDataType {
        self.dynamic_data_type
    }

    /// Whether the concrete type is resolved at bind time
    pub fn is_dynamic(&self) -> bool {
        self.dynamic_data_type != DynamicDataType::None
    }

    /// Upgrade a hard-typed slot to a dynamic one. Only applies once.
    pub fn set_dynamic_data_type(&mut self, dynamic: DynamicDataType) {
        if self.dynamic_data_type == DynamicDataType::None {
            self.dynamic_data_type = dynamic;
        }
    }

    /// Dynamic group, if any
    pub fn dynamic_group(&self) -> Option<&DynamicGroup> {
        self.dynamic_group.as_ref()
    }

    /// Move the slot to another dynamic group
    pub fn set_dynamic_group(&mut self, group: Option<DynamicGroup>) {
        self.dynamic_group = group;
    }

    /// Resolved concrete type of a dynamic slot
    pub fn display_type(&self) -> Option<&DataType> {
        self.display_type.as_ref()
    }

    /// Whether a display type has been resolved
    pub fn has_display_type(&self) -> bool {
        self.display_type.is_some()
    }

    /// Effective type: the display type for dynamic slots, the declared type otherwise
    pub fn data_type(&self) -> Option<&DataType> {
        if self.is_dynamic() {
            self.display_type.as_ref()
        } else {
            self.declared_type.as_ref()
        }
    }

    /// Current literal value
    pub fn datum(&self) -> Option<&Datum> {
        self.datum.as_ref()
    }

    pub(crate) fn datum_mut(&mut self) -> Option<&mut Datum> {
        self.datum.as_mut()
    }

    pub(crate) fn set_datum(&mut self, datum: Option<Datum>) {
        self.datum = datum;
    }

    /// Commit the concrete type of the slot. Returns whether anything changed.
    ///
    /// A dynamic slot refuses a type of the wrong shape (container vs value).
    /// Dynamic inputs also re-seat their literal to a default of the new type,
    /// or drop it when the type is cleared.
    pub fn set_display_type(&mut self, display_type: Option<DataType>) -> bool {
        if self.display_type == display_type {
            return false;
        }

        if let Some(data_type) = &display_type {
            if self.is_dynamic() {
                let is_container = data_type.is_container();
                match self.dynamic_data_type {
                    DynamicDataType::Value if is_container => return false,
                    DynamicDataType::Container if !is_container => return false,
                    _ => {}
                }
            }
        }

        self.display_type = display_type;

        if self.is_dynamic() && self.is_input() {
            match &self.display_type {
                Some(data_type) => {
                    let keep = self
                        .datum
                        .as_ref()
                        .is_some_and(|datum| datum.is_type(data_type));
                    if !keep {
                        self.datum = Some(Datum::default_for(data_type));
                    }
                }
                None => self.datum = None,
            }
        }

        true
    }

    /// Clear the display type of a dynamic slot
    pub fn clear_display_type(&mut self) -> bool {
        if self.is_dynamic() {
            self.set_display_type(None)
        } else {
            false
        }
    }

    /// Check whether a concrete type may flow through this slot.
    ///
    /// Order: execution slots never match; contracts; unresolved `Any`
    /// accepts everything; dynamic shape; finally nominal subtyping against
    /// the resolved type. Inputs accept values that are-a their type; outputs
    /// produce values that must be-a the requested type.
    pub fn is_type_match_for(&self, data_type: &DataType) -> Outcome {
        if self.is_execution() {
            return Err("Execution slot cannot match Data types.".to_string());
        }

        for contract in &self.contracts {
            contract.evaluate_for_type(data_type)?;
        }

        if self.dynamic_data_type == DynamicDataType::Any && !self.has_display_type() {
            return Ok(());
        }

        if self.is_dynamic() {
            matches_dynamic_data_type(self.dynamic_data_type, data_type)?;
            if !self.has_display_type() {
                return Ok(());
            }
        }

        let Some(own) = self.data_type() else {
            return Err(format!("Slot '{}' has no data type", self.name));
        };

        let matches = if self.is_input() {
            data_type.is_a(own)
        } else {
            own.is_a(data_type)
        };
        if matches {
            Ok(())
        } else {
            Err(format!("{} is not a type match for {}", own, data_type))
        }
    }

    /// Check whether this slot and `other` agree on type, including the
    /// dynamic groups of their owning nodes.
    pub fn is_type_match_for_slot(&self, own_node: &Node, other: &Slot, other_node: &Node) -> Outcome {
        let own_type = self.data_type();
        let other_type = other.data_type();

        if let Some(other_type) = other_type {
            if let Some(group) = self.dynamic_group() {
                own_node.is_valid_type_for_group(group, other_type)?;
            }
            self.is_type_match_for(other_type)?;
        }

        if let Some(own_type) = own_type {
            if let Some(group) = other.dynamic_group() {
                other_node.is_valid_type_for_group(group, own_type)?;
            }
            other.is_type_match_for(own_type)?;
        }

        let own_is_container = own_type.is_some_and(DataType::is_container) || self.is_unresolved(DynamicDataType::Container);
        let other_is_container = other_type.is_some_and(DataType::is_container) || other.is_unresolved(DynamicDataType::Container);

        self.check_container_shape(other, other_is_container)?;
        other.check_container_shape(self, own_is_container)?;

        if (self.is_dynamic() && !self.has_display_type()) || (other.is_dynamic() && !other.has_display_type()) {
            return Ok(());
        }

        match (own_type, other_type) {
            (Some(own), Some(theirs)) => {
                let matches = if self.is_output() {
                    own.is_a(theirs)
                } else {
                    theirs.is_a(own)
                };
                if matches {
                    Ok(())
                } else {
                    Err(format!("{} is not a type match for {}", own, theirs))
                }
            }
            _ => Err(format!(
                "Slots '{}' and '{}' do not both carry data",
                self.name, other.name
            )),
        }
    }

    fn is_unresolved(&self, dynamic: DynamicDataType) -> bool {
        self.is_dynamic() && !self.has_display_type() && self.dynamic_data_type == dynamic
    }

    fn check_container_shape(&self, other: &Slot, other_is_container: bool) -> Outcome {
        if !self.is_dynamic() {
            return Ok(());
        }

        match self.dynamic_data_type {
            DynamicDataType::Container if !other_is_container => {
                if other.has_display_type() || other.dynamic_data_type != DynamicDataType::Any {
                    return Err(match other.data_type() {
                        Some(theirs) => format!("{} is not a valid Container type.", theirs),
                        None => "Cannot connect Dynamic Container to Dynamic Value type.".to_string(),
                    });
                }
                Ok(())
            }
            DynamicDataType::Value if other_is_container => Err(format!(
                "{} is a Container type and not a Value type.",
                other
                    .data_type()
                    .map_or_else(|| "Dynamic Container".to_string(), DataType::name)
            )),
            _ => Ok(()),
        }
    }

    /// Whether the slot reads from (or writes to) a variable
    pub fn is_variable_reference(&self) -> bool {
        self.is_variable_reference || self.data_kind == SlotDataKind::VariableReference
    }

    /// Referenced variable, if one is set
    pub fn variable_reference(&self) -> Option<VariableId> {
        self.variable_reference.is_valid().then_some(self.variable_reference)
    }

    /// Whether the last [`Slot::initialize_variables`] found the variable
    pub fn is_variable_resolved(&self) -> bool {
        self.variable_resolved
    }

    /// Whether the slot may switch between value and reference mode.
    ///
    /// Slots typed as variable ids never can, to avoid a reference to a reference.
    pub fn can_convert_types(&self) -> bool {
        self.data_kind == SlotDataKind::Data && self.data_type() != Some(&DataType::VariableId)
    }

    /// Whether the slot may become a reference given its connection state
    pub fn can_convert_to_reference(&self, is_connected: bool) -> bool {
        self.can_convert_types() && !self.is_variable_reference && !is_connected
    }

    /// Switch to reference mode. Returns whether the slot is now a reference.
    pub fn convert_to_reference(&mut self, is_connected: bool) -> bool {
        if self.can_convert_to_reference(is_connected) {
            self.is_variable_reference = true;
        }
        self.is_variable_reference()
    }

    /// Whether the slot may return to value mode
    pub fn can_convert_to_value(&self) -> bool {
        self.can_convert_types() && self.is_variable_reference
    }

    /// Switch to value mode, dropping the reference. Returns false if the
    /// slot was not a convertible reference.
    pub fn convert_to_value(&mut self) -> bool {
        if !self.can_convert_to_value() {
            return false;
        }
        self.is_variable_reference = false;
        self.variable_reference = VariableId::nil();
        self.variable_resolved = false;
        true
    }

    pub(crate) fn set_variable_reference_id(&mut self, variable_id: VariableId) {
        self.variable_reference = variable_id;
        self.variable_resolved = false;
    }

    /// Resolve the variable reference against `variables`.
    ///
    /// A missing variable is reported and leaves the slot inert; it is not a fault.
    pub fn initialize_variables(&mut self, variables: &dyn VariableSource, node_name: &str) -> Result<(), SlotError> {
        if !self.is_variable_reference() {
            return Ok(());
        }

        if variables.find_variable_by_id(self.variable_reference).is_some() {
            self.variable_resolved = true;
            Ok(())
        } else {
            self.variable_resolved = false;
            tracing::error!(
                "Node ({}) is attempting to execute using an invalid variable reference on slot '{}'",
                node_name,
                self.name
            );
            Err(SlotError::VariableNotFound(self.variable_reference))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RestrictedTypeContract;

    fn slot(config: SlotConfig) -> Slot {
        Slot::new(config, NodeId::new())
    }

    #[test]
    fn test_descriptor_rules() {
        let exec_out = SlotDescriptor::execution_out();
        assert!(exec_out.can_connect_to(&SlotDescriptor::execution_in()));
        assert!(!exec_out.can_connect_to(&SlotDescriptor::data_in()));
        assert!(!exec_out.can_connect_to(&SlotDescriptor::execution_out()));
        assert!(SlotDescriptor::data_out().can_connect_to(&SlotDescriptor::data_in()));
        assert_eq!(SlotDescriptor::data_in().to_string(), "Data In");
    }

    #[test]
    fn test_default_contracts() {
        let input = slot(SlotConfig::data_in("Value", DataType::Int));
        assert_eq!(input.contracts().len(), 2);
        let output = slot(SlotConfig::data_out("Value", DataType::Int));
        assert_eq!(output.contracts().len(), 1);
        assert_eq!(input.datum(), Some(&Datum::Int(0)));
    }

    #[test]
    fn test_execution_never_matches_data() {
        let exec = slot(SlotConfig::execution_in("In"));
        assert!(exec.is_type_match_for(&DataType::Bool).is_err());
    }

    #[test]
    fn test_hard_type_match() {
        let input = slot(SlotConfig::data_in("Flag", DataType::Bool));
        assert!(input.is_type_match_for(&DataType::Bool).is_ok());
        let reason = input.is_type_match_for(&DataType::Float).unwrap_err();
        assert!(reason.contains("not a type match"));
    }

    #[test]
    fn test_contract_failure_wins() {
        let input = slot(
            SlotConfig::dynamic_in("Any", DynamicDataType::Any)
                .with_contract(RestrictedTypeContract::deny([DataType::String])),
        );
        assert!(input.is_type_match_for(&DataType::Int).is_ok());
        assert!(input.is_type_match_for(&DataType::String).is_err());
    }

    #[test]
    fn test_dynamic_value_rejects_containers() {
        let mut value = slot(SlotConfig::dynamic_in("Value", DynamicDataType::Value));
        let list = DataType::list(DataType::Int);
        assert!(value.is_type_match_for(&list).is_err());
        assert!(value.is_type_match_for(&DataType::Int).is_ok());

        assert!(!value.set_display_type(Some(list)));
        assert!(!value.has_display_type());
    }

    #[test]
    fn test_set_display_type_migrates_datum() {
        let mut input = slot(SlotConfig::dynamic_in("Value", DynamicDataType::Value));
        assert!(input.datum().is_none());

        assert!(input.set_display_type(Some(DataType::Float)));
        assert_eq!(input.datum(), Some(&Datum::Float(0.0)));
        assert!(!input.set_display_type(Some(DataType::Float)));

        assert!(input.set_display_type(Some(DataType::String)));
        assert_eq!(input.datum(), Some(&Datum::String(String::new())));

        assert!(input.clear_display_type());
        assert!(input.datum().is_none());
        assert!(!input.set_display_type(None));
    }

    #[test]
    fn test_resolved_dynamic_uses_display_type() {
        let mut input = slot(SlotConfig::dynamic_in("Value", DynamicDataType::Any));
        input.set_display_type(Some(DataType::Int));
        assert!(input.is_type_match_for(&DataType::Int).is_ok());
        assert!(input.is_type_match_for(&DataType::Bool).is_err());
    }

    #[test]
    fn test_reference_conversion() {
        let mut input = slot(SlotConfig::data_in("Speed", DataType::Float));
        assert!(!input.can_convert_to_reference(true));
        assert!(input.convert_to_reference(false));
        assert!(input.is_variable_reference());
        assert!(!input.can_convert_to_reference(false));

        input.set_variable_reference_id(VariableId::new());
        assert!(input.variable_reference().is_some());
        assert!(input.convert_to_value());
        assert!(input.variable_reference().is_none());
        assert!(!input.convert_to_value());
    }

    #[test]
    fn test_variable_id_slots_cannot_reference() {
        let mut input = slot(SlotConfig::data_in("Target", DataType::VariableId));
        assert!(!input.can_convert_types());
        assert!(!input.convert_to_reference(false));

        let mut exec = slot(SlotConfig::execution_in("In"));
        assert!(!exec.convert_to_reference(false));
    }

    #[test]
    fn test_latent_only_on_execution_out() {
        let mut data = slot(SlotConfig::data_out("Value", DataType::Int));
        data.convert_to_latent_execution_out();
        assert!(!data.is_latent());
        assert!(slot(SlotConfig::latent_out("Done")).is_latent());
    }

    #[test]
    fn test_rename() {
        let mut input = slot(SlotConfig::data_in("A", DataType::Int));
        assert!(input.rename("B"));
        assert!(!input.rename("B"));
        assert_eq!(input.name(), "B");
    }

    #[test]
    fn test_dynamic_upgrade_applies_once() {
        let mut input = slot(SlotConfig::data_in("Value", DataType::Int));
        input.set_dynamic_data_type(DynamicDataType::Value);
        assert_eq!(input.dynamic_data_type(), DynamicDataType::Value);
        input.set_dynamic_data_type(DynamicDataType::Container);
        assert_eq!(input.dynamic_data_type(), DynamicDataType::Value);
    }
}
