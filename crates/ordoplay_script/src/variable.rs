// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph variables and the manager that owns them.
//!
//! Slots refer to variables by id only. A variable may disappear while a
//! slot still refers to it; lookups then simply miss.

use crate::data::{DataType, Datum};
use crate::ids::VariableId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named, typed value shared across the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphVariable {
    /// Variable id
    pub id: VariableId,
    /// Unique name
    pub name: String,
    /// Current value; `None` while the type is unresolved
    pub datum: Option<Datum>,
}

impl GraphVariable {
    /// Create a variable holding `value`
    pub fn new(name: impl Into<String>, value: Datum) -> Self {
        Self {
            id: VariableId::new(),
            name: name.into(),
            datum: Some(value),
        }
    }

    /// Type of the variable, if resolved
    pub fn data_type(&self) -> Option<DataType> {
        self.datum.as_ref().map(Datum::data_type)
    }
}

/// Persisted variable set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableData {
    variables: IndexMap<VariableId, GraphVariable>,
}

impl VariableData {
    /// Variables in insertion order
    pub fn variables(&self) -> impl Iterator<Item = &GraphVariable> {
        self.variables.values()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Narrow interface the graph and slots use to reach variables
pub trait VariableSource {
    /// All variables
    fn variable_data(&self) -> &VariableData;

    /// Find a variable by name
    fn find_variable(&self, name: &str) -> Option<&GraphVariable>;

    /// Find a variable by id
    fn find_variable_by_id(&self, variable_id: VariableId) -> Option<&GraphVariable>;

    /// Type of a variable
    fn variable_type(&self, variable_id: VariableId) -> Option<DataType> {
        self.find_variable_by_id(variable_id)
            .and_then(GraphVariable::data_type)
    }

    /// Name of a variable
    fn variable_name(&self, variable_id: VariableId) -> Option<&str> {
        self.find_variable_by_id(variable_id)
            .map(|variable| variable.name.as_str())
    }

    /// Writable view of a variable's value
    fn variable_datum_mut(&mut self, variable_id: VariableId) -> Option<&mut Datum>;
}

/// Variable errors
#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    /// Name already used
    #[error("Variable name already in use: {0}")]
    NameTaken(String),

    /// Empty name
    #[error("Variable name cannot be empty")]
    EmptyName,

    /// Id already used
    #[error("Variable id already in use: {0}")]
    DuplicateId(VariableId),

    /// Unknown variable
    #[error("Variable not found: {0}")]
    NotFound(VariableId),

    /// Assigned value has the wrong type
    #[error("Variable '{name}' holds {expected}, cannot assign {found}")]
    TypeMismatch {
        /// Variable name
        name: String,
        /// Variable type
        expected: DataType,
        /// Offered type
        found: DataType,
    },
}

/// Owns the graph's variables
#[derive(Debug, Clone, Default)]
pub struct VariableManager {
    data: VariableData,
}

impl VariableManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager over persisted data
    pub fn from_data(data: VariableData) -> Self {
        Self { data }
    }

    /// Persisted form
    pub fn data(&self) -> &VariableData {
        &self.data
    }

    /// Whether `name` is free
    pub fn is_name_available(&self, name: &str) -> bool {
        !self.data.variables.values().any(|variable| variable.name == name)
    }

    /// Add a variable with a unique name
    pub fn add_variable(&mut self, name: impl Into<String>, value: Datum) -> Result<VariableId, VariableError> {
        self.insert(GraphVariable::new(name, value))
    }

    /// Add a prepared variable
    pub fn insert(&mut self, variable: GraphVariable) -> Result<VariableId, VariableError> {
        if variable.name.is_empty() {
            return Err(VariableError::EmptyName);
        }
        if self.data.variables.contains_key(&variable.id) {
            return Err(VariableError::DuplicateId(variable.id));
        }
        if !self.is_name_available(&variable.name) {
            return Err(VariableError::NameTaken(variable.name));
        }
        let id = variable.id;
        self.data.variables.insert(id, variable);
        Ok(id)
    }

    /// Remove a variable
    pub fn remove_variable(&mut self, variable_id: VariableId) -> Option<GraphVariable> {
        self.data.variables.shift_remove(&variable_id)
    }

    /// Remove every variable called `name`, returning how many went
    pub fn remove_variable_by_name(&mut self, name: &str) -> usize {
        let before = self.data.variables.len();
        self.data.variables.retain(|_, variable| variable.name != name);
        before - self.data.variables.len()
    }

    /// Rename a variable
    pub fn rename_variable(&mut self, variable_id: VariableId, name: impl Into<String>) -> Result<(), VariableError> {
        let name = name.into();
        if name.is_empty() {
            return Err(VariableError::EmptyName);
        }
        let current = self
            .data
            .variables
            .get(&variable_id)
            .ok_or(VariableError::NotFound(variable_id))?;
        if current.name == name {
            return Ok(());
        }
        if !self.is_name_available(&name) {
            return Err(VariableError::NameTaken(name));
        }
        if let Some(variable) = self.data.variables.get_mut(&variable_id) {
            variable.name = name;
        }
        Ok(())
    }

    /// Assign a value of the variable's type
    pub fn set_variable_value(&mut self, variable_id: VariableId, value: Datum) -> Result<(), VariableError> {
        let variable = self
            .data
            .variables
            .get_mut(&variable_id)
            .ok_or(VariableError::NotFound(variable_id))?;

        if let Some(expected) = variable.data_type() {
            let found = value.data_type();
            if !found.is_a(&expected) {
                return Err(VariableError::TypeMismatch {
                    name: variable.name.clone(),
                    expected,
                    found,
                });
            }
        }
        variable.datum = Some(value);
        Ok(())
    }

    /// First variable of `data_type` not in `excluded`
    pub fn find_first_variable_with_type(
        &self,
        data_type: &DataType,
        excluded: &HashSet<VariableId>,
    ) -> Option<&GraphVariable> {
        self.data.variables.values().find(|variable| {
            !excluded.contains(&variable.id) && variable.data_type().as_ref() == Some(data_type)
        })
    }

    /// Variables in insertion order
    pub fn variables(&self) -> impl Iterator<Item = &GraphVariable> {
        self.data.variables()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut GraphVariable> {
        self.data.variables.values_mut()
    }
}

impl VariableSource for VariableManager {
    fn variable_data(&self) -> &VariableData {
        &self.data
    }

    fn find_variable(&self, name: &str) -> Option<&GraphVariable> {
        self.data.variables.values().find(|variable| variable.name == name)
    }

    fn find_variable_by_id(&self, variable_id: VariableId) -> Option<&GraphVariable> {
        self.data.variables.get(&variable_id)
    }

    fn variable_datum_mut(&mut self, variable_id: VariableId) -> Option<&mut Datum> {
        self.data
            .variables
            .get_mut(&variable_id)
            .and_then(|variable| variable.datum.as_mut())
    }
}
