// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data types and literal values that flow through data slots.

use crate::ids::{EntityId, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Success, or a human-readable reason for failure.
///
/// Type matching and contracts report through this so the reason can be
/// surfaced to whoever proposed the connection or binding.
pub type Outcome = Result<(), String>;

/// A reflected object type with its ancestry.
///
/// `lineage` lists the base type names, nearest first. Nominal subtyping
/// ([`DataType::is_a`]) walks it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectType {
    /// Type name
    pub name: String,
    /// Base type names, nearest first
    pub lineage: Vec<String>,
}

impl ObjectType {
    /// Create a root object type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lineage: Vec::new(),
        }
    }

    /// Create a type deriving from `base`, inheriting its lineage
    pub fn derived(name: impl Into<String>, base: &ObjectType) -> Self {
        let mut lineage = Vec::with_capacity(base.lineage.len() + 1);
        lineage.push(base.name.clone());
        lineage.extend(base.lineage.iter().cloned());
        Self {
            name: name.into(),
            lineage,
        }
    }

    /// Whether this type is `other` or derives from it
    pub fn is_a(&self, other: &ObjectType) -> bool {
        self.name == other.name || self.lineage.iter().any(|base| *base == other.name)
    }
}

/// Concrete type of a data slot, variable or value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Entity reference
    Entity,
    /// Reference to a graph variable
    VariableId,
    /// Ordered container
    List(Box<DataType>),
    /// Associative container
    Map(Box<DataType>, Box<DataType>),
    /// Reflected object
    Object(ObjectType),
}

impl DataType {
    /// Shorthand for a list of `element`
    pub fn list(element: DataType) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for a map from `key` to `value`
    pub fn map(key: DataType, value: DataType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Whether values of this type hold other values
    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(..))
    }

    /// Nominal subtyping: exact match, or an object type deriving from `other`.
    ///
    /// Containers are invariant in their element types.
    pub fn is_a(&self, other: &DataType) -> bool {
        match (self, other) {
            (Self::Object(mine), Self::Object(theirs)) => mine.is_a(theirs),
            _ => self == other,
        }
    }

    /// Display name
    pub fn name(&self) -> String {
        match self {
            Self::Bool => "Boolean".to_string(),
            Self::Int => "Integer".to_string(),
            Self::Float => "Number".to_string(),
            Self::Vector2 => "Vector2".to_string(),
            Self::Vector3 => "Vector3".to_string(),
            Self::Vector4 => "Vector4".to_string(),
            Self::Color => "Color".to_string(),
            Self::String => "String".to_string(),
            Self::Entity => "EntityId".to_string(),
            Self::VariableId => "VariableId".to_string(),
            Self::List(element) => format!("List<{}>", element.name()),
            Self::Map(key, value) => format!("Map<{}, {}>", key.name(), value.name()),
            Self::Object(object) => object.name.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// How a dynamically typed slot may specialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DynamicDataType {
    /// Hard, fixed type
    #[default]
    None,
    /// Any type, container or not
    Any,
    /// Any non-container type
    Value,
    /// Any container type
    Container,
}

/// Check a concrete type against the shape a dynamic slot allows
pub fn matches_dynamic_data_type(dynamic: DynamicDataType, data_type: &DataType) -> Outcome {
    match dynamic {
        DynamicDataType::Value if data_type.is_container() => Err(format!(
            "{} is a Container type and not a Value type.",
            data_type
        )),
        DynamicDataType::Container if !data_type.is_container() => {
            Err(format!("{} is not a valid Container type.", data_type))
        }
        _ => Ok(()),
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
    /// Entity reference
    Entity(EntityId),
    /// Variable reference
    VariableId(VariableId),
    /// List of values of one element type
    List {
        /// Element type
        element: DataType,
        /// Items
        items: Vec<Datum>,
    },
    /// Key/value pairs
    Map {
        /// Key type
        key: DataType,
        /// Value type
        value: DataType,
        /// Entries in insertion order
        entries: Vec<(Datum, Datum)>,
    },
    /// Reflected object instance
    Object {
        /// Object type
        ty: ObjectType,
        /// Named fields
        fields: BTreeMap<String, Datum>,
    },
}

impl Datum {
    /// Default-constructed value of `data_type`
    pub fn default_for(data_type: &DataType) -> Self {
        match data_type {
            DataType::Bool => Self::Bool(false),
            DataType::Int => Self::Int(0),
            DataType::Float => Self::Float(0.0),
            DataType::Vector2 => Self::Vector2([0.0; 2]),
            DataType::Vector3 => Self::Vector3([0.0; 3]),
            DataType::Vector4 => Self::Vector4([0.0; 4]),
            DataType::Color => Self::Color([0.0, 0.0, 0.0, 1.0]),
            DataType::String => Self::String(String::new()),
            DataType::Entity => Self::Entity(EntityId::nil()),
            DataType::VariableId => Self::VariableId(VariableId::nil()),
            DataType::List(element) => Self::List {
                element: (**element).clone(),
                items: Vec::new(),
            },
            DataType::Map(key, value) => Self::Map {
                key: (**key).clone(),
                value: (**value).clone(),
                entries: Vec::new(),
            },
            DataType::Object(ty) => Self::Object {
                ty: ty.clone(),
                fields: BTreeMap::new(),
            },
        }
    }

    /// Type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Vector2(_) => DataType::Vector2,
            Self::Vector3(_) => DataType::Vector3,
            Self::Vector4(_) => DataType::Vector4,
            Self::Color(_) => DataType::Color,
            Self::String(_) => DataType::String,
            Self::Entity(_) => DataType::Entity,
            Self::VariableId(_) => DataType::VariableId,
            Self::List { element, .. } => DataType::list(element.clone()),
            Self::Map { key, value, .. } => DataType::map(key.clone(), value.clone()),
            Self::Object { ty, .. } => DataType::Object(ty.clone()),
        }
    }

    /// Whether this value is exactly of `data_type`
    pub fn is_type(&self, data_type: &DataType) -> bool {
        self.data_type() == *data_type
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Entity payload
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(value) => Some(*value),
            _ => None,
        }
    }
}
