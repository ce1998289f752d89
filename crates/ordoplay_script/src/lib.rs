// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual scripting graph core for `OrdoPlay`.
//!
//! A script graph is a set of nodes exposing typed slots, joined by
//! connections. This crate keeps that structure consistent while it is
//! edited and turns it into a running instance:
//! - Connection validation through per-slot contracts
//! - Dynamic slot types resolved from connections, literals and variables
//! - Data-flow checks against the execution order
//! - Activation with entity id remapping, entry points and error handlers
//! - Stack-driven execution
//!
//! ## Architecture
//!
//! [`Graph`] owns nodes and connections and maintains an adjacency index
//! over their endpoints. Node behavior lives behind the [`NodeLogic`] trait;
//! the graph talks to it only through capability methods.

pub mod config;
pub mod connection;
pub mod contract;
pub mod data;
pub mod endpoint;
pub mod events;
pub mod execution;
pub mod graph;
pub mod ids;
pub mod node;
pub mod nodes;
pub mod remap;
pub mod slot;
pub mod validation;
pub mod variable;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, EngineConfig};
pub use connection::Connection;
pub use contract::Contract;
pub use data::{DataType, Datum, DynamicDataType};
pub use endpoint::Endpoint;
pub use events::{GraphEvent, GraphObserver};
pub use execution::{ExecutionError, ExecutionScope, NodeError};
pub use graph::{ConnectionError, Graph, GraphData, GraphError, GraphState};
pub use ids::{AssetId, ConnectionId, EntityId, GraphId, NodeId, SlotId, VariableId};
pub use node::{Node, NodeLogic};
pub use remap::ActivationContext;
pub use slot::{Slot, SlotConfig, SlotDescriptor};
pub use validation::{ValidationEvent, ValidationResults};
pub use variable::{GraphVariable, VariableManager};
