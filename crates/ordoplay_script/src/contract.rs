// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contracts: pluggable predicates a prospective connection must satisfy.
//!
//! Each slot carries an ordered list of contracts. When a connection is
//! proposed, the contracts of both slots run against the partner slot; when
//! a data type is offered (connection or variable binding), their
//! [`Contract::evaluate_for_type`] runs against it. The first failure wins.

use crate::data::{DataType, Outcome};
use crate::graph::Graph;
use crate::slot::Slot;
use std::fmt;

/// A rule attached to a slot
pub trait Contract: fmt::Debug {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Check a proposed connection between `slot` (which owns this contract)
    /// and `other`
    fn evaluate(&self, _slot: &Slot, _other: &Slot, _graph: &Graph) -> Outcome {
        Ok(())
    }

    /// Check a concrete data type offered to the owning slot
    fn evaluate_for_type(&self, _data_type: &DataType) -> Outcome {
        Ok(())
    }
}

/// Descriptor compatibility: execution to execution, data to data, output to input.
///
/// Attached to every slot on construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotTypeContract;

impl Contract for SlotTypeContract {
    fn name(&self) -> &'static str {
        "SlotType"
    }

    fn evaluate(&self, slot: &Slot, other: &Slot, _graph: &Graph) -> Outcome {
        if slot.descriptor().can_connect_to(other.descriptor()) {
            Ok(())
        } else {
            Err(format!(
                "{} slot '{}' cannot connect to {} slot '{}'",
                slot.descriptor(),
                slot.name(),
                other.descriptor(),
                other.name()
            ))
        }
    }
}

/// Caps the number of connections a slot may hold.
///
/// Data inputs get a limit of one when they are created.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimitContract {
    limit: usize,
}

impl ConnectionLimitContract {
    /// Allow at most `limit` connections
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Allow a single connection
    pub fn single() -> Self {
        Self::new(1)
    }

    /// Configured limit
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Contract for ConnectionLimitContract {
    fn name(&self) -> &'static str {
        "ConnectionLimit"
    }

    fn evaluate(&self, slot: &Slot, _other: &Slot, graph: &Graph) -> Outcome {
        let connected = graph.get_connected_endpoints(&slot.endpoint()).len();
        if connected >= self.limit {
            return Err(format!(
                "Slot '{}' accepts at most {} connection(s)",
                slot.name(),
                self.limit
            ));
        }
        Ok(())
    }
}

/// Whether a [`RestrictedTypeContract`] lists allowed or forbidden types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    /// Only the listed types are accepted
    Allow,
    /// The listed types are refused
    Deny,
}

/// Allow-list or deny-list of concrete types
#[derive(Debug, Clone)]
pub struct RestrictedTypeContract {
    types: Vec<DataType>,
    restriction: Restriction,
}

impl RestrictedTypeContract {
    /// Accept only `types`
    pub fn allow(types: impl IntoIterator<Item = DataType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            restriction: Restriction::Allow,
        }
    }

    /// Refuse `types`
    pub fn deny(types: impl IntoIterator<Item = DataType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            restriction: Restriction::Deny,
        }
    }
}

impl Contract for RestrictedTypeContract {
    fn name(&self) -> &'static str {
        "RestrictedType"
    }

    fn evaluate_for_type(&self, data_type: &DataType) -> Outcome {
        let listed = self.types.iter().any(|ty| data_type.is_a(ty));
        match (self.restriction, listed) {
            (Restriction::Allow, false) => Err(format!("{} is not an allowed type", data_type)),
            (Restriction::Deny, true) => Err(format!("{} is a restricted type", data_type)),
            _ => Ok(()),
        }
    }
}

/// Refuses execution connections that would loop back into the owning node
#[derive(Debug, Clone, Copy, Default)]
pub struct DisallowReentrantExecutionContract;

impl Contract for DisallowReentrantExecutionContract {
    fn name(&self) -> &'static str {
        "DisallowReentrantExecution"
    }

    fn evaluate(&self, slot: &Slot, other: &Slot, graph: &Graph) -> Outcome {
        if !slot.is_execution() || !slot.is_input() {
            return Ok(());
        }

        let own = slot.node_id();
        let upstream = other.node_id();
        if own == upstream || graph.is_execution_reachable(own, upstream) {
            return Err(format!(
                "Connecting '{}' would re-enter its node while it is executing",
                slot.name()
            ));
        }
        Ok(())
    }
}
