// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph validation events.
//!
//! Validation never aborts: findings are collected into
//! [`ValidationResults`] and the graph stays loadable.

use crate::endpoint::Endpoint;
use crate::ids::{AssetId, ConnectionId, NodeId, VariableId};
use std::collections::HashMap;
use std::fmt;

/// Source of truth for the current version of external assets
pub trait AssetCatalog: fmt::Debug {
    /// Current version of `asset`, or `None` if it does not exist
    fn asset_version(&self, asset: AssetId) -> Option<u32>;
}

impl AssetCatalog for HashMap<AssetId, u32> {
    fn asset_version(&self, asset: AssetId) -> Option<u32> {
        self.get(&asset).copied()
    }
}

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational
    Warning,
    /// The graph will misbehave at runtime
    Error,
}

/// What a finding is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationKind {
    /// A connection's source does not resolve
    UnknownSourceEndpoint {
        /// Offending connection
        connection: ConnectionId,
        /// Unresolved endpoint
        endpoint: Endpoint,
    },
    /// A connection's target does not resolve
    UnknownTargetEndpoint {
        /// Offending connection
        connection: ConnectionId,
        /// Unresolved endpoint
        endpoint: Endpoint,
    },
    /// A data connection whose consumer does not execute after its producer
    ScopedDataConnection {
        /// Offending connection
        connection: ConnectionId,
    },
    /// A node reported an internal validation failure
    InternalValidation {
        /// Offending node
        node: NodeId,
    },
    /// A node that no execution path reaches
    UnusedNode {
        /// Offending node
        node: NodeId,
    },
    /// A variable with no or an unknown type
    InvalidVariableType {
        /// Offending variable
        variable: VariableId,
    },
    /// A node bound to a different asset version than the catalog holds
    AssetVersionMismatch {
        /// Offending node
        node: NodeId,
        /// Asset
        asset: AssetId,
        /// Version the node was authored against
        expected: u32,
        /// Version the catalog reports, if the asset exists
        found: Option<u32>,
    },
    /// Finding reported by a node's own validation
    Custom {
        /// Reporting node
        node: NodeId,
    },
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    /// Kind of finding
    pub kind: ValidationKind,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub description: String,
}

impl ValidationEvent {
    /// Create an event
    pub fn new(kind: ValidationKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
        }
    }

    /// Node the event concerns, if any
    pub fn node(&self) -> Option<NodeId> {
        match self.kind {
            ValidationKind::InternalValidation { node }
            | ValidationKind::UnusedNode { node }
            | ValidationKind::AssetVersionMismatch { node, .. }
            | ValidationKind::Custom { node } => Some(node),
            _ => None,
        }
    }

    /// Connection the event concerns, if any
    pub fn connection(&self) -> Option<ConnectionId> {
        match self.kind {
            ValidationKind::UnknownSourceEndpoint { connection, .. }
            | ValidationKind::UnknownTargetEndpoint { connection, .. }
            | ValidationKind::ScopedDataConnection { connection } => Some(connection),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", label, self.description)
    }
}

/// Collected findings
#[derive(Debug, Clone, Default)]
pub struct ValidationResults {
    events: Vec<ValidationEvent>,
}

impl ValidationResults {
    /// Empty results
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event
    pub fn add(&mut self, event: ValidationEvent) {
        self.events.push(event);
    }

    /// Record a node-reported error
    pub fn add_error(&mut self, node: NodeId, description: impl Into<String>) {
        self.add(ValidationEvent::new(ValidationKind::Custom { node }, Severity::Error, description));
    }

    /// Record a node-reported warning
    pub fn add_warning(&mut self, node: NodeId, description: impl Into<String>) {
        self.add(ValidationEvent::new(ValidationKind::Custom { node }, Severity::Warning, description));
    }

    /// All events, in discovery order
    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|event| event.severity == Severity::Error)
    }

    /// Number of errors
    pub fn error_count(&self) -> usize {
        self.events.iter().filter(|event| event.severity == Severity::Error).count()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events matching `predicate`
    pub fn filter<'a>(
        &'a self,
        predicate: impl Fn(&ValidationKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ValidationEvent> + 'a {
        self.events.iter().filter(move |event| predicate(&event.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_counting() {
        let node = NodeId::new();
        let mut results = ValidationResults::new();
        assert!(results.is_empty());

        results.add_warning(node, "unused");
        assert!(!results.has_errors());

        results.add(ValidationEvent::new(
            ValidationKind::InternalValidation { node },
            Severity::Error,
            "broken",
        ));
        assert!(results.has_errors());
        assert_eq!(results.error_count(), 1);
        assert_eq!(results.events()[1].node(), Some(node));
        assert_eq!(results.events()[1].to_string(), "error: broken");
    }

    #[test]
    fn test_filter_by_kind() {
        let mut results = ValidationResults::new();
        let connection = ConnectionId::new();
        results.add(ValidationEvent::new(
            ValidationKind::ScopedDataConnection { connection },
            Severity::Error,
            "scoped",
        ));
        results.add_warning(NodeId::new(), "other");

        let scoped: Vec<_> = results
            .filter(|kind| matches!(kind, ValidationKind::ScopedDataConnection { .. }))
            .collect();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].connection(), Some(connection));
    }
}
