// SPDX-License-Identifier: MIT OR Apache-2.0
//! Start and error-handler nodes.

use crate::data::{DataType, Datum};
use crate::execution::{ExecutionScope, NodeError};
use crate::ids::NodeId;
use crate::node::{EntryPoint, ErrorHandlerCapability, NodeLogic};
use crate::slot::SlotConfig;
use uuid::Uuid;

/// Entry point pushed onto the execution stack when the graph activates
#[derive(Debug, Clone, Copy, Default)]
pub struct Start;

impl Start {
    /// Execution output fired on start
    pub const OUT: &'static str = "Out";
}

impl NodeLogic for Start {
    fn type_name(&self) -> &str {
        "Start"
    }

    fn slots(&self) -> Vec<SlotConfig> {
        vec![SlotConfig::execution_out(Self::OUT).with_tool_tip("Signaled when the graph starts")]
    }

    fn entry_point(&self) -> Option<EntryPoint> {
        Some(EntryPoint::Start)
    }

    fn execute(&mut self, scope: &mut ExecutionScope<'_>) -> Result<(), NodeError> {
        scope.signal(Self::OUT)
    }
}

/// Receives runtime errors raised by other nodes.
///
/// With no sources it handles errors from the whole graph.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    capability: ErrorHandlerCapability,
}

impl ErrorHandler {
    /// Execution output fired when an error arrives
    pub const OUT: &'static str = "Out";
    /// Data output carrying the error message
    pub const ERROR: &'static str = "Error";

    /// Handler for every node in the graph
    pub fn catch_all() -> Self {
        Self::default()
    }

    /// Handler for the listed nodes only
    pub fn for_sources(sources: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            capability: ErrorHandlerCapability {
                sources: sources.into_iter().collect(),
            },
        }
    }

    /// Nodes this handler listens to
    pub fn sources(&self) -> &[NodeId] {
        &self.capability.sources
    }
}

impl NodeLogic for ErrorHandler {
    fn type_name(&self) -> &str {
        "ErrorHandler"
    }

    fn slots(&self) -> Vec<SlotConfig> {
        vec![
            SlotConfig::execution_out(Self::OUT),
            SlotConfig::data_out(Self::ERROR, DataType::String),
        ]
    }

    fn as_error_handler(&self) -> Option<&ErrorHandlerCapability> {
        Some(&self.capability)
    }

    fn remap_ids(&mut self, remapper: &mut dyn FnMut(Uuid) -> Uuid) {
        for source in &mut self.capability.sources {
            *source = NodeId(remapper(source.0));
        }
    }

    fn execute(&mut self, scope: &mut ExecutionScope<'_>) -> Result<(), NodeError> {
        let message = scope.error().unwrap_or_default().to_string();
        scope.set_output(Self::ERROR, Datum::String(message))?;
        scope.signal(Self::OUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn test_start_is_entry_point() {
        let node = Node::new("Start", Start);
        assert!(node.is_entry_point());
        assert!(node.slot_by_name(Start::OUT).is_some_and(|slot| slot.is_execution()));
        assert!(node.logic().as_error_handler().is_none());
    }

    #[test]
    fn test_error_handler_sources() {
        let source = NodeId::new();
        let mut handler = ErrorHandler::for_sources([source]);
        assert_eq!(handler.sources(), &[source]);

        let replacement = NodeId::new();
        handler.remap_ids(&mut |id| if id == source.0 { replacement.0 } else { id });
        assert_eq!(handler.sources(), &[replacement]);
        assert!(ErrorHandler::catch_all().sources().is_empty());
    }
}
