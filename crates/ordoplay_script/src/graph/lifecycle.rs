// SPDX-License-Identifier: MIT OR Apache-2.0
//! Init, activation, deactivation and whole-graph validation.

use super::{Graph, GraphState};
use crate::ids::{EntityId, NodeId};
use crate::node::{EntryPoint, Node};
use crate::remap::{ActivationContext, EntityRemapper, RemapIds};
use crate::slot::SlotDescriptor;
use crate::validation::{Severity, ValidationEvent, ValidationKind, ValidationResults};
use uuid::Uuid;

impl Graph {
    /// Initialize nodes and connections, rebuild the adjacency index and
    /// resolve variable references
    pub fn init(&mut self) {
        for node in self.nodes.values_mut() {
            node.init();
        }
        for connection in self.connections.values_mut() {
            connection.init();
        }
        self.rebuild_endpoint_map();

        let variables = &self.variables;
        let mut unresolved = 0;
        for node in self.nodes.values_mut() {
            let node_name = node.name().to_string();
            for slot in node.slots_mut() {
                if slot.initialize_variables(variables, &node_name).is_err() {
                    unresolved += 1;
                }
            }
        }
        if unresolved > 0 {
            tracing::warn!(
                "Graph '{}' has {} slot(s) referencing missing variables",
                self.name,
                unresolved
            );
        }

        self.state = GraphState::Initialized;
    }

    /// Turn the graph into a running instance.
    ///
    /// Invalid connections are dropped, asset-time entity ids are replaced by
    /// runtime ids, and entry points and error handlers are registered before
    /// nodes and then connections are activated. A graph without nodes or
    /// without an entry point ends up deactivated.
    pub fn activate(&mut self, context: ActivationContext) -> GraphState {
        if self.state == GraphState::Activated {
            return self.state;
        }
        if self.state != GraphState::Initialized {
            self.init();
        }

        self.refresh_connection_validity(self.config.warn_on_connection_removal);

        if self.nodes.is_empty() {
            tracing::debug!("Graph '{}' has no nodes; nothing to activate", self.name);
            self.deactivate();
            return self.state;
        }

        self.owner = context.owner;
        self.remap_entities(&context);

        self.execution.deactivate();
        let mut starts = Vec::new();
        for node in self.nodes.values() {
            match node.logic().entry_point() {
                Some(EntryPoint::Start) => {
                    self.execution.add_entry_point(node.id());
                    starts.push(node.id());
                }
                Some(EntryPoint::External) => self.execution.add_entry_point(node.id()),
                None => {}
            }
        }
        if self.execution.entry_points().is_empty() {
            tracing::warn!("Graph '{}' has no entry point and will not run", self.name);
            self.deactivate();
            return self.state;
        }
        for start in starts.into_iter().rev() {
            self.execution.push(start);
        }

        let handlers: Vec<(NodeId, Vec<NodeId>)> = self
            .nodes
            .values()
            .filter_map(|node| {
                node.logic()
                    .as_error_handler()
                    .map(|capability| (node.id(), capability.sources.clone()))
            })
            .collect();
        for (handler, sources) in handlers {
            self.execution.add_error_handler(handler, &sources);
        }

        for node in self.nodes.values_mut() {
            node.activate();
        }
        for connection in self.connections.values_mut() {
            connection.activate();
        }
        for node in self.nodes.values_mut() {
            node.post_activate();
        }

        self.execution.activate();
        self.state = GraphState::Activated;
        tracing::info!(
            "Activated graph '{}' ({} nodes, {} connections, {} entry points)",
            self.name,
            self.nodes.len(),
            self.connections.len(),
            self.execution.entry_points().len()
        );
        self.flush_events();
        self.state
    }

    /// Stop the graph. Safe to call in any state.
    pub fn deactivate(&mut self) {
        self.execution.deactivate();
        for connection in self.connections.values_mut() {
            connection.deactivate();
        }
        for node in self.nodes.values_mut() {
            node.deactivate();
        }
        self.state = GraphState::Deactivated;
        tracing::debug!("Deactivated graph '{}'", self.name);
    }

    fn remap_entities(&mut self, context: &ActivationContext) {
        let mut remapper = EntityRemapper::new(&context.loaded_entities, self.config.warn_on_unmapped_entities);
        for node_id in self.nodes.keys() {
            remapper.map_internal(node_id.0, node_id.0);
        }
        for connection_id in self.connections.keys() {
            remapper.map_internal(connection_id.0, connection_id.0);
        }
        remapper.map_internal(EntityId::GRAPH_OWNER.0, context.owner.0);
        remapper.map_internal(EntityId::GRAPH_UNIQUE.0, self.id.0);

        {
            let mut remap = |id: Uuid| remapper.remap(id);
            for node in self.nodes.values_mut() {
                node.remap_ids(&mut remap);
            }
            for connection in self.connections.values_mut() {
                connection.remap_ids(&mut remap);
            }
            self.variables.remap_ids(&mut remap);
        }

        if !remapper.unmapped().is_empty() {
            tracing::debug!(
                "Graph '{}' kept {} unmapped entity id(s)",
                self.name,
                remapper.unmapped().len()
            );
        }
        self.rebuild_endpoint_map();
    }

    /// Collect warnings and errors about connections, nodes, variables and
    /// asset bindings. Never modifies the graph.
    pub fn validate_graph(&self) -> ValidationResults {
        let mut results = ValidationResults::new();
        self.validate_connections(&mut results);
        self.validate_nodes(&mut results);
        self.validate_variables(&mut results);
        self.validate_assets(&mut results);
        results
    }

    fn validate_connections(&self, results: &mut ValidationResults) {
        for connection in self.connections.values() {
            let source = connection.source_endpoint();
            let target = connection.target_endpoint();

            let Some(source_slot) = self.find_slot(&source) else {
                results.add(ValidationEvent::new(
                    ValidationKind::UnknownSourceEndpoint {
                        connection: connection.id(),
                        endpoint: source,
                    },
                    Severity::Error,
                    format!("Connection '{}' has an unknown source endpoint {}", connection.name(), source),
                ));
                continue;
            };
            if self.find_slot(&target).is_none() {
                results.add(ValidationEvent::new(
                    ValidationKind::UnknownTargetEndpoint {
                        connection: connection.id(),
                        endpoint: target,
                    },
                    Severity::Error,
                    format!("Connection '{}' has an unknown target endpoint {}", connection.name(), target),
                ));
                continue;
            }

            if source_slot.is_data() {
                if let Err(reason) = self.validate_data_connection(connection) {
                    results.add(ValidationEvent::new(
                        ValidationKind::ScopedDataConnection {
                            connection: connection.id(),
                        },
                        Severity::Error,
                        reason,
                    ));
                }
            }
        }
    }

    fn validate_nodes(&self, results: &mut ValidationResults) {
        for node in self.nodes.values().filter(|node| node.is_enabled()) {
            if !node.validate(results) {
                results.add(ValidationEvent::new(
                    ValidationKind::InternalValidation { node: node.id() },
                    Severity::Error,
                    format!("Node ({}) failed internal validation", node.name()),
                ));
            }

            if !node.is_entry_point() && node.logic().as_error_handler().is_none() && !self.is_node_referenced(node) {
                results.add(ValidationEvent::new(
                    ValidationKind::UnusedNode { node: node.id() },
                    Severity::Warning,
                    format!("Node ({}) will not be triggered during graph execution", node.name()),
                ));
            }
        }
    }

    /// Pure nodes are used when something reads their outputs; others when an
    /// execution input is connected.
    fn is_node_referenced(&self, node: &Node) -> bool {
        if node.is_pure_data() {
            node.slots()
                .filter(|slot| slot.descriptor().is_output())
                .any(|slot| self.is_endpoint_connected(&slot.endpoint()))
        } else {
            node.slots_by_descriptor(SlotDescriptor::execution_in())
                .any(|slot| self.is_endpoint_connected(&slot.endpoint()))
        }
    }

    fn validate_variables(&self, results: &mut ValidationResults) {
        for variable in self.variables.variables() {
            if variable.data_type().is_none() {
                results.add(ValidationEvent::new(
                    ValidationKind::InvalidVariableType { variable: variable.id },
                    Severity::Error,
                    format!("Variable ({}) has an invalid type", variable.name),
                ));
            }
        }
    }

    fn validate_assets(&self, results: &mut ValidationResults) {
        let Some(catalog) = &self.asset_catalog else {
            return;
        };
        for (node_id, binding) in &self.dependent_assets {
            let found = catalog.asset_version(binding.asset_id);
            if found == Some(binding.version) {
                continue;
            }
            let node_name = self.nodes.get(node_id).map_or("", |node| node.name());
            let description = match found {
                Some(version) => format!(
                    "Node ({}) was built against version {} of asset {}, but version {} is loaded",
                    node_name, binding.version, binding.asset_id, version
                ),
                None => format!("Node ({}) depends on missing asset {}", node_name, binding.asset_id),
            };
            results.add(ValidationEvent::new(
                ValidationKind::AssetVersionMismatch {
                    node: *node_id,
                    asset: binding.asset_id,
                    expected: binding.version,
                    found,
                },
                Severity::Error,
                description,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataType, Datum};
    use crate::ids::AssetId;
    use crate::node::{AssetBinding, EntityState, Node, NodeLogic, SlotMap};
    use crate::nodes::{ErrorHandler, FunctionNode, Start};
    use crate::slot::SlotConfig;
    use crate::test_utils::{scenario, wire};
    use crate::variable::GraphVariable;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct Broken;

    impl NodeLogic for Broken {
        fn type_name(&self) -> &str {
            "Broken"
        }

        fn validate(&self, _slots: &SlotMap, _results: &mut ValidationResults) -> bool {
            false
        }

        fn execute(&mut self, _scope: &mut crate::execution::ExecutionScope<'_>) -> Result<(), crate::execution::NodeError> {
            Ok(())
        }
    }

    #[test]
    fn test_activation_without_entry_point_deactivates() {
        let (mut graph, _, _) = scenario();
        let state = graph.activate(ActivationContext::new(EntityId::new()));
        assert_eq!(state, GraphState::Deactivated);
        assert!(graph.nodes().all(|node| node.state() != EntityState::Active));
        assert!(!graph.execution().is_active());
    }

    #[test]
    fn test_activation_of_empty_graph_deactivates() {
        let mut graph = Graph::new("Empty");
        assert_eq!(graph.activate(ActivationContext::default()), GraphState::Deactivated);
    }

    #[test]
    fn test_activation_registers_entry_points_and_handlers() {
        let (mut graph, a, b) = scenario();
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let global = graph.add_node(Node::new("OnError", ErrorHandler::catch_all())).unwrap();
        let scoped = graph
            .add_node(Node::new("OnBError", ErrorHandler::for_sources([b])))
            .unwrap();
        wire(&mut graph, a, "Out", b, "In");

        let state = graph.activate(ActivationContext::new(EntityId::new()));
        assert_eq!(state, GraphState::Activated);
        assert_eq!(graph.execution().entry_points(), &[start]);
        assert_eq!(graph.execution().stack_len(), 1);
        assert_eq!(graph.execution().error_handler_for(b), Some(scoped));
        assert_eq!(graph.execution().error_handler_for(a), Some(global));
        assert!(graph.nodes().all(|node| node.state() == EntityState::Active));
        assert!(graph.connections().all(|c| c.state() == EntityState::Active));

        graph.deactivate();
        assert_eq!(graph.state(), GraphState::Deactivated);
        assert!(graph.nodes().all(|node| node.state() == EntityState::Initialized));
    }

    #[test]
    fn test_activation_drops_out_of_scope_data_connections() {
        let (mut graph, a, b) = scenario();
        graph.add_node(Node::new("Start", Start)).unwrap();
        let out = graph.find_endpoint(a, "Out").unwrap();
        let input = graph.find_endpoint(b, "In").unwrap();
        graph.connect_by_endpoint(out, input).unwrap();
        wire(&mut graph, a, "Value", b, "Value");
        graph.disconnect_by_endpoint(out, input).unwrap();

        graph.activate(ActivationContext::default());
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_activation_remaps_entity_ids() {
        let mut graph = Graph::new("Remap");
        let asset_entity = EntityId::new();
        let runtime_entity = EntityId::new();
        let stranger = EntityId::new();
        let owner = EntityId::new();

        let target = graph
            .add_node(
                Node::new("Start", Start)
                    .with_slot(SlotConfig::data_in("Self", DataType::Entity).with_default(Datum::Entity(EntityId::GRAPH_OWNER)))
                    .with_slot(SlotConfig::data_in("Graph", DataType::Entity).with_default(Datum::Entity(EntityId::GRAPH_UNIQUE)))
                    .with_slot(SlotConfig::data_in("Door", DataType::Entity).with_default(Datum::Entity(asset_entity)))
                    .with_slot(SlotConfig::data_in("Other", DataType::Entity).with_default(Datum::Entity(stranger)))
                    .with_slot(SlotConfig::data_in("None", DataType::Entity).with_default(Datum::Entity(EntityId::nil()))),
            )
            .unwrap();
        graph
            .variables_mut()
            .insert(GraphVariable::new("Target", Datum::Entity(asset_entity)))
            .unwrap();

        let context = ActivationContext::new(owner).with_loaded_entity(asset_entity, runtime_entity);
        assert_eq!(graph.activate(context), GraphState::Activated);

        let node = graph.find_node(target).unwrap();
        let value = |name: &str| node.slot_by_name(name).and_then(|slot| slot.datum()).and_then(Datum::as_entity);
        assert_eq!(value("Self"), Some(owner));
        assert_eq!(value("Graph"), Some(EntityId(graph.id().0)));
        assert_eq!(value("Door"), Some(runtime_entity));
        assert_eq!(value("Other"), Some(stranger));
        assert_eq!(value("None"), Some(EntityId::nil()));
        assert_eq!(graph.owner(), owner);

        let variable = graph.variables().variables().next().and_then(|v| v.datum.as_ref()).and_then(Datum::as_entity);
        assert_eq!(variable, Some(runtime_entity));
    }

    #[test]
    fn test_validate_graph_reports_findings() {
        let (mut graph, a, b) = scenario();
        let broken = graph.add_node(Node::new("Broken", Broken)).unwrap();
        wire(&mut graph, a, "Value", b, "Value");
        graph
            .variables_mut()
            .insert(GraphVariable {
                id: crate::ids::VariableId::new(),
                name: "Unknown".to_string(),
                datum: None,
            })
            .unwrap();

        let results = graph.validate_graph();
        let kinds: Vec<&ValidationKind> = results.events().iter().map(|event| &event.kind).collect();
        assert!(kinds.iter().any(|kind| matches!(kind, ValidationKind::ScopedDataConnection { .. })));
        assert!(kinds.contains(&&ValidationKind::InternalValidation { node: broken }));
        assert!(kinds.contains(&&ValidationKind::UnusedNode { node: b }));
        assert!(kinds.contains(&&ValidationKind::UnusedNode { node: a }));
        assert!(kinds.iter().any(|kind| matches!(kind, ValidationKind::InvalidVariableType { .. })));
        assert!(results.events().iter().any(|event| event.description == "Node (B) will not be triggered during graph execution"));
    }

    #[test]
    fn test_asset_versions_checked_against_catalog() {
        let mut graph = Graph::new("Assets");
        let current = AssetId::new();
        let stale = AssetId::new();
        graph
            .add_node(Node::new("Fresh", FunctionNode::pure().with_asset(AssetBinding { asset_id: current, version: 3 })))
            .unwrap();
        let old = graph
            .add_node(Node::new("Old", FunctionNode::pure().with_asset(AssetBinding { asset_id: stale, version: 1 })))
            .unwrap();

        let mismatches = |results: &ValidationResults| -> Vec<ValidationKind> {
            results
                .events()
                .iter()
                .filter(|event| matches!(event.kind, ValidationKind::AssetVersionMismatch { .. }))
                .map(|event| event.kind.clone())
                .collect()
        };
        assert!(mismatches(&graph.validate_graph()).is_empty());

        graph.set_asset_catalog(HashMap::from([(current, 3), (stale, 2)]));
        assert_eq!(
            mismatches(&graph.validate_graph()),
            vec![ValidationKind::AssetVersionMismatch {
                node: old,
                asset: stale,
                expected: 1,
                found: Some(2),
            }]
        );
    }

    #[test]
    fn test_unreferenced_nodes_are_unused() {
        let mut graph = Graph::new("Unused");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let handler = graph.add_node(Node::new("OnError", ErrorHandler::catch_all())).unwrap();
        let orphan = graph
            .add_node(Node::new("Orphan", FunctionNode::pure()).with_slot(SlotConfig::execution_out("Out")))
            .unwrap();
        let lonely = graph
            .add_node(Node::new("Lonely", FunctionNode::pure()).with_slot(SlotConfig::data_out("Value", DataType::Int)))
            .unwrap();
        let read = graph
            .add_node(Node::new("Read", FunctionNode::pure()).with_slot(SlotConfig::data_out("Value", DataType::Int)))
            .unwrap();
        let sink = graph
            .add_node(
                Node::new("Sink", FunctionNode::pure())
                    .with_slot(SlotConfig::execution_in("In"))
                    .with_slot(SlotConfig::data_in("Value", DataType::Int)),
            )
            .unwrap();
        wire(&mut graph, start, Start::OUT, sink, "In");
        wire(&mut graph, read, "Value", sink, "Value");

        let results = graph.validate_graph();
        let unused: Vec<NodeId> = results
            .events()
            .iter()
            .filter_map(|event| match event.kind {
                ValidationKind::UnusedNode { node } => Some(node),
                _ => None,
            })
            .collect();
        assert!(unused.contains(&orphan));
        assert!(unused.contains(&lonely));
        assert!(!unused.contains(&start));
        assert!(!unused.contains(&handler));
        assert!(!unused.contains(&read));
        assert!(!unused.contains(&sink));
    }
}
