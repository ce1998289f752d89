// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stack-driven execution of an activated graph.
//!
//! Execution frames are popped from the context's stack; a node's fired
//! outputs push their targets. Data inputs are read from bound variables,
//! from upstream outputs (pure-data nodes are evaluated on demand), or from
//! the slot's literal.

use super::{Graph, GraphState};
use crate::data::Datum;
use crate::endpoint::Endpoint;
use crate::execution::{ExecutionError, ExecutionScope, Frame, NodeError};
use crate::ids::{NodeId, SlotId, VariableId};
use crate::slot::Slot;
use crate::variable::VariableSource;
use std::collections::{HashMap, HashSet};

impl Graph {
    /// Run whatever activation put on the stack. Returns the number of
    /// nodes executed.
    pub fn on_owner_activated(&mut self) -> Result<usize, ExecutionError> {
        self.ensure_active()?;
        self.run_stack()
    }

    /// Execute `node_id` and everything it signals
    pub fn trigger(&mut self, node_id: NodeId) -> Result<usize, ExecutionError> {
        self.ensure_active()?;
        if !self.nodes.contains_key(&node_id) {
            return Err(ExecutionError::NodeNotFound(node_id));
        }
        self.execution.push(node_id);
        self.run_stack()
    }

    /// Deliver latent signals fired since the last call
    pub fn run_pending(&mut self) -> Result<usize, ExecutionError> {
        self.ensure_active()?;
        let targets: Vec<NodeId> = self
            .execution
            .take_pending()
            .iter()
            .flat_map(|endpoint| self.get_connected_endpoints(endpoint))
            .map(|endpoint| endpoint.node_id)
            .collect();
        for target in targets.into_iter().rev() {
            self.execution.push(target);
        }
        self.run_stack()
    }

    /// Route a runtime error raised by `node` to its error handler.
    ///
    /// Without a handler the error is logged and returned.
    pub fn report_error(&mut self, node: NodeId, source: &str, message: &str) -> Result<(), ExecutionError> {
        let formatted = format!("{} - {}", source, message);
        match self
            .execution
            .error_handler_for(node)
            .filter(|handler| *handler != node)
        {
            Some(handler) => {
                tracing::debug!("Routing error from node {} to handler {}: {}", node, handler, formatted);
                self.execution.push_error(handler, formatted);
                Ok(())
            }
            None => {
                tracing::error!("{}", formatted);
                Err(ExecutionError::Unhandled {
                    node,
                    message: formatted,
                })
            }
        }
    }

    fn ensure_active(&self) -> Result<(), ExecutionError> {
        if self.state == GraphState::Activated && self.execution.is_active() {
            Ok(())
        } else {
            Err(ExecutionError::NotActive)
        }
    }

    fn run_stack(&mut self) -> Result<usize, ExecutionError> {
        let limit = self.config.max_execution_steps;
        let mut steps = 0;

        while let Some(frame) = self.execution.pop() {
            if steps >= limit {
                self.execution.clear_stack();
                tracing::error!("Graph '{}' exceeded {} execution steps; stack dropped", self.name, limit);
                return Err(ExecutionError::StepLimitExceeded(limit));
            }
            steps += 1;

            if let Err(error) = self.execute_frame(frame) {
                self.execution.clear_stack();
                return Err(error);
            }
        }
        Ok(steps)
    }

    fn execute_frame(&mut self, frame: Frame) -> Result<(), ExecutionError> {
        let Frame { node: node_id, error } = frame;
        match self.invoke(node_id, error.as_deref()) {
            Ok(signals) => {
                self.follow_signals(node_id, signals);
                Ok(())
            }
            Err(node_error) => {
                let source = self
                    .nodes
                    .get(&node_id)
                    .map_or_else(String::new, |node| node.name().to_string());
                self.report_error(node_id, &source, &node_error.to_string())
            }
        }
    }

    fn invoke(&mut self, node_id: NodeId, error: Option<&str>) -> Result<Vec<SlotId>, NodeError> {
        let Some(node) = self.nodes.get(&node_id) else {
            tracing::warn!("Node {} left graph '{}' before it could run", node_id, self.name);
            return Ok(Vec::new());
        };
        if !node.is_enabled() {
            tracing::trace!("Skipping disabled node ({})", node.name());
            return Ok(Vec::new());
        }

        let mut visiting = HashSet::from([node_id]);
        let inputs = self.gather_inputs(node_id, &mut visiting)?;
        self.run_logic(node_id, inputs, error)
    }

    /// Execute the node body and store what it produced
    fn run_logic(
        &mut self,
        node_id: NodeId,
        inputs: HashMap<SlotId, Datum>,
        error: Option<&str>,
    ) -> Result<Vec<SlotId>, NodeError> {
        let owner = self.owner;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return Ok(Vec::new());
        };

        let (slots, logic) = node.split_for_execution();
        let mut scope = ExecutionScope::new(node_id, owner, slots, inputs, error);
        logic.execute(&mut scope)?;
        let (outputs, signals) = scope.into_parts();

        for (slot_id, value) in outputs {
            let variable = node.slot(slot_id).and_then(Slot::variable_reference);
            node.store_output(slot_id, value.clone());
            if let Some(variable_id) = variable {
                self.variables
                    .set_variable_value(variable_id, value)
                    .map_err(|error| NodeError::failed(error.to_string()))?;
            }
        }
        Ok(signals)
    }

    fn follow_signals(&mut self, node_id: NodeId, signals: Vec<SlotId>) {
        let mut targets = Vec::new();
        for slot_id in signals {
            let endpoint = Endpoint::new(node_id, slot_id);
            if self.find_slot(&endpoint).is_some_and(Slot::is_latent) {
                self.execution.defer(endpoint);
                continue;
            }
            targets.extend(
                self.get_connected_endpoints(&endpoint)
                    .into_iter()
                    .map(|target| target.node_id),
            );
        }
        for target in targets.into_iter().rev() {
            self.execution.push(target);
        }
    }

    fn gather_inputs(
        &mut self,
        node_id: NodeId,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<HashMap<SlotId, Datum>, NodeError> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Ok(HashMap::new());
        };
        let plan: Vec<(SlotId, Option<VariableId>, Option<Datum>)> = node
            .slots()
            .filter(|slot| slot.is_data() && slot.is_input())
            .map(|slot| (slot.id(), slot.variable_reference(), slot.datum().cloned()))
            .collect();

        let mut inputs = HashMap::new();
        for (slot_id, variable, literal) in plan {
            let value = match variable {
                Some(variable_id) => self
                    .variables
                    .find_variable_by_id(variable_id)
                    .and_then(|variable| variable.datum.clone()),
                None => match self.get_connected_endpoints(&Endpoint::new(node_id, slot_id)).first() {
                    Some(upstream) => self.pull(*upstream, visiting)?,
                    None => literal,
                },
            };
            if let Some(value) = value {
                inputs.insert(slot_id, value);
            }
        }
        Ok(inputs)
    }

    /// Current value of an upstream output, evaluating pure-data nodes first
    fn pull(&mut self, upstream: Endpoint, visiting: &mut HashSet<NodeId>) -> Result<Option<Datum>, NodeError> {
        let Some(node) = self.nodes.get(&upstream.node_id) else {
            return Ok(None);
        };
        if node.is_pure_data() && node.is_enabled() && visiting.insert(upstream.node_id) {
            let evaluated = self.evaluate_pure(upstream.node_id, visiting);
            visiting.remove(&upstream.node_id);
            evaluated?;
        }
        Ok(self
            .nodes
            .get(&upstream.node_id)
            .and_then(|node| node.output_value(upstream.slot_id))
            .cloned())
    }

    fn evaluate_pure(&mut self, node_id: NodeId, visiting: &mut HashSet<NodeId>) -> Result<(), NodeError> {
        let inputs = self.gather_inputs(node_id, visiting)?;
        self.run_logic(node_id, inputs, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::data::DataType;
    use crate::ids::EntityId;
    use crate::node::{EntryPoint, Node};
    use crate::nodes::{ErrorHandler, FunctionNode, Start};
    use crate::remap::ActivationContext;
    use crate::slot::SlotConfig;
    use crate::test_utils::wire;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Seen = Rc<RefCell<Vec<Datum>>>;

    fn source(value: i64) -> Node {
        Node::new(
            "A",
            FunctionNode::new("Produce", move |scope| {
                scope.set_output("Value", Datum::Int(value))?;
                scope.signal("Out")
            })
            .with_entry_point(EntryPoint::Start),
        )
        .with_slot(SlotConfig::execution_out("Out"))
        .with_slot(SlotConfig::data_out("Value", DataType::Int))
    }

    fn recorder(name: &str, input: &str, data_type: DataType, seen: &Seen) -> Node {
        let seen = Rc::clone(seen);
        let slot = input.to_string();
        Node::new(
            name,
            FunctionNode::new("Record", move |scope| {
                seen.borrow_mut().push(scope.require_input(&slot)?.clone());
                Ok(())
            }),
        )
        .with_slot(SlotConfig::execution_in("In"))
        .with_slot(SlotConfig::data_in(input, data_type))
    }

    fn failing(name: &str) -> Node {
        Node::new(name, FunctionNode::new("Fail", |_| Err(NodeError::failed("boom"))))
            .with_slot(SlotConfig::execution_in("In"))
    }

    fn activate(graph: &mut Graph) {
        assert_eq!(graph.activate(ActivationContext::new(EntityId::new())), GraphState::Activated);
    }

    #[test]
    fn test_data_follows_execution() {
        let seen = Seen::default();
        let mut graph = Graph::new("Run");
        let a = graph.add_node(source(42)).unwrap();
        let b = graph.add_node(recorder("B", "Value", DataType::Int, &seen)).unwrap();
        wire(&mut graph, a, "Out", b, "In");
        wire(&mut graph, a, "Value", b, "Value");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(2));
        assert_eq!(*seen.borrow(), vec![Datum::Int(42)]);
        assert_eq!(graph.execution().stack_len(), 0);
    }

    #[test]
    fn test_pure_nodes_evaluated_on_demand() {
        let seen = Seen::default();
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let double = graph
            .add_node(
                Node::new(
                    "Double",
                    FunctionNode::new("Double", |scope| {
                        let value = scope.require_input("X")?.as_int().unwrap_or_default();
                        scope.set_output("Result", Datum::Int(value * 2))
                    }),
                )
                .with_slot(SlotConfig::data_in("X", DataType::Int).with_default(Datum::Int(21)))
                .with_slot(SlotConfig::data_out("Result", DataType::Int)),
            )
            .unwrap();
        let b = graph.add_node(recorder("B", "Value", DataType::Int, &seen)).unwrap();
        wire(&mut graph, start, "Out", b, "In");
        wire(&mut graph, double, "Result", b, "Value");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(2));
        assert_eq!(*seen.borrow(), vec![Datum::Int(42)]);
    }

    #[test]
    fn test_variable_references_read_and_write() {
        let seen = Seen::default();
        let mut graph = Graph::new("Run");
        let score = graph.variables_mut().add_variable("Score", Datum::Int(0)).unwrap();
        let a = graph.add_node(source(7)).unwrap();
        let b = graph.add_node(recorder("B", "Value", DataType::Int, &seen)).unwrap();
        wire(&mut graph, a, "Out", b, "In");

        let produced = graph.find_endpoint(a, "Value").unwrap();
        let consumed = graph.find_endpoint(b, "Value").unwrap();
        graph.set_slot_variable_reference(produced, score).unwrap();
        graph.set_slot_variable_reference(consumed, score).unwrap();

        activate(&mut graph);
        graph.on_owner_activated().unwrap();
        assert_eq!(*seen.borrow(), vec![Datum::Int(7)]);
        let stored = graph.variables().find_variable_by_id(score).and_then(|variable| variable.datum.clone());
        assert_eq!(stored, Some(Datum::Int(7)));
    }

    #[test]
    fn test_error_routed_to_bound_handler() {
        let seen = Seen::default();
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let b = graph.add_node(failing("B")).unwrap();
        let handler = graph.add_node(Node::new("OnError", ErrorHandler::for_sources([b]))).unwrap();
        let log = graph.add_node(recorder("Log", "Message", DataType::String, &seen)).unwrap();
        wire(&mut graph, start, "Out", b, "In");
        wire(&mut graph, handler, ErrorHandler::OUT, log, "In");
        wire(&mut graph, handler, ErrorHandler::ERROR, log, "Message");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(4));
        assert_eq!(*seen.borrow(), vec![Datum::String("B - boom".to_string())]);
    }

    #[test]
    fn test_unhandled_error_clears_stack() {
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let b = graph.add_node(failing("B")).unwrap();
        let c = graph.add_node(failing("C")).unwrap();
        wire(&mut graph, start, "Out", b, "In");
        wire(&mut graph, start, "Out", c, "In");

        activate(&mut graph);
        assert_eq!(
            graph.on_owner_activated(),
            Err(ExecutionError::Unhandled {
                node: b,
                message: "B - boom".to_string(),
            })
        );
        assert_eq!(graph.execution().stack_len(), 0);
    }

    #[test]
    fn test_catch_all_handles_every_node() {
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let b = graph.add_node(failing("B")).unwrap();
        graph.add_node(Node::new("OnError", ErrorHandler::catch_all())).unwrap();
        wire(&mut graph, start, "Out", b, "In");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(3));
        assert!(graph.report_error(b, "B", "late").is_ok());
        assert_eq!(graph.execution().stack_len(), 1);
    }

    #[test]
    fn test_latent_outputs_wait_for_run_pending() {
        let seen = Seen::default();
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let delay = graph
            .add_node(
                Node::new("Delay", FunctionNode::new("Delay", |scope| scope.signal("Done")))
                    .with_slot(SlotConfig::execution_in("In"))
                    .with_slot(SlotConfig::latent_out("Done")),
            )
            .unwrap();
        let b = graph
            .add_node(recorder("B", "Value", DataType::Int, &seen))
            .unwrap();
        graph
            .set_slot_value(graph.find_endpoint(b, "Value").unwrap(), Datum::Int(5))
            .unwrap();
        wire(&mut graph, start, "Out", delay, "In");
        wire(&mut graph, delay, "Done", b, "In");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(2));
        assert!(seen.borrow().is_empty());
        assert_eq!(graph.execution().pending_len(), 1);

        assert_eq!(graph.run_pending(), Ok(1));
        assert_eq!(*seen.borrow(), vec![Datum::Int(5)]);
    }

    #[test]
    fn test_step_limit_stops_runaway_graphs() {
        let config = EngineConfig {
            max_execution_steps: 3,
            ..EngineConfig::default()
        };
        let mut graph = Graph::with_config("Run", config);
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        let step = |name: &str| {
            Node::new(name, FunctionNode::pure())
                .with_slot(SlotConfig::execution_in("In"))
                .with_slot(SlotConfig::execution_out("Out"))
        };
        let first = graph.add_node(step("First")).unwrap();
        let second = graph.add_node(step("Second")).unwrap();
        wire(&mut graph, start, "Out", first, "In");
        wire(&mut graph, first, "Out", second, "In");
        wire(&mut graph, second, "Out", first, "In");

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Err(ExecutionError::StepLimitExceeded(3)));
        assert_eq!(graph.execution().stack_len(), 0);
    }

    #[test]
    fn test_inactive_graph_refuses_to_run() {
        let mut graph = Graph::new("Run");
        let start = graph.add_node(Node::new("Start", Start)).unwrap();
        assert_eq!(graph.on_owner_activated(), Err(ExecutionError::NotActive));

        activate(&mut graph);
        assert_eq!(graph.on_owner_activated(), Ok(1));
        assert_eq!(graph.trigger(start), Ok(1));
        assert!(matches!(graph.trigger(NodeId::new()), Err(ExecutionError::NodeNotFound(_))));

        graph.deactivate();
        assert_eq!(graph.trigger(start), Err(ExecutionError::NotActive));
    }
}
