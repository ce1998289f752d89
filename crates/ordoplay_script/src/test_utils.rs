// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for unit tests.

use crate::data::DataType;
use crate::graph::Graph;
use crate::ids::{ConnectionId, NodeId};
use crate::node::Node;
use crate::nodes::FunctionNode;
use crate::slot::SlotConfig;

/// "A": execution output `Out`, integer output `Value`
pub(crate) fn producer() -> Node {
    Node::new("A", FunctionNode::pure())
        .with_slot(SlotConfig::execution_out("Out"))
        .with_slot(SlotConfig::data_out("Value", DataType::Int))
}

/// "B": execution input `In`, integer input `Value`
pub(crate) fn consumer() -> Node {
    Node::new("B", FunctionNode::pure())
        .with_slot(SlotConfig::execution_in("In"))
        .with_slot(SlotConfig::data_in("Value", DataType::Int))
}

/// Graph holding an unconnected producer and consumer
pub(crate) fn scenario() -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new("Scenario");
    let a = graph.add_node(producer()).expect("producer");
    let b = graph.add_node(consumer()).expect("consumer");
    (graph, a, b)
}

/// Connect two slots by name, panicking if the graph refuses
pub(crate) fn wire(graph: &mut Graph, source: NodeId, source_slot: &str, target: NodeId, target_slot: &str) -> ConnectionId {
    let source = graph.find_endpoint(source, source_slot).expect("source slot");
    let target = graph.find_endpoint(target, target_slot).expect("target slot");
    graph.connect_by_endpoint(source, target).expect("connection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use proptest::prelude::*;

    /// Connection operations applied to a chain of producer/consumer pairs
    #[derive(Debug, Clone)]
    enum Op {
        Connect(usize, usize),
        Disconnect(usize, usize),
        RemoveNode(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize, 0..4usize).prop_map(|(a, b)| Op::Connect(a, b)),
            (0..4usize, 0..4usize).prop_map(|(a, b)| Op::Disconnect(a, b)),
            (0..8usize).prop_map(Op::RemoveNode),
        ]
    }

    proptest! {
        #[test]
        fn test_adjacency_stays_symmetric(ops in prop::collection::vec(op(), 0..24)) {
            let mut graph = Graph::new("Prop");
            let producers: Vec<NodeId> = (0..4).map(|_| graph.add_node(producer()).unwrap()).collect();
            let consumers: Vec<NodeId> = (0..4).map(|_| graph.add_node(consumer()).unwrap()).collect();

            for op in ops {
                match op {
                    Op::Connect(a, b) => {
                        if let (Some(out), Some(input)) = (
                            graph.find_endpoint(producers[a], "Out"),
                            graph.find_endpoint(consumers[b], "In"),
                        ) {
                            let _ = graph.connect_by_endpoint(out, input);
                        }
                    }
                    Op::Disconnect(a, b) => {
                        if let (Some(out), Some(input)) = (
                            graph.find_endpoint(producers[a], "Out"),
                            graph.find_endpoint(consumers[b], "In"),
                        ) {
                            let _ = graph.disconnect_by_endpoint(out, input);
                        }
                    }
                    Op::RemoveNode(index) => {
                        let node = if index < 4 { producers[index] } else { consumers[index - 4] };
                        let _ = graph.remove_node(node);
                    }
                }
            }

            let endpoints: Vec<Endpoint> = graph.connected_endpoints().copied().collect();
            for endpoint in &endpoints {
                prop_assert!(graph.find_slot(endpoint).is_some());
                for other in graph.get_connected_endpoints(endpoint) {
                    prop_assert!(graph.get_connected_endpoints(&other).contains(endpoint));
                    prop_assert!(graph.find_connection_between(endpoint, &other).is_some());
                }
            }
            for connection in graph.connections() {
                let source = connection.source_endpoint();
                let target = connection.target_endpoint();
                prop_assert!(graph.get_connected_endpoints(&source).contains(&target));
                prop_assert!(graph.get_connected_endpoints(&target).contains(&source));
            }
        }
    }
}
