// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` script runner.
//!
//! Builds a small producer/consumer graph, validates it, activates it on a
//! fresh owner entity and runs it. An optional RON engine config may be
//! passed as the first argument.

use ordoplay_script::node::EntryPoint;
use ordoplay_script::nodes::FunctionNode;
use ordoplay_script::{
    ActivationContext, DataType, Datum, EngineConfig, EntityId, Graph, GraphState, Node, NodeId, SlotConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["ordoplay_script=debug", "ordoplay_script_runner=debug"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay script runner v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Could not load config '{}': {e}", path);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    if let Err(e) = run(config) {
        tracing::error!("Script failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = Graph::with_config("Sample", config);
    let producer = build(&mut graph)?;

    let results = graph.validate_graph();
    for event in results.events() {
        tracing::warn!("{event}");
    }
    if results.has_errors() {
        return Err(format!("graph has {} validation error(s)", results.error_count()).into());
    }

    let state = graph.activate(ActivationContext::new(EntityId::new()));
    if state != GraphState::Activated {
        return Err(format!("graph ended up {state:?} after activation").into());
    }

    let steps = graph.on_owner_activated()?;
    tracing::info!("Executed {} node(s) starting from {}", steps, producer);

    let produced = graph
        .find_node(producer)
        .zip(graph.find_endpoint(producer, "Value"))
        .and_then(|(node, endpoint)| node.output_value(endpoint.slot_id))
        .cloned();
    tracing::debug!("Producer output after run: {:?}", produced);

    graph.deactivate();
    Ok(())
}

fn build(graph: &mut Graph) -> Result<NodeId, Box<dyn std::error::Error>> {
    let producer = graph.add_node(
        Node::new(
            "Producer",
            FunctionNode::new("Produce", |scope| {
                scope.set_output("Value", Datum::Int(42))?;
                scope.signal("Out")
            })
            .with_entry_point(EntryPoint::Start),
        )
        .with_slot(SlotConfig::execution_out("Out"))
        .with_slot(SlotConfig::data_out("Value", DataType::Int)),
    )?;

    let consumer = graph.add_node(
        Node::new(
            "Consumer",
            FunctionNode::new("Consume", |scope| {
                let value = scope.require_input("Value")?;
                tracing::info!("Consumer received {:?}", value);
                Ok(())
            }),
        )
        .with_slot(SlotConfig::execution_in("In"))
        .with_slot(SlotConfig::data_in("Value", DataType::Int)),
    )?;

    for (source, target) in [("Out", "In"), ("Value", "Value")] {
        let source = graph
            .find_endpoint(producer, source)
            .ok_or_else(|| format!("producer has no slot '{source}'"))?;
        let target = graph
            .find_endpoint(consumer, target)
            .ok_or_else(|| format!("consumer has no slot '{target}'"))?;
        graph.connect_by_endpoint(source, target)?;
    }

    Ok(producer)
}
