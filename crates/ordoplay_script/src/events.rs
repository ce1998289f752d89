// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-way notifications emitted by the graph.

use crate::data::DataType;
use crate::endpoint::Endpoint;
use crate::graph::Graph;
use crate::ids::{ConnectionId, NodeId};

/// Something that changed in a graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node joined the graph
    NodeAdded(NodeId),
    /// A node left the graph
    NodeRemoved(NodeId),
    /// A connection joined the graph
    ConnectionAdded(ConnectionId),
    /// A connection left the graph
    ConnectionRemoved(ConnectionId),
    /// `endpoint` gained a connection to `other`
    EndpointConnected {
        /// Endpoint being notified
        endpoint: Endpoint,
        /// Far side
        other: Endpoint,
    },
    /// `endpoint` lost its connection to `other`
    EndpointDisconnected {
        /// Endpoint being notified
        endpoint: Endpoint,
        /// Far side
        other: Endpoint,
    },
    /// A batch of graph data is about to be added
    BatchAddBegin,
    /// A batch of graph data finished adding
    BatchAddComplete,
    /// A dynamic slot committed or cleared its concrete type
    DisplayTypeChanged {
        /// Slot
        endpoint: Endpoint,
        /// New type
        display_type: Option<DataType>,
    },
}

/// Receives graph events.
///
/// Events are delivered after the mutation that caused them has been fully
/// applied, so the graph handed in is consistent and safe to query.
pub trait GraphObserver {
    /// Handle one event
    fn on_event(&mut self, graph: &Graph, event: &GraphEvent);
}

impl<F> GraphObserver for F
where
    F: FnMut(&Graph, &GraphEvent),
{
    fn on_event(&mut self, graph: &Graph, event: &GraphEvent) {
        self(graph, event);
    }
}
