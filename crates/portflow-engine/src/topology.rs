//! Bus chain ordering.
//!
//! Bus nodes publish for the bus downstream of them, so whole-graph work
//! (load, settings changes) visits them upstream-first. The order comes from
//! a topological sort of the bus-to-bus links; on a cycle, insertion order is
//! used instead.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use portflow_core::{HostGraph, NodeId};

/// Bus nodes of `graph` ordered upstream-first.
pub fn bus_order<F>(graph: &HostGraph, is_bus: F) -> Vec<NodeId>
where
    F: Fn(NodeId) -> bool,
{
    let buses: Vec<NodeId> = graph.node_ids().into_iter().filter(|id| is_bus(*id)).collect();
    let mut chain = DiGraphMap::<NodeId, ()>::new();
    for id in &buses {
        chain.add_node(*id);
    }
    for link in graph.links() {
        let live = graph
            .live_input_link(link.target, link.target_slot)
            .is_some_and(|l| l.id == link.id);
        if live && link.origin_slot == 0 && link.target_slot == 0 && is_bus(link.origin) && is_bus(link.target) {
            chain.add_edge(link.origin, link.target, ());
        }
    }
    match toposort(&chain, None) {
        Ok(order) => order,
        Err(cycle) => {
            tracing::warn!(node = %cycle.node_id(), "bus chain has a cycle, using insertion order");
            buses
        }
    }
}

/// Every node of `graph`: plain and non-bus dynamic nodes in insertion
/// order, followed by the bus nodes upstream-first.
pub fn configure_order<F>(graph: &HostGraph, is_bus: F) -> Vec<NodeId>
where
    F: Fn(NodeId) -> bool,
{
    let mut order: Vec<NodeId> = graph.node_ids().into_iter().filter(|id| !is_bus(*id)).collect();
    order.extend(bus_order(graph, is_bus));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use portflow_core::SlotType;

    fn bus(graph: &mut HostGraph) -> NodeId {
        let id = graph.add_node("PT_DynamicBus");
        graph.add_input(id, "bus", SlotType::bus()).unwrap();
        graph.add_output(id, "bus", SlotType::bus()).unwrap();
        id
    }

    fn is_bus(graph: &HostGraph) -> impl Fn(NodeId) -> bool + '_ {
        move |id| graph.node(id).is_some_and(|n| n.class_type == "PT_DynamicBus")
    }

    #[test]
    fn downstream_buses_come_later() {
        let mut graph = HostGraph::new();
        let c = bus(&mut graph);
        let a = bus(&mut graph);
        let b = bus(&mut graph);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(b, 0, c, 0).unwrap();
        let order = bus_order(&graph, is_bus(&graph));
        let pos = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn cycles_fall_back_to_insertion_order() {
        let mut graph = HostGraph::new();
        let a = bus(&mut graph);
        let b = bus(&mut graph);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(b, 0, a, 0).unwrap();
        assert_eq!(bus_order(&graph, is_bus(&graph)), vec![a, b]);
    }

    #[test]
    fn plain_nodes_configure_first() {
        let mut graph = HostGraph::new();
        let a = bus(&mut graph);
        let plain = graph.add_node("LoadImage");
        assert_eq!(configure_order(&graph, is_bus(&graph)), vec![plain, a]);
    }
}
