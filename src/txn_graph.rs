//! Directed transaction network built from a case's transaction set.
//!
//! Nodes are account ids, edges are transactions weighted by amount (parallel
//! edges allowed). The detector reads degree centrality, per-node fan-in /
//! fan-out counterparty counts, and cycle presence off this graph.

use petgraph::algo::{connected_components, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::case::Transaction;

pub struct TransactionGraph {
    graph: DiGraph<String, f64>,
    nodes: HashMap<String, NodeIndex>,
}

impl TransactionGraph {
    /// Build the multigraph: one node per account id, one edge per
    /// transaction from source to destination, weight = amount.
    pub fn build(transactions: &[Transaction]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for txn in transactions {
            let src = Self::intern(&mut graph, &mut nodes, &txn.source_account);
            let dst = Self::intern(&mut graph, &mut nodes, &txn.destination_account);
            graph.add_edge(src, dst, txn.amount);
        }

        TransactionGraph { graph, nodes }
    }

    fn intern(
        graph: &mut DiGraph<String, f64>,
        nodes: &mut HashMap<String, NodeIndex>,
        account: &str,
    ) -> NodeIndex {
        *nodes
            .entry(account.to_string())
            .or_insert_with(|| graph.add_node(account.to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.nodes.contains_key(account)
    }

    /// Distinct counterparties sending into each node.
    pub fn fan_in(&self) -> HashMap<String, usize> {
        self.distinct_neighbors(Direction::Incoming)
    }

    /// Distinct counterparties receiving from each node.
    pub fn fan_out(&self) -> HashMap<String, usize> {
        self.distinct_neighbors(Direction::Outgoing)
    }

    fn distinct_neighbors(&self, direction: Direction) -> HashMap<String, usize> {
        self.nodes
            .iter()
            .map(|(account, &idx)| {
                let distinct: HashSet<NodeIndex> =
                    self.graph.neighbors_directed(idx, direction).collect();
                (account.clone(), distinct.len())
            })
            .collect()
    }

    /// Degree centrality per node: distinct in- plus out-neighbors over
    /// (n - 1). Zero for graphs with fewer than two nodes.
    pub fn degree_centrality(&self) -> HashMap<String, f64> {
        let n = self.graph.node_count();
        if n < 2 {
            return self.nodes.keys().map(|k| (k.clone(), 0.0)).collect();
        }

        let denom = (n - 1) as f64;
        self.nodes
            .iter()
            .map(|(account, &idx)| {
                let inbound: HashSet<NodeIndex> = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .collect();
                let outbound: HashSet<NodeIndex> = self
                    .graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .collect();
                let degree = (inbound.len() + outbound.len()) as f64;
                (account.clone(), degree / denom)
            })
            .collect()
    }

    pub fn max_centrality(&self) -> f64 {
        self.degree_centrality()
            .values()
            .copied()
            .fold(0.0, f64::max)
    }

    /// True when the network contains a directed cycle (funds returning to an
    /// earlier account in the flow).
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Weakly connected component count.
    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn txn(src: &str, dst: &str, amount: f64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
            source_account: src.into(),
            destination_account: dst.into(),
            kind: "transfer".into(),
        }
    }

    #[test]
    fn test_fan_in_counts_distinct_sources() {
        let txns = vec![
            txn("A", "HUB", 100.0),
            txn("B", "HUB", 100.0),
            txn("B", "HUB", 250.0), // parallel edge, same counterparty
            txn("C", "HUB", 100.0),
        ];
        let graph = TransactionGraph::build(&txns);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.fan_in()["HUB"], 3);
        assert_eq!(graph.fan_out()["HUB"], 0);
    }

    #[test]
    fn test_centrality_of_hub() {
        // HUB touches every other node in a 4-node star.
        let txns = vec![
            txn("A", "HUB", 10.0),
            txn("B", "HUB", 10.0),
            txn("HUB", "C", 10.0),
        ];
        let graph = TransactionGraph::build(&txns);

        let centrality = graph.degree_centrality();
        assert!((centrality["HUB"] - 1.0).abs() < 1e-9);
        assert!(graph.max_centrality() > 0.5);
    }

    #[test]
    fn test_cycle_detection() {
        let acyclic = TransactionGraph::build(&[txn("A", "B", 10.0), txn("B", "C", 10.0)]);
        assert!(!acyclic.has_cycle());

        let cyclic = TransactionGraph::build(&[
            txn("A", "B", 10.0),
            txn("B", "C", 10.0),
            txn("C", "A", 10.0),
        ]);
        assert!(cyclic.has_cycle());
    }

    #[test]
    fn test_empty_graph() {
        let graph = TransactionGraph::build(&[]);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.max_centrality(), 0.0);
        assert!(!graph.has_cycle());
        assert_eq!(graph.component_count(), 0);
    }
}
