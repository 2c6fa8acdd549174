//! Circular flow detection: value rotating through a closed loop of
//! wallets (A -> B -> C -> A).
//!
//! Wallets are interned into integer identifiers and edges live in an
//! adjacency map, so the cyclic structure never needs shared pointers.
//! Cycle enumeration is an iterative DFS with an on-path membership set
//! and a global iteration counter; dense graphs terminate at the cap at
//! the cost of completeness.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::flow::UserFlow;

/// One closed loop of wallets with aggregated edge volume
#[derive(Debug, Clone, Serialize)]
pub struct CycleFinding {
    pub cycle_length: usize,
    pub wallets: Vec<String>,
    /// Human-readable path with truncated addresses
    pub cycle_path: String,
    pub total_volume_usd: f64,
    pub total_transactions: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeStats {
    volume_usd: f64,
    count: usize,
}

/// Directed multigraph over interned wallet identifiers. Parallel flows
/// sharing a direction collapse into one weighted edge.
struct FlowGraph {
    wallets: Vec<String>,
    edges: BTreeMap<u32, BTreeMap<u32, EdgeStats>>,
}

impl FlowGraph {
    fn build(flows: &[UserFlow]) -> Self {
        let mut ids: HashMap<String, u32> = HashMap::new();
        let mut wallets: Vec<String> = Vec::new();
        let mut edges: BTreeMap<u32, BTreeMap<u32, EdgeStats>> = BTreeMap::new();

        let mut intern = |wallet: &str, wallets: &mut Vec<String>| -> u32 {
            if let Some(&id) = ids.get(wallet) {
                return id;
            }
            let id = wallets.len() as u32;
            wallets.push(wallet.to_string());
            ids.insert(wallet.to_string(), id);
            id
        };

        for flow in flows {
            let from = intern(&flow.start_wallet, &mut wallets);
            let to = intern(&flow.end_wallet, &mut wallets);
            let edge = edges.entry(from).or_default().entry(to).or_default();
            edge.volume_usd += flow.usd_value;
            edge.count += 1;
        }

        Self { wallets, edges }
    }

    fn edge(&self, from: u32, to: u32) -> Option<EdgeStats> {
        self.edges.get(&from).and_then(|m| m.get(&to)).copied()
    }

    fn neighbors(&self, node: u32) -> Vec<u32> {
        self.edges
            .get(&node)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Enumerate simple cycles with length in `[2, max_len]`.
    ///
    /// Every cycle is discovered exactly once, rooted at its smallest
    /// interned identifier: the DFS from root `r` only expands nodes
    /// with id > r. Returns whether the search was truncated by the
    /// iteration cap.
    fn simple_cycles(&self, max_len: usize, iteration_cap: usize) -> (Vec<Vec<u32>>, bool) {
        let node_count = self.wallets.len() as u32;
        let mut cycles = Vec::new();
        let mut iterations = 0usize;

        for root in 0..node_count {
            // path holds the nodes on the current DFS branch; frames
            // hold the not-yet-expanded neighbors per depth.
            let mut path: Vec<u32> = vec![root];
            let mut on_path = vec![false; node_count as usize];
            on_path[root as usize] = true;
            let mut frames: Vec<Vec<u32>> = vec![self.neighbors(root)];

            while let Some(frame) = frames.last_mut() {
                let Some(next) = frame.pop() else {
                    let done = path.pop().expect("path tracks frames");
                    on_path[done as usize] = false;
                    frames.pop();
                    continue;
                };

                iterations += 1;
                if iterations > iteration_cap {
                    warn!(
                        iteration_cap,
                        found = cycles.len(),
                        "Cycle search hit iteration cap, returning partial results"
                    );
                    return (cycles, true);
                }

                if next == root {
                    if path.len() >= 2 {
                        cycles.push(path.clone());
                    }
                    continue;
                }

                // Only expand above the root so each cycle is rooted at
                // its minimum id; skip nodes already on this branch.
                if next < root || on_path[next as usize] || path.len() >= max_len {
                    continue;
                }

                path.push(next);
                on_path[next as usize] = true;
                frames.push(self.neighbors(next));
            }
        }

        (cycles, false)
    }
}

fn short(wallet: &str) -> String {
    if wallet.len() > 8 {
        format!("{}...", &wallet[..8])
    } else {
        wallet.to_string()
    }
}

/// Detect circular flow patterns up to `max_cycle_length` wallets long
pub fn detect(flows: &[UserFlow], max_cycle_length: usize, iteration_cap: usize) -> Vec<CycleFinding> {
    let graph = FlowGraph::build(flows);
    debug!(
        nodes = graph.wallets.len(),
        edges = graph.edges.values().map(|m| m.len()).sum::<usize>(),
        "Built flow graph"
    );

    let (cycles, truncated) = graph.simple_cycles(max_cycle_length, iteration_cap);
    if truncated {
        debug!("Continuing with cycles found before the cap");
    }

    let mut findings: Vec<CycleFinding> = cycles
        .into_iter()
        .map(|cycle| {
            let mut volume = 0.0;
            let mut transactions = 0;
            for i in 0..cycle.len() {
                let from = cycle[i];
                let to = cycle[(i + 1) % cycle.len()];
                if let Some(edge) = graph.edge(from, to) {
                    volume += edge.volume_usd;
                    transactions += edge.count;
                }
            }

            let wallets: Vec<String> = cycle
                .iter()
                .map(|&id| graph.wallets[id as usize].clone())
                .collect();
            let mut path: Vec<String> = wallets.iter().map(|w| short(w)).collect();
            path.push(short(&wallets[0]));

            CycleFinding {
                cycle_length: cycle.len(),
                wallets,
                cycle_path: path.join(" -> "),
                total_volume_usd: volume,
                total_transactions: transactions,
            }
        })
        .collect();

    findings.sort_by(|a, b| {
        b.total_volume_usd
            .partial_cmp(&a.total_volume_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    findings
}
