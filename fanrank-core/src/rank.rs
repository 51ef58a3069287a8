// Influence ranking over a finished crawl

use fanrank_crawler::{NodeMap, RankedUser};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::HashMap;

/// Computes reachable-follower counts over a completed [`NodeMap`].
///
/// Every node gets its own depth-first walk with a fresh visited set, so a
/// login reachable along several paths, or through a cycle, is counted once
/// and the start node never counts itself. Counts are not shared between
/// start nodes.
///
/// An edge to a login without a map entry (a follower past the depth bound,
/// or a malformed map) counts that login and nothing behind it.
pub struct RankAggregator<'a> {
    nodes: &'a NodeMap,
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> RankAggregator<'a> {
    pub fn new(nodes: &'a NodeMap) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in nodes.iter() {
            intern(&mut graph, &mut index, node.login());
        }
        for node in nodes.iter() {
            let from = intern(&mut graph, &mut index, node.login());
            for follower in &node.followers {
                let to = intern(&mut graph, &mut index, follower);
                graph.add_edge(from, to, ());
            }
        }

        Self {
            nodes,
            graph,
            index,
        }
    }

    /// Distinct logins reachable from `login` through follower edges.
    pub fn followers_count(&self, login: &str) -> usize {
        let Some(&start) = self.index.get(login) else {
            return 0;
        };

        let mut dfs = Dfs::new(&self.graph, start);
        let mut reached = 0;
        while let Some(nx) = dfs.next(&self.graph) {
            if nx != start {
                reached += 1;
            }
        }
        reached
    }

    /// One entry per map entry, in discovery order.
    pub fn rank(&self) -> Vec<RankedUser> {
        self.nodes
            .iter()
            .map(|node| RankedUser {
                user: node.user.clone(),
                depth: node.depth,
                followers: node.followers.clone(),
                followers_count: self.followers_count(node.login()),
            })
            .collect()
    }
}

fn intern<'a>(
    graph: &mut DiGraph<&'a str, ()>,
    index: &mut HashMap<&'a str, NodeIndex>,
    login: &'a str,
) -> NodeIndex {
    *index.entry(login).or_insert_with(|| graph.add_node(login))
}

/// Rank every user in `nodes`. Never fails.
pub fn rank(nodes: &NodeMap) -> Vec<RankedUser> {
    RankAggregator::new(nodes).rank()
}
