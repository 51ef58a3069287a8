use crate::model::UserRecord;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// How far a node's own followers were explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expansion {
    /// Inserted, followers not fetched yet.
    Pending,
    /// Followers fetched and attached.
    Expanded,
    /// A fetch for this node failed; it keeps zero follower edges.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub user: UserRecord,
    pub depth: u32,
    /// Follower edges, by login, in the order the remote returned them.
    pub followers: Vec<String>,
    pub expansion: Expansion,
}

impl Node {
    pub fn new(user: UserRecord, depth: u32) -> Self {
        Self {
            user,
            depth,
            followers: Vec::new(),
            expansion: Expansion::Pending,
        }
    }

    pub fn abandoned(user: UserRecord, depth: u32) -> Self {
        Self {
            expansion: Expansion::Abandoned,
            ..Self::new(user, depth)
        }
    }

    pub fn login(&self) -> &str {
        &self.user.login
    }
}

/// Every user reached during one crawl, keyed by login.
///
/// Edges are stored as logins and resolved through the map, so follow cycles
/// never turn into ownership cycles. Entries are insert-once and iterate in
/// discovery order.
#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    claimed: HashSet<String>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `login` for fetching. Returns false if it was already claimed
    /// or inserted, in which case the caller must not fetch it.
    pub fn claim(&mut self, login: &str) -> bool {
        if self.nodes.contains_key(login) {
            return false;
        }
        self.claimed.insert(login.to_string())
    }

    /// Insert a node unless its login is already present. Existing entries
    /// are never overwritten.
    pub fn insert(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(node.login()) {
            return false;
        }
        let login = node.login().to_string();
        self.claimed.insert(login.clone());
        self.order.push(login.clone());
        self.nodes.insert(login, node);
        true
    }

    /// Record the follower edges of a pending node and mark it expanded.
    pub fn attach_followers(&mut self, login: &str, followers: Vec<String>) -> bool {
        match self.nodes.get_mut(login) {
            Some(node) if node.expansion == Expansion::Pending => {
                node.followers = followers;
                node.expansion = Expansion::Expanded;
                true
            }
            _ => false,
        }
    }

    /// Give up on a pending node, leaving it without follower edges.
    pub fn abandon(&mut self, login: &str) -> bool {
        match self.nodes.get_mut(login) {
            Some(node) if node.expansion == Expansion::Pending => {
                node.expansion = Expansion::Abandoned;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, login: &str) -> Option<&Node> {
        self.nodes.get(login)
    }

    pub fn contains(&self, login: &str) -> bool {
        self.nodes.contains_key(login)
    }

    /// The first inserted node, i.e. the crawl root.
    pub fn root(&self) -> Option<&Node> {
        self.order.first().and_then(|login| self.nodes.get(login))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|login| self.nodes.get(login))
    }

    pub fn logins(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
