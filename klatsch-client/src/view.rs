use std::collections::HashMap;

use crate::api::CommentId;
use crate::thread::CommentTree;

/// How one comment is currently shown. Lives outside the comment record so
/// merges can rewrite the forest without losing what the user folded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NodeState {
    pub collapsed: bool,
    pub replies_fetched: bool,
}

/// Per-node display state for one thread, keyed by comment id. Nodes without
/// an entry read as the defaults (expanded, replies not yet fetched).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ViewState {
    nodes: HashMap<CommentId, NodeState>,
}

impl ViewState {
    pub fn new() -> ViewState {
        ViewState::default()
    }

    pub fn state(&self, id: &CommentId) -> NodeState {
        self.nodes.get(id).copied().unwrap_or_default()
    }

    pub fn is_collapsed(&self, id: &CommentId) -> bool {
        self.state(id).collapsed
    }

    pub fn replies_fetched(&self, id: &CommentId) -> bool {
        self.state(id).replies_fetched
    }

    pub fn set_collapsed(&mut self, id: &CommentId, collapsed: bool) {
        self.nodes.entry(id.clone()).or_default().collapsed = collapsed;
    }

    pub fn toggle_collapsed(&mut self, id: &CommentId) {
        let node = self.nodes.entry(id.clone()).or_default();
        node.collapsed = !node.collapsed;
    }

    pub fn mark_replies_fetched(&mut self, id: &CommentId) {
        self.nodes.entry(id.clone()).or_default().replies_fetched = true;
    }

    /// Drops state for comments no longer in the forest, typically after a
    /// thread was rebuilt from a fresh fetch.
    pub fn prune(&mut self, tree: &CommentTree) {
        self.nodes.retain(|id, _| tree.contains(id));
    }
}
