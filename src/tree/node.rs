use crate::alert::Matcher;
use std::time::Duration;

/// Index into a [`super::RouteTree`]'s node arena.
///
/// The tree is represented as a flat arena rather than an owned/GC'd graph
/// (§9 "Weak back-references": parent/child are relations, stored as
/// indices, not ownership) so the whole arena can be swapped behind a
/// single atomic pointer by the tree manager.
pub type NodeId = usize;

/// One node of the built, immutable routing tree.
///
/// Every field here is the *effective* (already-inherited) value — see
/// [`super::builder::TreeBuilder`] for the inheritance rules that produced
/// it. Nothing about a `RouteNode` changes after the tree it belongs to is
/// built.
#[derive(Debug, Clone)]
pub struct RouteNode {
    pub matchers: Vec<Matcher>,
    pub receiver: String,
    pub group_by: Vec<String>,
    pub group_wait: Duration,
    pub group_interval: Duration,
    pub repeat_interval: Duration,
    pub continue_: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub path: String,
    pub level: usize,
}

impl RouteNode {
    /// The node's matcher signature set, used for duplicate-sibling
    /// detection (§4.1.1): sorted `"<name><op><value>"` strings.
    pub fn matcher_signature(&self) -> String {
        let mut parts: Vec<String> = self
            .matchers
            .iter()
            .map(|m| format!("{}{}{}", m.name, m.op_token(), m.value))
            .collect();
        parts.sort_unstable();
        parts.join(",")
    }
}
