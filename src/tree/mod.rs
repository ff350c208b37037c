//! The Route Tree — an immutable hierarchical routing configuration with
//! parameter inheritance (spec.md §3 "RouteTree", §4.1 "Tree Builder").
//!
//! Modeled as a flat arena (`Vec<RouteNode>`) keyed by index rather than an
//! owned graph of boxed nodes, per §9's design note: this lets the tree
//! manager swap the whole tree behind a single atomic pointer without
//! per-node synchronization, following the same shape as the teacher's
//! `ArcSwap<RouteTable>` in `server/state.rs`.

pub mod builder;
mod node;
mod validate;

pub use builder::TreeBuilder;
pub use node::{NodeId, RouteNode};
pub use validate::{ValidationError, ValidationErrorKind};

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// The value type of the receiver map referenced throughout §4.1/§3.
///
/// The distilled spec names the map but leaves the descriptor's shape
/// unspecified; transport-specific fields are carried opaquely (this core
/// never interprets them — receiver transports are external collaborators
/// per spec.md §1).
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverDescriptor {
    pub name: String,
    pub opaque: JsonValue,
}

impl ReceiverDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opaque: JsonValue::Null,
        }
    }
}

/// Immutable, read-only statistics about a built tree (§3 "RouteTree ...
/// exposes immutable statistics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub node_count: usize,
    pub max_depth: usize,
    pub unique_receiver_count: usize,
}

/// A built, immutable routing tree.
///
/// Every field is read-only after construction; the tree is safely
/// publishable to other threads without additional synchronization (§4.1
/// "the resulting tree must be safely publishable ... without additional
/// synchronization").
#[derive(Debug, Clone)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    root: NodeId,
    receivers: HashMap<String, ReceiverDescriptor>,
    stats: TreeStats,
    built_at: u64,
}

impl RouteTree {
    /// Assemble a tree directly from an already-built arena, bypassing
    /// [`super::builder::TreeBuilder`]'s validation.
    ///
    /// Exposed for embedders that construct or deserialize a node arena by
    /// some other means (and tests that need to exercise a predicate
    /// combination, such as negative regex, that the `match`/`match_re`
    /// config shape in §6 cannot itself express). Prefer
    /// [`TreeBuilder::build`] for anything sourced from config — this
    /// constructor performs no validation at all.
    pub fn from_parts(
        nodes: Vec<RouteNode>,
        root: NodeId,
        receivers: HashMap<String, ReceiverDescriptor>,
    ) -> Self {
        let max_depth = nodes.iter().map(|n| n.level).max().unwrap_or(0);
        let unique_receiver_count = nodes
            .iter()
            .map(|n| n.receiver.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let stats = TreeStats {
            node_count: nodes.len(),
            max_depth,
            unique_receiver_count,
        };
        Self {
            nodes,
            root,
            receivers,
            stats,
            built_at: now_unix(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &RouteNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    pub fn receiver(&self, name: &str) -> Option<&ReceiverDescriptor> {
        self.receivers.get(name)
    }

    pub fn receivers(&self) -> &HashMap<String, ReceiverDescriptor> {
        &self.receivers
    }

    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    pub fn built_at(&self) -> u64 {
        self.built_at
    }

    /// Re-run every validation pass against the already-built tree.
    ///
    /// Exposed so callers such as the hot-reload concurrency test (spec.md
    /// §8 scenario 6) can assert "every `GetTree` returns a tree whose
    /// `Validate()` returns no errors" without re-running the builder.
    pub fn validate(&self) -> Vec<ValidationError> {
        validate::validate_tree(&self.nodes, self.root, &self.receivers)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
