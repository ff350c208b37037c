//! Tree Builder (§4.1): a single pre-order traversal that turns a
//! `RouteInput` graph plus a receiver catalogue into a validated,
//! immutable [`RouteTree`].

use super::node::{NodeId, RouteNode};
use super::validate::{validate_tree, ValidationError};
use super::{ReceiverDescriptor, RouteTree};
use crate::alert::{MatchKind, Matcher};
use crate::config::{GlobalDefaults, ReceiverInput, RouteInput};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_GROUP_WAIT: Duration = Duration::from_secs(30);
const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Builds a [`RouteTree`] from a `route` configuration graph and a
/// `receivers` catalogue. Single-use: construct one per build, call
/// [`TreeBuilder::build`] once. Not required to be thread-safe (§4.1).
pub struct TreeBuilder {
    receivers: HashMap<String, ReceiverDescriptor>,
    global: GlobalDefaults,
}

/// Parameters a route inherits from its parent if it doesn't set its own
/// (§4.1 steps 4-5).
#[derive(Clone)]
struct InheritedParams {
    receiver: String,
    group_by: Vec<String>,
    group_wait: Duration,
    group_interval: Duration,
    repeat_interval: Duration,
}

impl TreeBuilder {
    pub fn new(receivers: &[ReceiverInput], global: GlobalDefaults) -> Self {
        let receivers = receivers
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    ReceiverDescriptor {
                        name: r.name.clone(),
                        opaque: serde_json::Value::Object(r.opaque.clone()),
                    },
                )
            })
            .collect();
        Self { receivers, global }
    }

    /// Build the tree. On any validation failure the (partially built)
    /// tree is discarded and the full, unordered list of errors is
    /// returned instead (§4.1: "if any error, discard the tree").
    pub fn build(self, route: &RouteInput) -> Result<RouteTree, Vec<ValidationError>> {
        let root_inherited = InheritedParams {
            receiver: String::new(),
            group_by: if self.global.group_by.is_empty() {
                vec!["alertname".to_string()]
            } else {
                self.global.group_by.clone()
            },
            group_wait: parse_global_duration(&self.global.group_wait, DEFAULT_GROUP_WAIT),
            group_interval: parse_global_duration(&self.global.group_interval, DEFAULT_GROUP_INTERVAL),
            repeat_interval: parse_global_duration(&self.global.repeat_interval, DEFAULT_REPEAT_INTERVAL),
        };

        let mut nodes = Vec::new();
        let root_id = build_node(route, &root_inherited, None, "/".to_string(), 0, &mut nodes);

        let errors = validate_tree(&nodes, root_id, &self.receivers);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(RouteTree::from_parts(nodes, root_id, self.receivers))
    }
}

/// Recursively construct one node (parent before children, §4.1 "single
/// pre-order traversal"), appending to the shared arena and returning the
/// new node's index.
fn build_node(
    input: &RouteInput,
    inherited: &InheritedParams,
    parent: Option<NodeId>,
    path: String,
    level: usize,
    nodes: &mut Vec<RouteNode>,
) -> NodeId {
    let matchers = convert_matchers(input);

    // Step 2: effective receiver — own name, else parent's.
    let receiver = if !input.receiver.is_empty() {
        input.receiver.clone()
    } else {
        inherited.receiver.clone()
    };

    // Step 4: group_by — route > parent > (global/default already folded
    // into `inherited` at the root).
    let group_by = match &input.group_by {
        Some(gb) if !gb.is_empty() => gb.clone(),
        _ => inherited.group_by.clone(),
    };

    // Step 5: durations — route (if > 0) > parent.
    let group_wait = parse_positive_duration(&input.group_wait).unwrap_or(inherited.group_wait);
    let group_interval =
        parse_positive_duration(&input.group_interval).unwrap_or(inherited.group_interval);
    let repeat_interval =
        parse_positive_duration(&input.repeat_interval).unwrap_or(inherited.repeat_interval);

    let this_id = nodes.len();
    nodes.push(RouteNode {
        matchers,
        receiver: receiver.clone(),
        group_by: group_by.clone(),
        group_wait,
        group_interval,
        repeat_interval,
        continue_: input.continue_,
        parent,
        children: Vec::new(),
        path: path.clone(),
        level,
    });

    let child_inherited = InheritedParams {
        receiver,
        group_by,
        group_wait,
        group_interval,
        repeat_interval,
    };

    let mut children = Vec::with_capacity(input.routes.len());
    for (i, child_input) in input.routes.iter().enumerate() {
        let child_path = child_path(&path, i);
        let child_id = build_node(child_input, &child_inherited, Some(this_id), child_path, level + 1, nodes);
        children.push(child_id);
    }
    nodes[this_id].children = children;

    this_id
}

/// `/` at the root, `/routes[0]`, `/routes[0].routes[1]` below it — the
/// human-readable path format used throughout §4.1/§7/§8's literal
/// scenarios.
fn child_path(parent_path: &str, index: usize) -> String {
    if parent_path == "/" {
        format!("/routes[{index}]")
    } else {
        format!("{parent_path}.routes[{index}]")
    }
}

fn convert_matchers(input: &RouteInput) -> Vec<Matcher> {
    let mut matchers = Vec::with_capacity(input.match_equal.len() + input.match_regex.len());
    for (name, value) in &input.match_equal {
        matchers.push(Matcher::new(name.clone(), value.clone(), MatchKind::Equal));
    }
    for (name, value) in &input.match_regex {
        matchers.push(Matcher::new(name.clone(), value.clone(), MatchKind::Regex));
    }
    // Stable order makes signatures and debug output deterministic even
    // though the source maps have no defined iteration order.
    matchers.sort_unstable_by(|a, b| a.name.cmp(&b.name).then(a.value.cmp(&b.value)));
    matchers
}

fn parse_positive_duration(s: &Option<String>) -> Option<Duration> {
    let s = s.as_ref()?;
    let d = crate::config::parse_duration(s).ok()?;
    if d.is_zero() {
        None
    } else {
        Some(d)
    }
}

fn parse_global_duration(s: &Option<String>, default: Duration) -> Duration {
    s.as_ref()
        .and_then(|s| crate::config::parse_duration(s).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalDefaults, ReceiverInput, RouteInput};
    use std::collections::HashMap;

    fn receivers(names: &[&str]) -> Vec<ReceiverInput> {
        names
            .iter()
            .map(|n| ReceiverInput {
                name: n.to_string(),
                status: 1,
                opaque: serde_json::Map::new(),
            })
            .collect()
    }

    #[test]
    fn builds_minimal_tree_with_defaults() {
        let route = RouteInput {
            receiver: "default".to_string(),
            ..Default::default()
        };
        let tree = TreeBuilder::new(&receivers(&["default"]), GlobalDefaults::default())
            .build(&route)
            .expect("builds");
        let root = tree.node(tree.root());
        assert_eq!(root.receiver, "default");
        assert_eq!(root.group_by, vec!["alertname".to_string()]);
        assert_eq!(root.path, "/");
    }

    #[test]
    fn child_inherits_receiver_and_durations() {
        let mut match_equal = HashMap::new();
        match_equal.insert("severity".to_string(), "critical".to_string());
        let child = RouteInput {
            match_equal,
            continue_: false,
            ..Default::default()
        };
        let route = RouteInput {
            receiver: "default".to_string(),
            routes: vec![child],
            ..Default::default()
        };
        let tree = TreeBuilder::new(&receivers(&["default"]), GlobalDefaults::default())
            .build(&route)
            .expect("builds");
        let root = tree.node(tree.root());
        assert_eq!(root.children.len(), 1);
        let child = tree.node(root.children[0]);
        assert_eq!(child.receiver, "default");
        assert_eq!(child.path, "/routes[0]");
        assert_eq!(child.group_wait, DEFAULT_GROUP_WAIT);
    }

    #[test]
    fn rejects_empty_receiver_at_root() {
        let route = RouteInput::default();
        let err = TreeBuilder::new(&receivers(&[]), GlobalDefaults::default())
            .build(&route)
            .unwrap_err();
        assert!(err
            .iter()
            .any(|e| e.kind == super::super::ValidationErrorKind::EmptyReceiver));
    }

    #[test]
    fn rejects_unknown_receiver() {
        let route = RouteInput {
            receiver: "missing".to_string(),
            ..Default::default()
        };
        let err = TreeBuilder::new(&receivers(&["default"]), GlobalDefaults::default())
            .build(&route)
            .unwrap_err();
        assert!(err
            .iter()
            .any(|e| e.kind == super::super::ValidationErrorKind::ReceiverNotFound));
    }

    #[test]
    fn rejects_group_interval_shorter_than_group_wait() {
        let route = RouteInput {
            receiver: "default".to_string(),
            group_wait: Some("5m".to_string()),
            group_interval: Some("1m".to_string()),
            ..Default::default()
        };
        let err = TreeBuilder::new(&receivers(&["default"]), GlobalDefaults::default())
            .build(&route)
            .unwrap_err();
        assert!(err
            .iter()
            .any(|e| e.kind == super::super::ValidationErrorKind::InvalidDuration));
    }
}
