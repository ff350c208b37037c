//! Tree validation (§4.1.1): five orthogonal DFS passes over a built arena,
//! all errors collected, none short-circuited.

use super::node::{NodeId, RouteNode};
use super::ReceiverDescriptor;
use crate::alert::MatchKind;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// One of the six validation error kinds named in spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Cycle,
    ReceiverNotFound,
    DuplicateMatcher,
    InvalidRegex,
    InvalidDuration,
    EmptyReceiver,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::Cycle => "cycle",
            ValidationErrorKind::ReceiverNotFound => "receiver_not_found",
            ValidationErrorKind::DuplicateMatcher => "duplicate_matcher",
            ValidationErrorKind::InvalidRegex => "invalid_regex",
            ValidationErrorKind::InvalidDuration => "invalid_duration",
            ValidationErrorKind::EmptyReceiver => "empty_receiver",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single validation failure, naming its path in the tree (§7 "each error
/// naming its path in the tree").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Run all five passes against the arena. Errors from every pass are
/// collected together; no pass short-circuits another.
pub fn validate_tree(
    nodes: &[RouteNode],
    root: NodeId,
    receivers: &HashMap<String, ReceiverDescriptor>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_cycles(nodes, root, &mut errors);
    check_receivers(nodes, receivers, &mut errors);
    check_regexes(nodes, &mut errors);
    check_duplicate_matchers(nodes, &mut errors);
    check_durations(nodes, &mut errors);
    errors
}

/// Standard DFS with a recursion stack; a back-edge (child already on the
/// active stack) is a cycle.
fn check_cycles(nodes: &[RouteNode], root: NodeId, errors: &mut Vec<ValidationError>) {
    let mut on_stack = vec![false; nodes.len()];
    let mut visited = vec![false; nodes.len()];
    fn walk(
        nodes: &[RouteNode],
        id: NodeId,
        on_stack: &mut [bool],
        visited: &mut [bool],
        errors: &mut Vec<ValidationError>,
    ) {
        if on_stack[id] {
            errors.push(ValidationError {
                kind: ValidationErrorKind::Cycle,
                path: nodes[id].path.clone(),
                message: format!("cycle detected revisiting {}", nodes[id].path),
            });
            return;
        }
        if visited[id] {
            return;
        }
        visited[id] = true;
        on_stack[id] = true;
        for &child in &nodes[id].children {
            walk(nodes, child, on_stack, visited, errors);
        }
        on_stack[id] = false;
    }
    walk(nodes, root, &mut on_stack, &mut visited, errors);
}

fn check_receivers(
    nodes: &[RouteNode],
    receivers: &HashMap<String, ReceiverDescriptor>,
    errors: &mut Vec<ValidationError>,
) {
    for node in nodes {
        if node.receiver.trim().is_empty() {
            errors.push(ValidationError {
                kind: ValidationErrorKind::EmptyReceiver,
                path: node.path.clone(),
                message: "route has no effective receiver".to_string(),
            });
            continue;
        }
        if !receivers.contains_key(&node.receiver) {
            errors.push(ValidationError {
                kind: ValidationErrorKind::ReceiverNotFound,
                path: node.path.clone(),
                message: format!("receiver '{}' is not in the receiver map", node.receiver),
            });
        }
    }
}

fn check_regexes(nodes: &[RouteNode], errors: &mut Vec<ValidationError>) {
    for node in nodes {
        for matcher in &node.matchers {
            if matches!(matcher.kind, MatchKind::Regex | MatchKind::NotRegex) {
                if let Err(e) = Regex::new(&matcher.value) {
                    errors.push(ValidationError {
                        kind: ValidationErrorKind::InvalidRegex,
                        path: node.path.clone(),
                        message: format!("pattern '{}': {}", matcher.value, e),
                    });
                }
            }
        }
    }
}

fn check_duplicate_matchers(nodes: &[RouteNode], errors: &mut Vec<ValidationError>) {
    for node in nodes {
        let mut seen: HashMap<String, NodeId> = HashMap::new();
        for &child_id in &node.children {
            let child = &nodes[child_id];
            if child.matchers.is_empty() {
                // Multiple match-all children are legal (§4.1.1).
                continue;
            }
            let sig = child.matcher_signature();
            if let Some(_prev) = seen.insert(sig.clone(), child_id) {
                errors.push(ValidationError {
                    kind: ValidationErrorKind::DuplicateMatcher,
                    path: child.path.clone(),
                    message: format!("duplicate sibling matcher signature '{sig}'"),
                });
            }
        }
    }
}

fn check_durations(nodes: &[RouteNode], errors: &mut Vec<ValidationError>) {
    for node in nodes {
        if node.group_wait.is_zero() {
            errors.push(ValidationError {
                kind: ValidationErrorKind::InvalidDuration,
                path: node.path.clone(),
                message: "group_wait must be > 0".to_string(),
            });
        }
        if node.group_interval.is_zero() {
            errors.push(ValidationError {
                kind: ValidationErrorKind::InvalidDuration,
                path: node.path.clone(),
                message: "group_interval must be > 0".to_string(),
            });
        }
        if node.repeat_interval.is_zero() {
            errors.push(ValidationError {
                kind: ValidationErrorKind::InvalidDuration,
                path: node.path.clone(),
                message: "repeat_interval must be > 0".to_string(),
            });
        }
        if node.group_interval < node.group_wait {
            errors.push(ValidationError {
                kind: ValidationErrorKind::InvalidDuration,
                path: node.path.clone(),
                message: format!(
                    "group_interval ({:?}) < group_wait ({:?})",
                    node.group_interval, node.group_wait
                ),
            });
        }
    }
}
