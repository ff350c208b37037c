//! Route Matcher (§4.2): label-matching engine with regex caching and
//! traversal discipline.

pub mod regex_cache;

pub use regex_cache::RegexCache;

use crate::alert::{Alert, MatchKind};
use crate::error::CoreError;
use crate::tree::{NodeId, RouteTree};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// The outcome of matching one alert against a tree: the ordered list of
/// matched nodes plus statistics (§3 "MatchResult").
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matches: Vec<NodeId>,
    pub duration: std::time::Duration,
    pub matchers_evaluated: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl MatchResult {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Matches alerts against a tree using an owned, shared regex cache.
///
/// Per §4.2 "Global mutable state" design note (§9): the cache is owned by
/// the matcher that creates it, not a module-level singleton — construct
/// one `RouteMatcher` per evaluator/publisher and share it via `Arc`.
pub struct RouteMatcher {
    regex_cache: RegexCache,
}

impl RouteMatcher {
    pub fn new() -> Self {
        Self {
            regex_cache: RegexCache::new(),
        }
    }

    pub fn with_cache(regex_cache: RegexCache) -> Self {
        Self { regex_cache }
    }

    pub fn regex_cache(&self) -> &RegexCache {
        &self.regex_cache
    }

    /// Match `alert` against `tree`, DFS pre-order, halting globally on the
    /// first `continue=false` match (§4.2 "Traversal").
    ///
    /// The root itself is never a match candidate — its matchers are always
    /// empty by construction (§4.1 builder) and it only ever enters a
    /// decision through the evaluator's explicit fallback-to-root synthesis
    /// (§4.3 step 3). The walk starts at root's children so a tree built
    /// with the ordinary (and default) `continue = false` on root does not
    /// halt before visiting anything.
    pub fn match_alert(&self, tree: &RouteTree, alert: &Alert) -> MatchResult {
        let start = Instant::now();
        let mut matches = Vec::new();
        let mut matchers_evaluated = 0u64;
        let hits_before = self.regex_cache.hits();
        let misses_before = self.regex_cache.misses();

        for &child in &tree.node(tree.root()).children {
            if self.walk(tree, child, alert, &mut matches, &mut matchers_evaluated) {
                break;
            }
        }

        let duration = start.elapsed();
        metrics::histogram!("routing_match_duration_seconds").record(duration.as_secs_f64());

        MatchResult {
            matches,
            duration,
            matchers_evaluated,
            cache_hits: self.regex_cache.hits() - hits_before,
            cache_misses: self.regex_cache.misses() - misses_before,
        }
    }

    /// Cancellable variant (§4.2 "Cancellation"). Checks for cancellation
    /// at traversal entry and exit only; fine-grained per-node checks are
    /// optional per spec and are not performed here.
    pub fn match_alert_cancellable(
        &self,
        tree: &RouteTree,
        alert: &Alert,
        token: &CancellationToken,
    ) -> Result<MatchResult, CoreError> {
        if token.is_cancelled() {
            return Err(CoreError::ContextCancelled);
        }
        let result = self.match_alert(tree, alert);
        if token.is_cancelled() {
            return Err(CoreError::ContextCancelled);
        }
        Ok(result)
    }

    fn walk(
        &self,
        tree: &RouteTree,
        node_id: NodeId,
        alert: &Alert,
        matches: &mut Vec<NodeId>,
        matchers_evaluated: &mut u64,
    ) -> bool {
        let node = tree.node(node_id);
        let is_match = self.evaluate_predicate(node, alert, matchers_evaluated);

        if is_match {
            matches.push(node_id);
            metrics::counter!("routing_matches_total", "route_path" => node.path.clone())
                .increment(1);
            if !node.continue_ {
                // Terminal match: halt the entire traversal (§4.2 — this is
                // the canonical Alertmanager interpretation reproduced here,
                // not merely "stop exploring this level's siblings").
                return true;
            }
        }

        for &child in &node.children {
            if self.walk(tree, child, alert, matches, matchers_evaluated) {
                return true;
            }
        }
        false
    }

    fn evaluate_predicate(
        &self,
        node: &crate::tree::RouteNode,
        alert: &Alert,
        matchers_evaluated: &mut u64,
    ) -> bool {
        for matcher in &node.matchers {
            *matchers_evaluated += 1;
            let value = alert.label(&matcher.name);
            let satisfied = match matcher.kind {
                MatchKind::Equal => matches!(value, Some(v) if v == matcher.value),
                MatchKind::NotEqual => !matches!(value, Some(v) if v == matcher.value),
                MatchKind::Regex => match value {
                    Some(v) => self.regex_matches(&matcher.value, v),
                    None => false,
                },
                MatchKind::NotRegex => match value {
                    Some(v) => !self.regex_matches(&matcher.value, v),
                    None => true,
                },
            };
            if !satisfied {
                // AND semantics: short-circuit on the first failure (§4.2).
                return false;
            }
        }
        true
    }

    fn regex_matches(&self, pattern: &str, value: &str) -> bool {
        match self.regex_cache.get_or_compile(pattern) {
            Some(re) => re.is_match(value),
            None => {
                // Should not occur post-validation; treat as non-match.
                tracing::error!(pattern, "regex failed to compile outside of validation");
                false
            }
        }
    }
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Alert;
    use crate::config::{GlobalDefaults, ReceiverInput, RouteInput};
    use crate::tree::TreeBuilder;
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

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn sample_tree() -> RouteTree {
        let mut pager_match = HashMap::new();
        pager_match.insert("severity".to_string(), "critical".to_string());
        let pager = RouteInput {
            receiver: "pager".to_string(),
            match_equal: pager_match,
            continue_: false,
            ..Default::default()
        };
        let route = RouteInput {
            receiver: "default".to_string(),
            routes: vec![pager],
            ..Default::default()
        };
        TreeBuilder::new(&receivers(&["default", "pager"]), GlobalDefaults::default())
            .build(&route)
            .expect("builds")
    }

    #[test]
    fn single_match_stops_traversal() {
        let tree = sample_tree();
        let matcher = RouteMatcher::new();
        let alert = Alert::new(labels(&[("alertname", "HighCPU"), ("severity", "critical")]), 1);
        let result = matcher.match_alert(&tree, &alert);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(tree.node(result.matches[0]).receiver, "pager");
    }

    #[test]
    fn no_match_returns_empty() {
        let tree = sample_tree();
        let matcher = RouteMatcher::new();
        let alert = Alert::new(labels(&[("alertname", "HighCPU"), ("severity", "info")]), 1);
        let result = matcher.match_alert(&tree, &alert);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn negative_regex_matches_absent_label() {
        // Negative regex isn't expressible via `RouteInput::match_re` (which
        // only carries the positive operator), so build the arena directly
        // to exercise the predicate table's `NotRegex` row.
        use crate::alert::{MatchKind, Matcher};
        use crate::tree::{RouteNode, RouteTree};
        use std::time::Duration;

        let blank = |path: &str, receiver: &str, children: Vec<usize>, matchers: Vec<Matcher>| RouteNode {
            matchers,
            receiver: receiver.to_string(),
            group_by: vec!["alertname".to_string()],
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            repeat_interval: Duration::from_secs(14400),
            continue_: false,
            parent: None,
            children,
            path: path.to_string(),
            level: if path == "/" { 0 } else { 1 },
        };

        let nodes = vec![
            blank("/", "default", vec![1], vec![]),
            blank(
                "/routes[0]",
                "pager",
                vec![],
                vec![Matcher::new("namespace", "dev.*", MatchKind::NotRegex)],
            ),
        ];
        let mut receivers = HashMap::new();
        for name in ["default", "pager"] {
            receivers.insert(
                name.to_string(),
                crate::tree::ReceiverDescriptor::new(name),
            );
        }
        let tree = RouteTree::from_parts(nodes, 0, receivers);

        let matcher = RouteMatcher::new();
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let result = matcher.match_alert(&tree, &alert);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(tree.node(result.matches[0]).receiver, "pager");
    }

    #[test]
    fn continue_true_visits_multiple_siblings() {
        use crate::tree::{RouteNode, RouteTree};
        use std::time::Duration;

        let blank = |path: &str, receiver: &str, children: Vec<usize>, continue_: bool| RouteNode {
            matchers: vec![],
            receiver: receiver.to_string(),
            group_by: vec!["alertname".to_string()],
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            repeat_interval: Duration::from_secs(14400),
            continue_,
            parent: None,
            children,
            path: path.to_string(),
            level: if path == "/" { 0 } else { 1 },
        };

        let nodes = vec![
            blank("/", "default", vec![1, 2, 3], false),
            blank("/routes[0]", "a", vec![], true),
            blank("/routes[1]", "b", vec![], true),
            blank("/routes[2]", "c", vec![], false),
        ];
        let mut receivers = HashMap::new();
        for name in ["default", "a", "b", "c"] {
            receivers.insert(
                name.to_string(),
                crate::tree::ReceiverDescriptor::new(name),
            );
        }
        let tree = RouteTree::from_parts(nodes, 0, receivers);

        let matcher = RouteMatcher::new();
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let result = matcher.match_alert(&tree, &alert);
        assert_eq!(result.matches.len(), 3);
    }
}
