//! Route Evaluator (§4.3): turns a matcher result into a complete routing
//! decision, with an optional fallback-to-root policy when nothing matches.

use crate::alert::Alert;
use crate::error::CoreError;
use crate::matcher::RouteMatcher;
use crate::tree::{NodeId, RouteTree};
use std::time::Instant;

/// Immutable snapshot of a matched node's effective parameters (§3
/// "RoutingDecision").
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub receiver: String,
    pub group_by: Vec<String>,
    pub group_wait: std::time::Duration,
    pub group_interval: std::time::Duration,
    pub repeat_interval: std::time::Duration,
    pub path: String,
    pub match_duration: std::time::Duration,
    pub routes_evaluated: u64,
    pub cache_hit_rate: f64,
}

/// Primary decision plus zero or more alternatives (§3 "EvaluationResult").
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub primary: RoutingDecision,
    pub alternatives: Vec<RoutingDecision>,
    pub duration: std::time::Duration,
}

impl EvaluationResult {
    /// All receiver names in order: primary then alternatives (§4.4 step ii).
    pub fn receiver_names(&self) -> Vec<String> {
        std::iter::once(self.primary.receiver.clone())
            .chain(self.alternatives.iter().map(|d| d.receiver.clone()))
            .collect()
    }
}

/// `/ (root default)` — the synthetic path used when fallback-to-root
/// produces the decision (§4.3 step 3).
const ROOT_FALLBACK_PATH: &str = "/ (root default)";

/// Stateless, thread-safe orchestrator: `Evaluate`/`EvaluateWithAlternatives`
/// over a `(tree, alert)` pair (§4.3). Holds only a shared matcher.
pub struct RouteEvaluator {
    matcher: RouteMatcher,
    fallback_to_root: bool,
}

impl RouteEvaluator {
    /// Fallback-to-root is enabled by default (§4.3 step 3).
    pub fn new() -> Self {
        Self {
            matcher: RouteMatcher::new(),
            fallback_to_root: true,
        }
    }

    pub fn with_matcher(matcher: RouteMatcher) -> Self {
        Self {
            matcher,
            fallback_to_root: true,
        }
    }

    pub fn with_fallback_to_root(mut self, enabled: bool) -> Self {
        self.fallback_to_root = enabled;
        self
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    /// Primary decision only; no alternatives computed.
    pub fn evaluate(&self, tree: &RouteTree, alert: &Alert) -> Result<EvaluationResult, CoreError> {
        self.evaluate_inner(tree, alert, false)
    }

    /// Primary plus alternatives — the rest of the DFS match list, each
    /// preserving its own node's parameters (§4.3 step 4).
    pub fn evaluate_with_alternatives(
        &self,
        tree: &RouteTree,
        alert: &Alert,
    ) -> Result<EvaluationResult, CoreError> {
        self.evaluate_inner(tree, alert, true)
    }

    fn evaluate_inner(
        &self,
        tree: &RouteTree,
        alert: &Alert,
        with_alternatives: bool,
    ) -> Result<EvaluationResult, CoreError> {
        let start = Instant::now();

        if tree.nodes().is_empty() {
            metrics::counter!("routing_errors_total", "error_type" => "empty_tree").increment(1);
            return Err(CoreError::EmptyTree);
        }

        let match_result = self.matcher.match_alert(tree, alert);

        let (primary, alternative_ids): (RoutingDecision, &[NodeId]) = if match_result.matches.is_empty() {
            if self.fallback_to_root {
                metrics::counter!("routing_no_match_total").increment(1);
                let decision = decision_for_root(tree, &match_result);
                (decision, &[])
            } else {
                metrics::counter!("routing_errors_total", "error_type" => "no_match").increment(1);
                return Err(CoreError::NoMatch);
            }
        } else {
            let primary_id = match_result.matches[0];
            let primary_node = tree.node(primary_id);
            if primary_node.receiver.trim().is_empty() {
                metrics::counter!("routing_errors_total", "error_type" => "no_receiver").increment(1);
                return Err(CoreError::NoReceiver);
            }
            let decision = decision_for_node(tree, primary_id, &match_result);
            (decision, &match_result.matches[1..])
        };

        let alternatives = if with_alternatives {
            let alts: Vec<RoutingDecision> = alternative_ids
                .iter()
                .filter_map(|&id| {
                    let node = tree.node(id);
                    if node.receiver.trim().is_empty() {
                        // Skipped, not fatal (§4.3 step 7).
                        tracing::warn!(path = %node.path, "alternative route has empty receiver, skipping");
                        None
                    } else {
                        Some(decision_for_node(tree, id, &match_result))
                    }
                })
                .collect();
            if !alts.is_empty() {
                metrics::counter!("routing_multi_receiver_total").increment(1);
            }
            alts
        } else {
            Vec::new()
        };

        metrics::counter!("routing_evaluations_total", "receiver" => primary.receiver.clone())
            .increment(1);
        let total_duration = start.elapsed();
        metrics::histogram!("routing_evaluation_duration_seconds").record(total_duration.as_secs_f64());

        Ok(EvaluationResult {
            primary,
            alternatives,
            duration: total_duration,
        })
    }
}

impl Default for RouteEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn decision_for_node(
    tree: &RouteTree,
    id: NodeId,
    match_result: &crate::matcher::MatchResult,
) -> RoutingDecision {
    let node = tree.node(id);
    RoutingDecision {
        receiver: node.receiver.clone(),
        group_by: node.group_by.clone(),
        group_wait: node.group_wait,
        group_interval: node.group_interval,
        repeat_interval: node.repeat_interval,
        path: node.path.clone(),
        match_duration: match_result.duration,
        routes_evaluated: match_result.matchers_evaluated,
        cache_hit_rate: match_result.cache_hit_rate(),
    }
}

fn decision_for_root(tree: &RouteTree, match_result: &crate::matcher::MatchResult) -> RoutingDecision {
    let root = tree.node(tree.root());
    RoutingDecision {
        receiver: root.receiver.clone(),
        group_by: root.group_by.clone(),
        group_wait: root.group_wait,
        group_interval: root.group_interval,
        repeat_interval: root.repeat_interval,
        path: ROOT_FALLBACK_PATH.to_string(),
        match_duration: match_result.duration,
        routes_evaluated: match_result.matchers_evaluated,
        cache_hit_rate: match_result.cache_hit_rate(),
    }
}
