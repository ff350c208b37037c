//! Multi-Receiver Publisher (§4.4): evaluates routes, then fans the alert
//! out to every resolved receiver concurrently, isolating each receiver's
//! failure (including panics) from the others.

use crate::alert::Alert;
use crate::error::{CoreError, FailureClass};
use crate::evaluator::RouteEvaluator;
use crate::tree::RouteTree;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default per-receiver publish timeout (§4.4 "default 10 s").
pub const DEFAULT_RECEIVER_TIMEOUT: Duration = Duration::from_secs(10);

/// The external receiver transport contract (§6 "Receiver plugins"): a
/// single `publish` operation, cancellation-aware, safe for concurrent use.
///
/// A trait rather than the teacher's closed `Filter` enum, since receiver
/// transports are genuinely external and pluggable (§4.4 supplement).
#[async_trait]
pub trait ReceiverPlugin: Send + Sync {
    async fn publish(&self, alert: &Alert, token: &CancellationToken) -> Result<(), String>;
}

/// Adapts a plain async closure into a [`ReceiverPlugin`], so tests and
/// small embeddings can supply an in-process fake without a boilerplate
/// trait-object file per case.
pub struct FnReceiver<F> {
    f: F,
}

impl<F> FnReceiver<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ReceiverPlugin for FnReceiver<F>
where
    F: for<'a> Fn(&'a Alert) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>
        + Send
        + Sync,
{
    async fn publish(&self, alert: &Alert, _token: &CancellationToken) -> Result<(), String> {
        (self.f)(alert).await
    }
}

/// `(receiver name, success flag, duration, optional error kind)` (§3).
#[derive(Debug, Clone)]
pub struct ReceiverResult {
    pub receiver: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub failure_class: Option<FailureClass>,
}

/// Aggregate outcome of one multi-receiver publish (§3 "MultiReceiverResult").
#[derive(Debug, Clone)]
pub struct MultiReceiverResult {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<ReceiverResult>,
    pub duration: Duration,
}

impl MultiReceiverResult {
    pub fn is_full_success(&self) -> bool {
        self.total > 0 && self.success_count == self.total
    }

    pub fn is_partial_success(&self) -> bool {
        self.success_count > 0 && self.failure_count > 0
    }

    pub fn is_all_failed(&self) -> bool {
        self.total > 0 && self.failure_count == self.total
    }
}

/// Fans an alert out to its resolved receivers. Holds no per-publish state
/// (§4.4 "Concurrency guarantees"): safe to share across tasks behind an
/// `Arc`.
pub struct MultiReceiverPublisher {
    evaluator: RouteEvaluator,
    receiver_timeout: Duration,
    plugins: HashMap<String, Arc<dyn ReceiverPlugin>>,
}

impl MultiReceiverPublisher {
    pub fn new(plugins: HashMap<String, Arc<dyn ReceiverPlugin>>) -> Self {
        Self {
            evaluator: RouteEvaluator::new(),
            receiver_timeout: DEFAULT_RECEIVER_TIMEOUT,
            plugins,
        }
    }

    pub fn with_evaluator(mut self, evaluator: RouteEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_receiver_timeout(mut self, timeout: Duration) -> Self {
        self.receiver_timeout = timeout;
        self
    }

    /// Evaluate routes for `alert`, then publish to every resolved receiver
    /// concurrently (§4.4 "Given an alert, (i) evaluate ... (iv) aggregate").
    pub async fn publish(
        &self,
        tree: &RouteTree,
        alert: &Alert,
        token: &CancellationToken,
    ) -> Result<MultiReceiverResult, CoreError> {
        let decision = self.evaluator.evaluate_with_alternatives(tree, alert)?;
        let receivers = decision.receiver_names();
        self.publish_to(&receivers, alert, token).await
    }

    /// Publish directly to a named receiver list, bypassing the evaluator.
    /// Used by the hot-path `publish` above and directly by callers that
    /// already hold a `RoutingDecision`.
    pub async fn publish_to(
        &self,
        receivers: &[String],
        alert: &Alert,
        token: &CancellationToken,
    ) -> Result<MultiReceiverResult, CoreError> {
        if receivers.is_empty() {
            metrics::counter!("multi_receiver_publishes_total", "result" => "no_receivers")
                .increment(1);
            return Err(CoreError::NoReceivers);
        }

        let start = Instant::now();
        let concurrency = receivers.len().max(1);

        let results: Vec<ReceiverResult> = stream::iter(receivers.iter().cloned().enumerate())
            .map(|(_idx, name)| self.publish_one(name, alert, token))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let total = results.len();
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = total - success_count;
        let duration = start.elapsed();

        metrics::histogram!("multi_receiver_duration_seconds").record(duration.as_secs_f64());
        metrics::histogram!("multi_receiver_parallel_receivers_count").record(total as f64);

        let outcome = MultiReceiverResult {
            total,
            success_count,
            failure_count,
            results,
            duration,
        };

        let result_label = if outcome.is_full_success() {
            "full_success"
        } else if outcome.is_partial_success() {
            "partial_success"
        } else {
            "all_failed"
        };
        metrics::counter!("multi_receiver_publishes_total", "result" => result_label).increment(1);

        if outcome.is_all_failed() {
            return Err(CoreError::AllReceiversFailed);
        }

        Ok(outcome)
    }

    /// Run one receiver's publish under its own timeout, trapping both the
    /// plugin's returned error and any panic (§4.4 "Each task is isolated").
    async fn publish_one(
        &self,
        name: String,
        alert: &Alert,
        token: &CancellationToken,
    ) -> ReceiverResult {
        let start = Instant::now();

        let plugin = match self.plugins.get(&name) {
            Some(p) => p.clone(),
            None => {
                let duration = start.elapsed();
                metrics::counter!("receiver_publish_failure_total", "receiver" => name.clone(), "error_type" => "no_publisher")
                    .increment(1);
                return ReceiverResult {
                    receiver: name,
                    success: false,
                    duration,
                    error: Some("no publisher registered for this receiver".to_string()),
                    failure_class: Some(FailureClass::NoPublisher),
                };
            }
        };

        let child_token = token.child_token();
        let alert = alert.clone();
        let timeout = self.receiver_timeout;

        // `tokio::spawn` gives us panic isolation for free: a panicking
        // plugin poisons only its own task, surfaced here as a `JoinError`.
        let join = tokio::spawn(async move {
            tokio::time::timeout(timeout, plugin.publish(&alert, &child_token)).await
        })
        .await;

        let duration = start.elapsed();
        let outcome = match join {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_elapsed)) => Err("timeout".to_string()),
            Err(join_err) => {
                if join_err.is_panic() {
                    Err("panic in receiver task".to_string())
                } else {
                    Err("receiver task cancelled".to_string())
                }
            }
        };

        match outcome {
            Ok(()) => {
                metrics::counter!("receiver_publish_success_total", "receiver" => name.clone())
                    .increment(1);
                ReceiverResult {
                    receiver: name,
                    success: true,
                    duration,
                    error: None,
                    failure_class: None,
                }
            }
            Err(message) => {
                let class = FailureClass::classify(&message);
                metrics::counter!("receiver_publish_failure_total", "receiver" => name.clone(), "error_type" => class.as_str())
                    .increment(1);
                ReceiverResult {
                    receiver: name,
                    success: false,
                    duration,
                    error: Some(message),
                    failure_class: Some(class),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalDefaults, ReceiverInput, RouteInput};
    use crate::tree::TreeBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    struct SleepyOk {
        millis: u64,
    }

    #[async_trait]
    impl ReceiverPlugin for SleepyOk {
        async fn publish(&self, _alert: &Alert, _token: &CancellationToken) -> Result<(), String> {
            tokio::time::sleep(StdDuration::from_millis(self.millis)).await;
            Ok(())
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl ReceiverPlugin for AlwaysFail {
        async fn publish(&self, _alert: &Alert, _token: &CancellationToken) -> Result<(), String> {
            Err("connection refused".to_string())
        }
    }

    struct AlwaysPanics;

    #[async_trait]
    impl ReceiverPlugin for AlwaysPanics {
        async fn publish(&self, _alert: &Alert, _token: &CancellationToken) -> Result<(), String> {
            panic!("boom");
        }
    }

    fn plugins(entries: Vec<(&str, Arc<dyn ReceiverPlugin>)>) -> HashMap<String, Arc<dyn ReceiverPlugin>> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn parallel_publish_is_wall_clock_max_not_sum() {
        let ps = plugins(vec![
            ("pager", Arc::new(SleepyOk { millis: 100 })),
            ("slack", Arc::new(SleepyOk { millis: 100 })),
        ]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let result = publisher
            .publish_to(&["pager".to_string(), "slack".to_string()], &alert, &token)
            .await
            .unwrap();
        assert!(result.duration < StdDuration::from_millis(180));
        assert!(result.is_full_success());
    }

    #[tokio::test]
    async fn partial_failure_is_not_an_error() {
        let ps = plugins(vec![
            ("pager", Arc::new(SleepyOk { millis: 1 }) as Arc<dyn ReceiverPlugin>),
            ("slack", Arc::new(AlwaysFail)),
        ]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let result = publisher
            .publish_to(&["pager".to_string(), "slack".to_string()], &alert, &token)
            .await
            .unwrap();
        assert!(result.is_partial_success());
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn all_receivers_failed_surfaces_as_error() {
        let ps = plugins(vec![("slack", Arc::new(AlwaysFail))]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let err = publisher
            .publish_to(&["slack".to_string()], &alert, &token)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::AllReceiversFailed);
    }

    #[tokio::test]
    async fn panic_in_one_receiver_does_not_affect_others() {
        let ps = plugins(vec![
            ("stable", Arc::new(SleepyOk { millis: 1 }) as Arc<dyn ReceiverPlugin>),
            ("crashy", Arc::new(AlwaysPanics)),
        ]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let result = publisher
            .publish_to(&["stable".to_string(), "crashy".to_string()], &alert, &token)
            .await
            .unwrap();
        assert!(result.is_partial_success());
        let crashy = result.results.iter().find(|r| r.receiver == "crashy").unwrap();
        assert!(!crashy.success);
        assert_eq!(crashy.failure_class, Some(FailureClass::Panic));
    }

    #[tokio::test]
    async fn missing_plugin_records_no_publisher() {
        let ps = plugins(vec![]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let err = publisher
            .publish_to(&["ghost".to_string()], &alert, &token)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::AllReceiversFailed);
    }

    #[tokio::test]
    async fn empty_receiver_list_fails_fast() {
        let ps = plugins(vec![]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        let token = CancellationToken::new();
        let err = publisher.publish_to(&[], &alert, &token).await.unwrap_err();
        assert_eq!(err, CoreError::NoReceivers);
    }

    #[tokio::test]
    async fn evaluator_driven_publish_reaches_resolved_receivers() {
        // Two sibling routes both match; the first continues past itself
        // (§4.2 "Traversal") so the evaluator resolves primary + one
        // alternative, and the publisher must reach both.
        let mut match_equal = HashMap::new();
        match_equal.insert("severity".to_string(), "critical".to_string());
        let first = RouteInput {
            receiver: "default".to_string(),
            match_equal: match_equal.clone(),
            continue_: true,
            ..Default::default()
        };
        let second = RouteInput {
            receiver: "pager".to_string(),
            match_equal,
            continue_: false,
            ..Default::default()
        };
        let route = RouteInput {
            receiver: "default".to_string(),
            routes: vec![first, second],
            ..Default::default()
        };
        let receivers_input = vec![
            ReceiverInput { name: "default".to_string(), status: 1, opaque: serde_json::Map::new() },
            ReceiverInput { name: "pager".to_string(), status: 1, opaque: serde_json::Map::new() },
        ];
        let tree = TreeBuilder::new(&receivers_input, GlobalDefaults::default())
            .build(&route)
            .expect("builds");

        let calls = Arc::new(AtomicUsize::new(0));
        let counted_a = calls.clone();
        let counted_b = calls.clone();
        let ps = plugins(vec![
            ("default", Arc::new(FnReceiver::new(move |_a| {
                let c = counted_a.clone();
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }))),
            ("pager", Arc::new(FnReceiver::new(move |_a| {
                let c = counted_b.clone();
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }))),
        ]);
        let publisher = MultiReceiverPublisher::new(ps);
        let alert = Alert::new(labels(&[("alertname", "X"), ("severity", "critical")]), 1);
        let token = CancellationToken::new();
        let result = publisher.publish(&tree, &alert, &token).await.unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
