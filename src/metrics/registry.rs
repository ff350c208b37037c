use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds). The matcher
/// and evaluator target sub-100us evaluations (§4.2 "Complexity"), so the
/// low end is finer-grained than a typical HTTP-latency histogram; the
/// publisher's network-bound fan-out needs the coarser high end.
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder, installed once at binary
/// startup (library code never installs a recorder itself).
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register every metric
    /// family named in spec.md §6. Must be called **once**, before any
    /// `counter!`/`gauge!`/`histogram!` call anywhere in the process.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        // -- Route Matcher --
        describe_counter!(
            "routing_matches_total",
            Unit::Count,
            "Total nodes matched during traversal, by route path"
        );
        describe_histogram!(
            "routing_match_duration_seconds",
            Unit::Seconds,
            "Wall-clock duration of a single Match call"
        );
        describe_counter!(
            "routing_regex_cache_hits_total",
            Unit::Count,
            "Total regex cache hits"
        );
        describe_counter!(
            "routing_regex_cache_misses_total",
            Unit::Count,
            "Total regex cache misses"
        );
        describe_gauge!(
            "routing_regex_cache_size",
            Unit::Count,
            "Current number of compiled patterns held in the regex cache"
        );

        // -- Route Evaluator --
        describe_counter!(
            "routing_evaluations_total",
            Unit::Count,
            "Total route evaluations, by resolved receiver"
        );
        describe_histogram!(
            "routing_evaluation_duration_seconds",
            Unit::Seconds,
            "Wall-clock duration of a single Evaluate call"
        );
        describe_counter!(
            "routing_no_match_total",
            Unit::Count,
            "Total evaluations that fell back to the root default"
        );
        describe_counter!(
            "routing_multi_receiver_total",
            Unit::Count,
            "Total evaluations that produced one or more alternatives"
        );
        describe_counter!(
            "routing_errors_total",
            Unit::Count,
            "Total evaluator/matcher errors, by error_type"
        );

        // -- Multi-Receiver Publisher --
        describe_counter!(
            "multi_receiver_publishes_total",
            Unit::Count,
            "Total multi-receiver publish operations, by result"
        );
        describe_histogram!(
            "multi_receiver_duration_seconds",
            Unit::Seconds,
            "Wall-clock duration of a multi-receiver publish (max, not sum, of per-receiver durations)"
        );
        describe_counter!(
            "receiver_publish_success_total",
            Unit::Count,
            "Total successful per-receiver publishes, by receiver"
        );
        describe_counter!(
            "receiver_publish_failure_total",
            Unit::Count,
            "Total failed per-receiver publishes, by receiver and error_type"
        );
        describe_histogram!(
            "multi_receiver_parallel_receivers_count",
            Unit::Count,
            "Number of receivers fanned out to per publish call"
        );

        // -- Tree Manager --
        describe_counter!(
            "routing_tree_reloads_total",
            Unit::Count,
            "Total tree reload attempts, by result"
        );
        describe_gauge!(
            "routing_tree_nodes",
            Unit::Count,
            "Node count of the currently active tree"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
