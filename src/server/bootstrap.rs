//! Gateway lifecycle for the demo binary: init → build → (optional) watch →
//! run → shutdown. Trimmed from the teacher's `server::bootstrap::run` (no
//! etcd/consul, no proxy/admin HTTP servers — both out of this core's scope
//! per spec.md §1) down to what this core actually owns: building the route
//! tree, hot-reloading it, and fanning alerts out through the publisher.

use crate::alert::{Alert, AlertInput};
use crate::config::RoutingConfig;
use crate::manager::TreeManager;
use crate::metrics::Metrics;
use crate::publisher::{FnReceiver, MultiReceiverPublisher, ReceiverPlugin};
use crate::tree::{TreeBuilder, ValidationError};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: PathBuf,
    pub alerts_path: Option<PathBuf>,
    pub watch: bool,
    pub watch_interval: Duration,
}

/// Build the initial tree, optionally start the hot-reload watcher, process
/// a batch of alerts if given, then (in watch mode) block until shutdown.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();
    let metrics = Metrics::install();

    let config = RoutingConfig::load(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path.display()))?;
    let tree = TreeBuilder::new(&config.receivers, config.global.clone())
        .build(&config.route)
        .map_err(|errors| anyhow::anyhow!(format_validation_errors(&errors)))?;

    tracing::info!(
        node_count = tree.stats().node_count,
        max_depth = tree.stats().max_depth,
        receivers = tree.stats().unique_receiver_count,
        "initial route tree built"
    );

    let manager = Arc::new(TreeManager::new(tree));
    let publisher = Arc::new(MultiReceiverPublisher::new(demo_plugins(&manager)));

    let shutdown = Arc::new(Notify::new());
    if args.watch {
        start_reload_watcher(manager.clone(), args.config_path.clone(), args.watch_interval, shutdown.clone());
    }

    if let Some(alerts_path) = &args.alerts_path {
        process_alerts_file(&manager, &publisher, alerts_path).await?;
    } else {
        tracing::info!("no --alerts file given; nothing to publish this run");
    }

    if args.watch {
        tracing::info!("watching {} for config changes, ctrl-c to stop", args.config_path.display());
        wait_for_shutdown(&shutdown).await;
    }

    tracing::info!(
        reloads = manager.reload_count(),
        failed_reloads = manager.failed_reload_count(),
        metrics_bytes = metrics.render().len(),
        "shutdown complete"
    );
    Ok(())
}

fn init_tracing() {
    let (non_blocking, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    // The non-blocking writer's worker thread must outlive `main` for any of
    // this to flush; the demo binary never tears tracing down early, so the
    // guard is intentionally leaked rather than threaded through every return.
    std::mem::forget(guard);
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    let mut msg = format!("route tree failed validation with {} error(s):", errors.len());
    for e in errors {
        msg.push_str(&format!("\n  - {e}"));
    }
    msg
}

/// Log-only stand-ins for real receiver transports, one per name in the
/// catalogue — actual PagerDuty/Slack/webhook delivery is an external
/// collaborator (§1), this binary only demonstrates the fan-out contract.
fn demo_plugins(manager: &TreeManager) -> HashMap<String, Arc<dyn ReceiverPlugin>> {
    manager
        .get_tree()
        .receivers()
        .keys()
        .map(|name| {
            let plugin: Arc<dyn ReceiverPlugin> = Arc::new(FnReceiver::new({
                let name = name.clone();
                move |alert: &Alert| {
                    let name = name.clone();
                    let path = alert
                        .label("alertname")
                        .unwrap_or("<unnamed>")
                        .to_string();
                    Box::pin(async move {
                        tracing::info!(receiver = %name, alertname = %path, "would publish");
                        Ok(())
                    })
                }
            }));
            (name.clone(), plugin)
        })
        .collect()
}

async fn process_alerts_file(
    manager: &TreeManager,
    publisher: &MultiReceiverPublisher,
    path: &Path,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let inputs: Vec<AlertInput> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    for input in inputs {
        let alert = input.into_alert()?;
        let tree = manager.get_tree();
        let token = CancellationToken::new();
        match publisher.publish(&tree, &alert, &token).await {
            Ok(result) => tracing::info!(
                total = result.total,
                success = result.success_count,
                failure = result.failure_count,
                duration_ms = result.duration.as_millis() as u64,
                "published alert"
            ),
            Err(e) => tracing::warn!(error = %e, "publish failed"),
        }
    }
    Ok(())
}

/// Poll the config file's mtime and reload the tree when it changes —
/// a stand-in for the teacher's etcd watch loop, since file-based config
/// distribution is itself out of this core's scope (§1) and only needs to
/// be plausible enough to exercise the hot-reload path end to end.
fn start_reload_watcher(
    manager: Arc<TreeManager>,
    config_path: PathBuf,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    tokio::spawn(async move {
        let mut last_modified = file_modified(&config_path);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.notified() => return,
            }

            let modified = file_modified(&config_path);
            if modified == last_modified {
                continue;
            }
            last_modified = modified;

            match RoutingConfig::load(&config_path) {
                Ok(config) => {
                    match manager
                        .reload(&config.receivers, config.global, &config.route)
                        .await
                    {
                        Ok(tree) => tracing::info!(
                            node_count = tree.stats().node_count,
                            "config change detected, tree reloaded"
                        ),
                        Err(errors) => tracing::warn!(
                            error = %format_validation_errors(&errors),
                            "config change detected but new tree failed validation, keeping current tree"
                        ),
                    }
                }
                Err(e) => tracing::warn!(error = %e, "config change detected but file failed to load"),
            }
        }
    });
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
