//! Tree Manager (§4.5): hot-reload layer over a [`RouteTree`] — lock-free
//! reads via `ArcSwap`, serialized atomic replacement via a write mutex.
//! Grounded in the teacher's `RoutingState`/`GatewayState` pairing of
//! `Arc<ArcSwap<T>>` for hot data with `Arc<Mutex<()>>` (or, here, a real
//! `tokio::sync::Mutex`) to serialize mutation.

use crate::config::{GlobalDefaults, ReceiverInput, RouteInput};
use crate::tree::{RouteTree, TreeBuilder, ValidationError};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Read-only counters exposed alongside the current tree (§4.5 "Update
/// stats").
#[derive(Debug, Default)]
pub struct ManagerStats {
    pub reload_count: AtomicU64,
    pub failed_reload_count: AtomicU64,
    pub rollback_count: AtomicU64,
}

/// Hot-reloadable holder of the active [`RouteTree`].
///
/// `current` always points to some valid tree (§4.5 "States"); `backup`
/// points to the tree displaced by the most recent successful reload, or
/// is empty after construction or `ClearBackup`.
pub struct TreeManager {
    current: ArcSwap<RouteTree>,
    backup: ArcSwap<Option<Arc<RouteTree>>>,
    reload_mu: Mutex<()>,
    stats: ManagerStats,
}

impl TreeManager {
    pub fn new(initial: RouteTree) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(initial)),
            backup: ArcSwap::new(Arc::new(None)),
            reload_mu: Mutex::new(()),
            stats: ManagerStats::default(),
        }
    }

    /// Single atomic load of `current`. No locking, no allocation (§4.5
    /// "Readers never block and always observe a fully constructed tree").
    pub fn get_tree(&self) -> Arc<RouteTree> {
        self.current.load_full()
    }

    /// Build a new tree from `(receivers, global, route)` and, on success,
    /// atomically replace `current`, snapshotting the displaced tree into
    /// `backup`. On build/validation failure `current` is left untouched
    /// and the full error list is returned.
    pub async fn reload(
        &self,
        receivers: &[ReceiverInput],
        global: GlobalDefaults,
        route: &RouteInput,
    ) -> Result<Arc<RouteTree>, Vec<ValidationError>> {
        // Serializes concurrent reloads; does not block readers (§4.5 step 1).
        let _guard = self.reload_mu.lock().await;

        let builder = TreeBuilder::new(receivers, global);
        let new_tree = match builder.build(route) {
            Ok(tree) => Arc::new(tree),
            Err(errors) => {
                self.stats.failed_reload_count.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("routing_tree_reloads_total", "result" => "failure").increment(1);
                tracing::warn!(error_count = errors.len(), "tree reload failed validation");
                return Err(errors);
            }
        };

        let previous = self.current.load_full();
        self.backup.store(Arc::new(Some(previous)));
        self.current.store(new_tree.clone());

        self.stats.reload_count.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("routing_tree_reloads_total", "result" => "success").increment(1);
        metrics::gauge!("routing_tree_nodes").set(new_tree.stats().node_count as f64);
        tracing::info!(
            node_count = new_tree.stats().node_count,
            "tree reload succeeded"
        );

        Ok(new_tree)
    }

    /// Atomically restore `current` from `backup`. Fails if no backup is
    /// held (§4.5 "Rollback").
    pub async fn rollback(&self) -> Result<Arc<RouteTree>, &'static str> {
        let _guard = self.reload_mu.lock().await;
        let backup = (*self.backup.load_full()).clone();
        match backup {
            Some(tree) => {
                self.current.store(tree.clone());
                self.stats.rollback_count.fetch_add(1, Ordering::SeqCst);
                tracing::info!("tree rolled back to previous backup");
                Ok(tree)
            }
            None => Err("no backup available to roll back to"),
        }
    }

    /// Drop the retained backup, releasing its memory. Rollback is no
    /// longer possible afterward (§4.5 "ClearBackup").
    pub async fn clear_backup(&self) {
        let _guard = self.reload_mu.lock().await;
        self.backup.store(Arc::new(None));
    }

    pub fn reload_count(&self) -> u64 {
        self.stats.reload_count.load(Ordering::SeqCst)
    }

    pub fn failed_reload_count(&self) -> u64 {
        self.stats.failed_reload_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> u64 {
        self.stats.rollback_count.load(Ordering::SeqCst)
    }

    pub fn has_backup(&self) -> bool {
        self.backup.load().is_some()
    }
}
