//! Routing and dispatch core of an Alertmanager-compatible alert pipeline:
//! builds an immutable route tree, matches alerts against it, evaluates a
//! routing decision, and fans alerts out to receiver plugins in parallel.
//!
//! Configuration parsing beyond TOML/JSON, receiver transports, dedup,
//! enrichment, inhibition, persistence and HTTP surfaces are out of scope —
//! those are external collaborators this crate only defines interfaces for.

pub mod alert;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod manager;
pub mod matcher;
pub mod metrics;
pub mod publisher;
pub mod server;
pub mod tree;

pub use alert::{Alert, AlertInput, MatchKind, Matcher};
pub use config::{GlobalDefaults, ReceiverInput, RouteInput, RoutingConfig};
pub use error::{CoreError, FailureClass};
pub use evaluator::{EvaluationResult, RouteEvaluator, RoutingDecision};
pub use manager::TreeManager;
pub use matcher::{MatchResult, RegexCache, RouteMatcher};
pub use metrics::Metrics;
pub use publisher::{
    FnReceiver, MultiReceiverPublisher, MultiReceiverResult, ReceiverPlugin, ReceiverResult,
};
pub use tree::{
    NodeId, ReceiverDescriptor, RouteNode, RouteTree, TreeBuilder, TreeStats, ValidationError,
    ValidationErrorKind,
};
