//! External route configuration — the shape of the data the Tree Builder
//! consumes (§6 "Consumed (inbound): Route configuration").
//!
//! YAML binding itself is out of scope for this core (§1 Non-goals); these
//! types are plain `serde` structs so they can be loaded from TOML or JSON
//! — or built programmatically by an embedding application that owns its
//! own YAML layer — the same way the teacher's `GatewayConfig::load`
//! dispatches on file extension.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

fn default_status() -> u8 {
    1
}

/// Deserialize a `T` that implements `Default`, treating JSON/TOML `null`
/// the same as a missing field.
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level input to the Tree Builder: a single root route plus the
/// receiver catalogue it may reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub route: RouteInput,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub receivers: Vec<ReceiverInput>,

    #[serde(default)]
    pub global: GlobalDefaults,
}

impl RoutingConfig {
    /// Load from a TOML or JSON file. Business routing config is expected
    /// to come from an external control plane in production (etcd, a file
    /// watcher, an admin API — all out of this core's scope); this loader
    /// exists so the demo binary and tests have a concrete entry point.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RoutingConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
            None => anyhow::bail!("config file has no extension, use .toml or .json"),
        };
        Ok(config)
    }
}

/// Global defaults inherited by routes that don't set their own (§4.1 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDefaults {
    #[serde(default)]
    pub group_by: Vec<String>,

    #[serde(default)]
    pub group_wait: Option<String>,

    #[serde(default)]
    pub group_interval: Option<String>,

    #[serde(default)]
    pub repeat_interval: Option<String>,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            group_by: Vec::new(),
            group_wait: None,
            group_interval: None,
            repeat_interval: None,
        }
    }
}

/// One node of the input route tree, as read from config.
///
/// Durations use the common notation (`30s`, `5m`, `4h`) parsed with
/// `humantime::parse_duration`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteInput {
    #[serde(default)]
    pub receiver: String,

    #[serde(default, rename = "continue")]
    pub continue_: bool,

    #[serde(default, rename = "match", deserialize_with = "deserialize_null_default")]
    pub match_equal: HashMap<String, String>,

    #[serde(default, rename = "match_re", deserialize_with = "deserialize_null_default")]
    pub match_regex: HashMap<String, String>,

    #[serde(default)]
    pub group_by: Option<Vec<String>>,

    #[serde(default)]
    pub group_wait: Option<String>,

    #[serde(default)]
    pub group_interval: Option<String>,

    #[serde(default)]
    pub repeat_interval: Option<String>,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub routes: Vec<RouteInput>,
}

/// A receiver catalogue entry. The transport-specific fields are carried
/// opaquely — this core never interprets them (§1 Non-goals: receiver
/// implementations are external collaborators).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverInput {
    pub name: String,

    #[serde(default = "default_status")]
    pub status: u8,

    #[serde(flatten)]
    pub opaque: serde_json::Map<String, serde_json::Value>,
}

/// Parse a duration string in the common notation (`30s`, `5m`, `4h`).
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(s).map_err(|e| anyhow::anyhow!("invalid duration '{s}': {e}"))
}
