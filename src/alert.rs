use serde::Deserialize;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// An immutable firing/resolved alert.
///
/// Label keys are unique within a single alert; order carries no meaning.
/// An alert is "firing" iff `ends_at` is unset or in the future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    labels: HashMap<String, String>,
    starts_at: u64,
    ends_at: Option<u64>,
}

impl Alert {
    /// Build an alert from a label map and a start timestamp (unix seconds).
    pub fn new(labels: HashMap<String, String>, starts_at: u64) -> Self {
        Self {
            labels,
            starts_at,
            ends_at: None,
        }
    }

    /// Mark the alert resolved at the given timestamp (unix seconds).
    pub fn with_ends_at(mut self, ends_at: u64) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    pub fn starts_at(&self) -> u64 {
        self.starts_at
    }

    pub fn ends_at(&self) -> Option<u64> {
        self.ends_at
    }

    /// True iff the alert has no end time, or its end time is still in the future.
    pub fn is_firing(&self) -> bool {
        match self.ends_at {
            None => true,
            Some(ends_at) => ends_at > now_unix(),
        }
    }

    /// Labels sorted by name — used only for stable debug/log output, not
    /// a deduplication fingerprint (that subsystem is external to this core).
    pub fn fingerprint_labels(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable_by_key(|(k, _)| *k);
        pairs
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The wire shape of an inbound alert (§6 "Alert. Labels mapping, startsAt,
/// endsAt") — RFC3339 timestamps, the Alertmanager convention, converted to
/// unix seconds for the internal [`Alert`] representation.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertInput {
    pub labels: HashMap<String, String>,
    #[serde(rename = "startsAt")]
    pub starts_at: String,
    #[serde(rename = "endsAt", default)]
    pub ends_at: Option<String>,
}

impl AlertInput {
    /// Parse RFC3339 timestamps and build the internal [`Alert`]. A
    /// malformed `startsAt` is a caller error (demo-loader concern only —
    /// the core itself never parses timestamps).
    pub fn into_alert(self) -> anyhow::Result<Alert> {
        let starts_at = parse_rfc3339(&self.starts_at)?;
        let mut alert = Alert::new(self.labels, starts_at);
        if let Some(ends_at) = self.ends_at {
            alert = alert.with_ends_at(parse_rfc3339(&ends_at)?);
        }
        Ok(alert)
    }
}

fn parse_rfc3339(s: &str) -> anyhow::Result<u64> {
    let d = humantime::parse_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("invalid RFC3339 timestamp '{s}': {e}"))?;
    Ok(d.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

/// The operator of a single label predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `=` — present and byte-exact equal.
    Equal,
    /// `!=` — absent, or present and byte-exact not-equal.
    NotEqual,
    /// `=~` — present and the compiled regex matches the value.
    Regex,
    /// `!~` — absent, or present and the compiled regex does not match.
    NotRegex,
}

/// A single `(name, value, kind)` label predicate.
///
/// `name` must be non-empty. For `Regex`/`NotRegex` kinds, `value` must
/// compile as a POSIX-extended regular expression — this is checked at
/// tree-build time (§4.1.1), not at construction time, since a `Matcher`
/// may be constructed before the regex cache it will be matched against
/// exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub kind: MatchKind,
}

impl Matcher {
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: MatchKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }

    /// The operator token, used when building a signature for duplicate-sibling detection.
    pub fn op_token(&self) -> &'static str {
        match self.kind {
            MatchKind::Equal => "=",
            MatchKind::NotEqual => "!=",
            MatchKind::Regex => "=~",
            MatchKind::NotRegex => "!~",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn firing_with_no_end() {
        let alert = Alert::new(labels(&[("alertname", "X")]), 1);
        assert!(alert.is_firing());
    }

    #[test]
    fn resolved_in_the_past_is_not_firing() {
        let alert = Alert::new(labels(&[("alertname", "X")]), 1).with_ends_at(1);
        assert!(!alert.is_firing());
    }

    #[test]
    fn fingerprint_labels_are_sorted() {
        let alert = Alert::new(labels(&[("z", "1"), ("a", "2")]), 1);
        let pairs = alert.fingerprint_labels();
        assert_eq!(pairs, vec![("a", "2"), ("z", "1")]);
    }

    #[test]
    fn alert_input_parses_rfc3339_timestamps() {
        let input = AlertInput {
            labels: labels(&[("alertname", "X")]),
            starts_at: "2024-01-01T00:00:00Z".to_string(),
            ends_at: Some("2024-01-01T01:00:00Z".to_string()),
        };
        let alert = input.into_alert().expect("parses");
        assert!(alert.starts_at() > 0);
        assert_eq!(alert.ends_at().unwrap() - alert.starts_at(), 3600);
    }

    #[test]
    fn alert_input_rejects_malformed_timestamp() {
        let input = AlertInput {
            labels: labels(&[("alertname", "X")]),
            starts_at: "not-a-timestamp".to_string(),
            ends_at: None,
        };
        assert!(input.into_alert().is_err());
    }
}
