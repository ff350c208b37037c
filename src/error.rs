use std::fmt;

/// Runtime error taxonomy for the evaluator, matcher, and publisher.
///
/// Configuration (tree-build) errors are a separate, batch-reported type —
/// see [`crate::tree::ValidationError`] — since they are collected rather
/// than surfaced as a single failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The tree manager holds no tree (should not occur after a successful build).
    EmptyTree,
    /// No route matched and fallback-to-root was disabled.
    NoMatch,
    /// The matched node's effective receiver was empty (defensive; validation
    /// should have precluded this).
    NoReceiver,
    /// A cancellable operation observed cancellation before completing.
    ContextCancelled,
    /// A regex pattern failed to compile outside of tree validation (e.g. a
    /// warm-start pre-population call).
    InvalidPattern(String),
    /// The publisher was asked to publish with an empty receiver list.
    NoReceivers,
    /// Every receiver in a fan-out failed.
    AllReceiversFailed,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::EmptyTree => write!(f, "tree has no root"),
            CoreError::NoMatch => write!(f, "no route matched"),
            CoreError::NoReceiver => write!(f, "matched node has no receiver"),
            CoreError::ContextCancelled => write!(f, "operation cancelled"),
            CoreError::InvalidPattern(p) => write!(f, "invalid regex pattern: {p}"),
            CoreError::NoReceivers => write!(f, "no receivers to publish to"),
            CoreError::AllReceiversFailed => write!(f, "all receivers failed"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Coarse classification of a receiver publish failure, derived by
/// substring inspection of the error message (§4.4, §9 "Error classification
/// by substring" — pragmatic but lossy; a future revision should expose
/// typed error kinds from receiver plugins and map them directly instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    Network,
    Auth,
    Panic,
    NoPublisher,
    Other,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Timeout => "timeout",
            FailureClass::Network => "network",
            FailureClass::Auth => "auth",
            FailureClass::Panic => "panic",
            FailureClass::NoPublisher => "no_publisher",
            FailureClass::Other => "other",
        }
    }

    /// Classify an error message by substring. Case-insensitive.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            FailureClass::Timeout
        } else if lower.contains("auth")
            || lower.contains("forbidden")
            || lower.contains("401")
            || lower.contains("403")
        {
            FailureClass::Auth
        } else if lower.contains("panic") {
            FailureClass::Panic
        } else if lower.contains("no_publisher") || lower.contains("no publisher") {
            FailureClass::NoPublisher
        } else if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("refused")
            || lower.contains("reset")
        {
            FailureClass::Network
        } else {
            FailureClass::Other
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timeout() {
        assert_eq!(
            FailureClass::classify("upstream timed out"),
            FailureClass::Timeout
        );
    }

    #[test]
    fn classifies_network() {
        assert_eq!(
            FailureClass::classify("connection refused"),
            FailureClass::Network
        );
    }

    #[test]
    fn classifies_auth() {
        assert_eq!(FailureClass::classify("401 Unauthorized"), FailureClass::Auth);
    }

    #[test]
    fn falls_back_to_other() {
        assert_eq!(
            FailureClass::classify("something weird happened"),
            FailureClass::Other
        );
    }
}
