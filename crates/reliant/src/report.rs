//! Per-navigation outcome.

use crate::event::LoadError;
use serde::{Deserialize, Serialize};

/// How a navigation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The page reached a stable state before the timeout
    Completed,
    /// The timeout fired first
    TimedOut,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Value released through the completion gate when a navigation ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationReport {
    /// Navigation epoch
    pub epoch: u64,
    /// Requested URL
    pub url: String,
    /// URL the engine ended on, if known
    pub final_url: Option<String>,
    /// How it ended
    pub outcome: Outcome,
    /// Time from navigate to release, in milliseconds
    pub elapsed_ms: u64,
    /// Load-started events seen
    pub load_starts: u64,
    /// Engine progress read when the timeout fired
    pub progress_at_timeout: Option<u8>,
    /// Script timeouts reported by the engine
    pub script_timeouts: u32,
    /// Last title reported
    pub title: Option<String>,
    /// Recoverable errors reported during the load
    pub errors: Vec<LoadError>,
}

impl NavigationReport {
    /// Whether the timeout fired
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.outcome == Outcome::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_outcome() {
        let report = NavigationReport {
            epoch: 1,
            url: "http://example/".to_string(),
            final_url: None,
            outcome: Outcome::TimedOut,
            elapsed_ms: 2000,
            load_starts: 1,
            progress_at_timeout: Some(60),
            script_timeouts: 0,
            title: None,
            errors: Vec::new(),
        };
        assert!(report.timed_out());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"TimedOut\""));
        let back: NavigationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Completed.to_string(), "completed");
        assert_eq!(Outcome::TimedOut.to_string(), "timed out");
    }
}
