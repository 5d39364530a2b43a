//! Harness configuration.

use crate::policy::{AuthDecision, AutoDialogBehavior, ResponsePolicy, SslDecision};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between a load-finished event and the stability re-check (500ms)
pub const DEFAULT_STABILITY_DELAY_MS: u64 = 500;

/// Script timeouts tolerated per navigation before scripts are aborted
pub const DEFAULT_SCRIPT_TIMEOUT_THRESHOLD: u32 = 2;

/// Configuration for a [`crate::Harness`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Observation window after a load-finished event before the page is
    /// considered stable
    pub stability_delay_ms: u64,
    /// Settle delay used when a navigation does not supply one
    pub default_settle_ms: u64,
    /// Script timeouts allowed per navigation before aborting scripts
    pub script_timeout_threshold: u32,
    /// Dialog answering behavior
    pub dialog_behavior: AutoDialogBehavior,
    /// TLS certificate error answer
    pub ssl_errors: SslDecision,
    /// HTTP auth challenge answer
    pub http_auth: AuthDecision,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            stability_delay_ms: DEFAULT_STABILITY_DELAY_MS,
            default_settle_ms: 0,
            script_timeout_threshold: DEFAULT_SCRIPT_TIMEOUT_THRESHOLD,
            dialog_behavior: AutoDialogBehavior::AcceptAll,
            ssl_errors: SslDecision::Proceed,
            http_auth: AuthDecision::Cancel,
        }
    }
}

impl HarnessConfig {
    /// Create a new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stability observation window
    #[must_use]
    pub const fn with_stability_delay(mut self, ms: u64) -> Self {
        self.stability_delay_ms = ms;
        self
    }

    /// Set the default settle delay
    #[must_use]
    pub const fn with_default_settle(mut self, ms: u64) -> Self {
        self.default_settle_ms = ms;
        self
    }

    /// Set the script timeout threshold
    #[must_use]
    pub const fn with_script_timeout_threshold(mut self, threshold: u32) -> Self {
        self.script_timeout_threshold = threshold;
        self
    }

    /// Set dialog behavior
    #[must_use]
    pub const fn with_dialog_behavior(mut self, behavior: AutoDialogBehavior) -> Self {
        self.dialog_behavior = behavior;
        self
    }

    /// Set TLS error answer
    #[must_use]
    pub const fn with_ssl_errors(mut self, decision: SslDecision) -> Self {
        self.ssl_errors = decision;
        self
    }

    /// Stability window as Duration
    #[must_use]
    pub const fn stability_delay(&self) -> Duration {
        Duration::from_millis(self.stability_delay_ms)
    }

    /// Callback answers derived from this configuration
    #[must_use]
    pub const fn response_policy(&self) -> ResponsePolicy {
        ResponsePolicy {
            dialogs: self.dialog_behavior,
            ssl_errors: self.ssl_errors,
            http_auth: self.http_auth,
        }
    }

    /// Check the configuration before a harness is started
    ///
    /// # Errors
    ///
    /// Returns error if the stability window is zero, which would accept a
    /// load-finished event before same-tick secondary loads can register
    pub fn validate(&self) -> HarnessResult<()> {
        if self.stability_delay_ms == 0 {
            return Err(HarnessError::invalid_config(
                "stability_delay_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.stability_delay_ms, 500);
        assert_eq!(config.default_settle_ms, 0);
        assert_eq!(config.script_timeout_threshold, 2);
        assert_eq!(config.stability_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = HarnessConfig::new()
            .with_stability_delay(50)
            .with_default_settle(200)
            .with_script_timeout_threshold(5)
            .with_dialog_behavior(AutoDialogBehavior::DismissAll)
            .with_ssl_errors(SslDecision::Cancel);
        assert_eq!(config.stability_delay_ms, 50);
        assert_eq!(config.default_settle_ms, 200);
        assert_eq!(config.script_timeout_threshold, 5);
        let policy = config.response_policy();
        assert_eq!(policy.dialogs, AutoDialogBehavior::DismissAll);
        assert_eq!(policy.ssl_errors, SslDecision::Cancel);
    }

    #[test]
    fn test_zero_stability_delay_rejected() {
        let config = HarnessConfig::new().with_stability_delay(0);
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{"default_settle_ms": 750}"#).unwrap();
        assert_eq!(config.default_settle_ms, 750);
        assert_eq!(config.stability_delay_ms, DEFAULT_STABILITY_DELAY_MS);
    }
}
