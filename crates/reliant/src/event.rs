//! Events consumed by the dispatcher.
//!
//! Engine callbacks, caller commands and timer continuations all arrive as
//! one [`HarnessEvent`] enum and are handled by a single dispatch function,
//! so navigation state only ever changes on the dispatcher thread.

use crate::policy::{AuthDecision, Dialog, DialogAction, SslDecision};
use crate::scheduler::TimerId;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A request to load one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    /// Target URL; empty ends the harness
    pub url: String,
    /// Timeout in milliseconds (0 = no timeout)
    pub timeout_ms: u64,
    /// Extra wait after the page is stable; `None` uses the configured default
    pub settle_ms: Option<u64>,
}

impl NavigationRequest {
    /// Create a request with a timeout and the default settle delay
    #[must_use]
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            timeout_ms,
            settle_ms: None,
        }
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = Some(settle_ms);
        self
    }

    /// Whether this request ends the test sequence
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.url.trim().is_empty()
    }
}

/// A recoverable load error reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadError {
    /// Engine-specific error code
    pub code: i32,
    /// Human-readable description
    pub description: String,
    /// URL that failed
    pub url: String,
}

/// Continuations scheduled by the dispatcher onto itself.
///
/// Each one carries the epoch of the navigation that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Re-check stability; `token` is the load-start count at schedule time
    StabilityCheck {
        /// Navigation epoch
        epoch: u64,
        /// Load-start counter snapshot
        token: u64,
    },
    /// Settle delay elapsed after stability
    Settled {
        /// Navigation epoch
        epoch: u64,
    },
    /// Navigation timeout fired
    Timeout {
        /// Navigation epoch
        epoch: u64,
    },
}

/// Everything the dispatcher reacts to
#[derive(Debug)]
pub enum HarnessEvent {
    /// A page or frame load began
    LoadStarted {
        /// URL being loaded
        url: String,
    },
    /// A page or frame load finished
    LoadFinished {
        /// URL that finished
        url: String,
    },
    /// A script ran too long; reply `true` to abort it
    ScriptTimeout {
        /// Abort decision
        reply: oneshot::Sender<bool>,
    },
    /// Recoverable load error
    LoadError(LoadError),
    /// TLS certificate error
    SslError {
        /// Error description
        error: String,
        /// Decision
        reply: oneshot::Sender<SslDecision>,
    },
    /// HTTP authentication challenge
    HttpAuth {
        /// Host asking for credentials
        host: String,
        /// Auth realm
        realm: String,
        /// Decision
        reply: oneshot::Sender<AuthDecision>,
    },
    /// JavaScript dialog
    Dialog {
        /// The dialog
        dialog: Dialog,
        /// Answer
        reply: oneshot::Sender<DialogAction>,
    },
    /// Page title changed
    TitleReceived {
        /// New title
        title: String,
    },
    /// Caller asked for a navigation
    Navigate(NavigationRequest),
    /// Caller asked for a reset
    Reset,
    /// A scheduled continuation is due
    Timer {
        /// Timer that fired
        id: TimerId,
        /// What to run
        task: Deferred,
    },
    /// Stop the dispatcher
    Shutdown,
}

/// Handle engine bindings use to report lifecycle events.
///
/// Cheap to clone. Posting never blocks; callbacks that need an answer return
/// a receiver the engine awaits off the dispatcher thread.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<HarnessEvent>,
}

impl EventSink {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<HarnessEvent>) -> Self {
        Self { tx }
    }

    /// Post an event; returns false if the dispatcher is gone
    pub(crate) fn post(&self, event: HarnessEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                debug!(event = ?err.0, "dispatcher gone, event dropped");
                false
            }
        }
    }

    /// Report that a load started
    pub fn load_started(&self, url: impl Into<String>) -> bool {
        self.post(HarnessEvent::LoadStarted { url: url.into() })
    }

    /// Report that a load finished
    pub fn load_finished(&self, url: impl Into<String>) -> bool {
        self.post(HarnessEvent::LoadFinished { url: url.into() })
    }

    /// Report a recoverable load error
    pub fn load_error(
        &self,
        code: i32,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> bool {
        self.post(HarnessEvent::LoadError(LoadError {
            code,
            description: description.into(),
            url: url.into(),
        }))
    }

    /// Report a title change
    pub fn title(&self, title: impl Into<String>) -> bool {
        self.post(HarnessEvent::TitleReceived {
            title: title.into(),
        })
    }

    /// Ask whether a long-running script should be aborted
    pub fn script_timeout(&self) -> oneshot::Receiver<bool> {
        let (reply, rx) = oneshot::channel();
        self.post(HarnessEvent::ScriptTimeout { reply });
        rx
    }

    /// Ask how to answer a TLS certificate error.
    ///
    /// [`SimulatedEngine`](crate::SimulatedEngine) asks through here. The
    /// Chromium engine applies the same policy once at launch, as its
    /// certificate-error override.
    pub fn ssl_error(&self, error: impl Into<String>) -> oneshot::Receiver<SslDecision> {
        let (reply, rx) = oneshot::channel();
        self.post(HarnessEvent::SslError {
            error: error.into(),
            reply,
        });
        rx
    }

    /// Ask how to answer an HTTP auth challenge.
    ///
    /// Used by [`SimulatedEngine`](crate::SimulatedEngine) and external
    /// engines; the Chromium engine does not intercept auth.
    pub fn http_auth(
        &self,
        host: impl Into<String>,
        realm: impl Into<String>,
    ) -> oneshot::Receiver<AuthDecision> {
        let (reply, rx) = oneshot::channel();
        self.post(HarnessEvent::HttpAuth {
            host: host.into(),
            realm: realm.into(),
            reply,
        });
        rx
    }

    /// Ask how to answer a dialog
    pub fn dialog(&self, dialog: Dialog) -> oneshot::Receiver<DialogAction> {
        let (reply, rx) = oneshot::channel();
        self.post(HarnessEvent::Dialog { dialog, reply });
        rx
    }

    /// Whether the dispatcher has stopped receiving
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_request() {
        assert!(NavigationRequest::new("", 1000).is_terminal());
        assert!(NavigationRequest::new("   ", 1000).is_terminal());
        assert!(!NavigationRequest::new("http://example/", 0).is_terminal());
    }

    #[test]
    fn test_settle_builder() {
        let request = NavigationRequest::new("http://example/", 5000).with_settle(250);
        assert_eq!(request.settle_ms, Some(250));
        assert_eq!(request.timeout_ms, 5000);
    }

    #[test]
    fn test_sink_posts_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        assert!(sink.load_started("http://a/"));
        assert!(sink.load_finished("http://a/"));
        assert!(matches!(
            rx.try_recv(),
            Ok(HarnessEvent::LoadStarted { url }) if url == "http://a/"
        ));
        assert!(matches!(rx.try_recv(), Ok(HarnessEvent::LoadFinished { .. })));
    }

    #[test]
    fn test_sink_reports_closed_dispatcher() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.load_started("http://a/"));
        // reply channel is dropped along with the event
        assert!(sink.script_timeout().blocking_recv().is_err());
    }
}
