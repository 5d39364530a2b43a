//! Rendering engine boundary.
//!
//! The harness treats the engine as opaque: it accepts load/stop commands
//! and reports its lifecycle through an [`crate::EventSink`]. Commands are
//! always issued from the dispatcher thread.

use std::sync::{Arc, Mutex, PoisonError};

/// Commands the harness issues to a rendering engine
pub trait RenderingEngine {
    /// Begin loading `url`
    fn load_url(&mut self, url: &str);

    /// Stop any load in progress
    fn stop_loading(&mut self);

    /// Load progress 0-100, for diagnostics only
    fn progress(&self) -> u8;

    /// URL currently displayed, if the engine knows it
    fn current_url(&self) -> Option<String> {
        None
    }
}

impl<E: RenderingEngine + ?Sized> RenderingEngine for Box<E> {
    fn load_url(&mut self, url: &str) {
        (**self).load_url(url);
    }

    fn stop_loading(&mut self) {
        (**self).stop_loading();
    }

    fn progress(&self) -> u8 {
        (**self).progress()
    }

    fn current_url(&self) -> Option<String> {
        (**self).current_url()
    }
}

/// A command observed by [`RecordingEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `load_url` was called
    LoadUrl(String),
    /// `stop_loading` was called
    StopLoading,
    /// `progress` was read
    Progress,
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<EngineCall>,
    progress: u8,
    url: Option<String>,
}

/// Passive engine that records every command it receives.
///
/// Clones share the same log, so a test can keep one handle while the
/// harness owns the other. Lifecycle events are posted by whoever drives
/// the test, through the harness's event sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingEngine {
    /// Create an engine with an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Every command received so far
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.with(|r| r.calls.clone())
    }

    /// URLs passed to `load_url`, in order
    #[must_use]
    pub fn loaded_urls(&self) -> Vec<String> {
        self.with(|r| {
            r.calls
                .iter()
                .filter_map(|c| match c {
                    EngineCall::LoadUrl(url) => Some(url.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Number of `stop_loading` calls
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.with(|r| {
            r.calls
                .iter()
                .filter(|c| matches!(c, EngineCall::StopLoading))
                .count()
        })
    }

    /// Set the progress value reported to the harness
    pub fn set_progress(&self, progress: u8) {
        self.with(|r| r.progress = progress.min(100));
    }
}

impl RenderingEngine for RecordingEngine {
    fn load_url(&mut self, url: &str) {
        self.with(|r| {
            r.calls.push(EngineCall::LoadUrl(url.to_string()));
            r.url = Some(url.to_string());
            r.progress = 0;
        });
    }

    fn stop_loading(&mut self) {
        self.with(|r| r.calls.push(EngineCall::StopLoading));
    }

    fn progress(&self) -> u8 {
        self.with(|r| {
            r.calls.push(EngineCall::Progress);
            r.progress
        })
    }

    fn current_url(&self) -> Option<String> {
        self.with(|r| r.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_engine_logs_commands() {
        let handle = RecordingEngine::new();
        let mut engine = handle.clone();
        engine.stop_loading();
        engine.load_url("http://example/");
        handle.set_progress(40);
        assert_eq!(engine.progress(), 40);
        assert_eq!(
            handle.calls(),
            vec![
                EngineCall::StopLoading,
                EngineCall::LoadUrl("http://example/".to_string()),
                EngineCall::Progress,
            ]
        );
        assert_eq!(handle.loaded_urls(), vec!["http://example/".to_string()]);
        assert_eq!(handle.stop_count(), 1);
        assert_eq!(engine.current_url().as_deref(), Some("http://example/"));
    }

    #[test]
    fn test_progress_clamped() {
        let engine = RecordingEngine::new();
        engine.set_progress(250);
        assert_eq!(engine.progress(), 100);
    }

    #[test]
    fn test_boxed_engine_forwards() {
        let handle = RecordingEngine::new();
        let mut boxed: Box<dyn RenderingEngine> = Box::new(handle.clone());
        boxed.load_url("http://boxed/");
        assert_eq!(boxed.current_url().as_deref(), Some("http://boxed/"));
        assert_eq!(handle.loaded_urls(), vec!["http://boxed/".to_string()]);
    }
}
