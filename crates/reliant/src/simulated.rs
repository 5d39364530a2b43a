//! In-process engine that replays scripted page loads.
//!
//! Each URL is mapped to a [`PageProfile`]. `sim://` URLs carry their
//! profile in the query string:
//!
//! ```text
//! sim://shop?latency=200&redirects=2&title=Shop
//! sim://stuck?hang=1
//! sim://busy?script_timeouts=3
//! sim://bank?certificate_error&auth
//! ```
//!
//! Any other URL loads with the default profile. Loads run as tasks on the
//! runtime that calls [`RenderingEngine::load_url`], which for a harness is
//! the dispatcher's runtime.

use crate::engine::RenderingEngine;
use crate::event::EventSink;
use crate::policy::{AuthDecision, SslDecision};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Scheme recognised by [`PageProfile::from_url`]
pub const SIM_SCHEME: &str = "sim://";

const CERTIFICATE_ERROR_CODE: i32 = -11;
const AUTH_ERROR_CODE: i32 = -4;

/// Scripted behavior of one simulated page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageProfile {
    /// Time between each load start and its finish
    pub latency_ms: u64,
    /// Loads that finish and immediately start the next one
    pub redirects: u32,
    /// Never finish the final load
    pub hang: bool,
    /// Script timeouts reported during the final load
    pub script_timeouts: u32,
    /// Title reported when the page finishes
    pub title: Option<String>,
    /// Final load presents an untrusted certificate
    pub certificate_error: bool,
    /// Final load asks for HTTP authentication
    pub auth: bool,
}

impl Default for PageProfile {
    fn default() -> Self {
        Self {
            latency_ms: 100,
            redirects: 0,
            hang: false,
            script_timeouts: 0,
            title: None,
            certificate_error: false,
            auth: false,
        }
    }
}

impl PageProfile {
    /// Profile for `url`; unknown keys and malformed values are ignored
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let mut profile = Self::default();
        let Some(rest) = url.strip_prefix(SIM_SCHEME) else {
            return profile;
        };
        let Some((_, query)) = rest.split_once('?') else {
            return profile;
        };
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "latency" => profile.latency_ms = value.parse().unwrap_or(profile.latency_ms),
                "redirects" => profile.redirects = value.parse().unwrap_or(profile.redirects),
                "hang" => profile.hang = flag(value),
                "certificate_error" => profile.certificate_error = flag(value),
                "auth" => profile.auth = flag(value),
                "script_timeouts" => {
                    profile.script_timeouts = value.parse().unwrap_or(profile.script_timeouts);
                }
                "title" if !value.is_empty() => profile.title = Some(value.replace('+', " ")),
                _ => {}
            }
        }
        profile
    }

    /// Latency as Duration
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn flag(value: &str) -> bool {
    matches!(value, "" | "1" | "true")
}

fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

/// Engine that plays back [`PageProfile`]s through an [`EventSink`]
#[derive(Debug)]
pub struct SimulatedEngine {
    events: EventSink,
    progress: Arc<AtomicU8>,
    url: Option<String>,
    load: Option<JoinHandle<()>>,
}

impl SimulatedEngine {
    /// Create an engine reporting through `events`
    #[must_use]
    pub fn new(events: EventSink) -> Self {
        Self {
            events,
            progress: Arc::new(AtomicU8::new(0)),
            url: None,
            load: None,
        }
    }
}

impl RenderingEngine for SimulatedEngine {
    fn load_url(&mut self, url: &str) {
        self.stop_loading();
        let profile = PageProfile::from_url(url);
        debug!(url, ?profile, "simulated load");
        self.url = Some(url.to_string());
        self.progress.store(0, Ordering::SeqCst);
        self.load = Some(tokio::spawn(play(
            url.to_string(),
            profile,
            self.events.clone(),
            Arc::clone(&self.progress),
        )));
    }

    fn stop_loading(&mut self) {
        if let Some(load) = self.load.take() {
            load.abort();
        }
    }

    fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    fn current_url(&self) -> Option<String> {
        self.url.clone()
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.stop_loading();
    }
}

async fn play(url: String, profile: PageProfile, events: EventSink, progress: Arc<AtomicU8>) {
    for hop in 0..=profile.redirects {
        let last = hop == profile.redirects;
        let hop_url = if last {
            url.clone()
        } else {
            format!("{url}#redirect-{hop}")
        };
        events.load_started(&hop_url);
        progress.store(10, Ordering::SeqCst);

        if last && profile.certificate_error {
            match events.ssl_error(format!("untrusted certificate for {}", host(&url))).await {
                Ok(SslDecision::Proceed) => debug!(url = %hop_url, "certificate error ignored"),
                Ok(SslDecision::Cancel) => {
                    events.load_error(CERTIFICATE_ERROR_CODE, "certificate rejected", &hop_url);
                }
                Err(_) => return,
            }
        }
        if last && profile.auth {
            match events.http_auth(host(&url), "simulated").await {
                Ok(AuthDecision::Cancel) => {
                    events.load_error(AUTH_ERROR_CODE, "authentication cancelled", &hop_url);
                }
                Err(_) => return,
            }
        }

        if last {
            for _ in 0..profile.script_timeouts {
                match events.script_timeout().await {
                    Ok(true) => debug!(url = %hop_url, "script aborted"),
                    Ok(false) => {}
                    Err(_) => return,
                }
            }
        }

        tokio::time::sleep(profile.latency()).await;
        if last && profile.hang {
            progress.store(60, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        events.load_finished(&hop_url);
    }
    progress.store(100, Ordering::SeqCst);
    if let Some(title) = profile.title {
        events.title(title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HarnessEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_profile_defaults_for_plain_urls() {
        assert_eq!(PageProfile::from_url("http://example/"), PageProfile::default());
        assert_eq!(PageProfile::from_url("sim://page"), PageProfile::default());
    }

    #[test]
    fn test_profile_from_query() {
        let profile =
            PageProfile::from_url("sim://shop?latency=250&redirects=2&title=My+Shop&script_timeouts=3");
        assert_eq!(profile.latency_ms, 250);
        assert_eq!(profile.redirects, 2);
        assert_eq!(profile.script_timeouts, 3);
        assert_eq!(profile.title.as_deref(), Some("My Shop"));
        assert!(!profile.hang);
    }

    #[test]
    fn test_profile_hang_flag() {
        assert!(PageProfile::from_url("sim://stuck?hang").hang);
        assert!(PageProfile::from_url("sim://stuck?hang=1").hang);
        assert!(!PageProfile::from_url("sim://stuck?hang=0").hang);
    }

    #[test]
    fn test_profile_ignores_bad_values() {
        let profile = PageProfile::from_url("sim://x?latency=soon&bogus=1");
        assert_eq!(profile.latency_ms, 100);
    }

    #[test]
    fn test_profile_challenge_flags() {
        let profile = PageProfile::from_url("sim://bank?certificate_error&auth=1");
        assert!(profile.certificate_error);
        assert!(profile.auth);
        assert!(!PageProfile::from_url("sim://bank?auth=0").auth);
    }

    #[test]
    fn test_host_extraction() {
        assert_eq!(host("sim://bank?auth"), "bank");
        assert_eq!(host("https://example.com/login"), "example.com");
        assert_eq!(host("plain"), "plain");
    }

    #[tokio::test]
    async fn test_challenges_go_through_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = SimulatedEngine::new(EventSink::new(tx));
        engine.load_url("sim://bank?latency=5&certificate_error&auth");

        assert!(matches!(rx.recv().await, Some(HarnessEvent::LoadStarted { .. })));
        match rx.recv().await {
            Some(HarnessEvent::SslError { error, reply }) => {
                assert!(error.contains("bank"));
                reply.send(SslDecision::Cancel).unwrap();
            }
            other => panic!("expected TLS question, got {other:?}"),
        }
        assert!(matches!(
            rx.recv().await,
            Some(HarnessEvent::LoadError(ref e)) if e.code == CERTIFICATE_ERROR_CODE
        ));
        match rx.recv().await {
            Some(HarnessEvent::HttpAuth { host, reply, .. }) => {
                assert_eq!(host, "bank");
                reply.send(AuthDecision::Cancel).unwrap();
            }
            other => panic!("expected auth challenge, got {other:?}"),
        }
        assert!(matches!(
            rx.recv().await,
            Some(HarnessEvent::LoadError(ref e)) if e.code == AUTH_ERROR_CODE
        ));
        assert!(matches!(rx.recv().await, Some(HarnessEvent::LoadFinished { .. })));
    }

    #[tokio::test]
    async fn test_redirect_chain_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = SimulatedEngine::new(EventSink::new(tx));
        engine.load_url("sim://r?latency=5&redirects=1&title=Done");

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                HarnessEvent::LoadStarted { url } => seen.push(format!("start {url}")),
                HarnessEvent::LoadFinished { url } => seen.push(format!("finish {url}")),
                HarnessEvent::TitleReceived { title } => {
                    seen.push(format!("title {title}"));
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        let base = "sim://r?latency=5&redirects=1&title=Done";
        assert_eq!(
            seen,
            vec![
                format!("start {base}#redirect-0"),
                format!("finish {base}#redirect-0"),
                format!("start {base}"),
                format!("finish {base}"),
                "title Done".to_string(),
            ]
        );
        assert_eq!(engine.progress(), 100);
    }

    #[tokio::test]
    async fn test_hang_never_finishes_and_stop_is_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = SimulatedEngine::new(EventSink::new(tx));
        engine.load_url("sim://stuck?latency=5&hang=1");
        assert!(matches!(rx.recv().await, Some(HarnessEvent::LoadStarted { .. })));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(engine.progress(), 60);
        engine.stop_loading();
        assert!(rx.try_recv().is_err());
    }
}
