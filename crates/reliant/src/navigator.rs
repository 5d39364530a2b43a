//! Navigation state machine: coordinator, stability detector and timeout
//! monitor.
//!
//! Runs only on the dispatcher. Each navigation moves through
//!
//! ```text
//! navigate ──► Loading ──(finished, no new start for one window)──► Settling
//!                 │                                                   │
//!                 └──(timeout)──► Finished(TimedOut)   (settle delay) ▼
//!                                                         Finished(Completed)
//! ```
//!
//! A load-finished event is only a hypothesis. The stability check snapshots
//! the load-start counter and re-reads it one window later; any load that
//! started in between makes the check a no-op, and that newer load will
//! produce its own finished event and check. Every continuation also carries
//! the navigation epoch, so checks scheduled by an earlier navigation can
//! never complete a later one even after `reset` zeroes the counter.

use crate::config::HarnessConfig;
use crate::engine::RenderingEngine;
use crate::event::{Deferred, HarnessEvent, LoadError, NavigationRequest};
use crate::gate::CompletionGate;
use crate::policy::{ResponsePolicy, ScriptTimeoutDebounce};
use crate::report::{NavigationReport, Outcome};
use crate::scheduler::{Schedule, TimerId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the dispatch loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep dispatching
    Continue,
    /// Stop the dispatcher
    Shutdown,
}

/// Phase of the navigation in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a load to finish and stay finished
    Loading,
    /// Stable; waiting out the settle delay
    Settling,
    /// Gate released
    Finished(Outcome),
}

#[derive(Debug)]
struct Navigation {
    epoch: u64,
    url: String,
    settle: Duration,
    load_starts: u64,
    phase: Phase,
    started_at: Instant,
    progress_at_timeout: Option<u8>,
    title: Option<String>,
    errors: Vec<LoadError>,
}

/// Owner of all per-navigation state
#[derive(Debug)]
pub struct Navigator<E> {
    engine: E,
    config: HarnessConfig,
    policy: ResponsePolicy,
    gate: Arc<CompletionGate<NavigationReport>>,
    epoch: u64,
    current: Option<Navigation>,
    timeout_timer: Option<TimerId>,
    script_timeouts: ScriptTimeoutDebounce,
}

impl<E: RenderingEngine> Navigator<E> {
    /// Create a navigator releasing results through `gate`
    pub fn new(
        engine: E,
        config: HarnessConfig,
        gate: Arc<CompletionGate<NavigationReport>>,
    ) -> Self {
        Self {
            engine,
            policy: config.response_policy(),
            script_timeouts: ScriptTimeoutDebounce::new(config.script_timeout_threshold),
            config,
            gate,
            epoch: 0,
            current: None,
            timeout_timer: None,
        }
    }

    /// The engine being driven
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Consume the navigator, returning the engine
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Epoch of the latest navigation (0 before the first)
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Phase of the navigation in flight, if any
    pub fn phase(&self) -> Option<Phase> {
        self.current.as_ref().map(|nav| nav.phase)
    }

    /// Load-started events seen by the current navigation
    pub fn load_starts(&self) -> u64 {
        self.current.as_ref().map_or(0, |nav| nav.load_starts)
    }

    /// Handle one event
    pub fn handle<S: Schedule>(&mut self, event: HarnessEvent, scheduler: &mut S) -> Control {
        match event {
            HarnessEvent::LoadStarted { url } => self.on_load_started(&url),
            HarnessEvent::LoadFinished { url } => self.on_load_finished(&url, scheduler),
            HarnessEvent::ScriptTimeout { reply } => {
                let abort = self.script_timeouts.on_timeout();
                debug!(count = self.script_timeouts.count(), abort, "script timeout");
                let _ = reply.send(abort);
            }
            HarnessEvent::LoadError(error) => {
                warn!(code = error.code, url = %error.url, "load error: {}", error.description);
                if let Some(nav) = self.current.as_mut() {
                    nav.errors.push(error);
                }
            }
            HarnessEvent::SslError { error, reply } => {
                warn!(decision = ?self.policy.ssl_errors, "TLS error: {error}");
                let _ = reply.send(self.policy.ssl_errors);
            }
            HarnessEvent::HttpAuth { host, realm, reply } => {
                debug!(%host, %realm, "HTTP auth challenge");
                let _ = reply.send(self.policy.http_auth);
            }
            HarnessEvent::Dialog { dialog, reply } => {
                let action = self.policy.answer_dialog(&dialog);
                debug!(kind = %dialog.dialog_type, ?action, "dialog: {}", dialog.message);
                let _ = reply.send(action);
            }
            HarnessEvent::TitleReceived { title } => {
                if let Some(nav) = self.current.as_mut() {
                    nav.title = Some(title);
                }
            }
            HarnessEvent::Navigate(request) => return self.navigate(request, scheduler),
            HarnessEvent::Reset => self.reset(scheduler),
            HarnessEvent::Timer { id, task } => {
                if scheduler.fire(id) {
                    self.on_deferred(task, scheduler);
                } else {
                    debug!(timer = id.get(), "cancelled timer dropped");
                }
            }
            HarnessEvent::Shutdown => return Control::Shutdown,
        }
        Control::Continue
    }

    fn reset<S: Schedule>(&mut self, scheduler: &mut S) {
        self.cancel_timeout(scheduler);
        self.current = None;
        self.script_timeouts.reset();
        debug!(epoch = self.epoch, "reset");
    }

    fn navigate<S: Schedule>(&mut self, request: NavigationRequest, scheduler: &mut S) -> Control {
        if request.is_terminal() {
            info!("URL is empty, finishing");
            return Control::Shutdown;
        }
        if let Some(nav) = &self.current {
            if !matches!(nav.phase, Phase::Finished(_)) {
                warn!(epoch = nav.epoch, url = %nav.url, "abandoning unfinished navigation");
            }
        }
        self.reset(scheduler);
        self.epoch += 1;
        let epoch = self.epoch;

        self.engine.stop_loading();
        info!(epoch, url = %request.url, timeout_ms = request.timeout_ms, "navigating");
        self.engine.load_url(&request.url);

        let settle = request.settle_ms.unwrap_or(self.config.default_settle_ms);
        self.current = Some(Navigation {
            epoch,
            url: request.url,
            settle: Duration::from_millis(settle),
            load_starts: 0,
            phase: Phase::Loading,
            started_at: Instant::now(),
            progress_at_timeout: None,
            title: None,
            errors: Vec::new(),
        });

        if request.timeout_ms != 0 {
            self.timeout_timer = Some(scheduler.schedule(
                Duration::from_millis(request.timeout_ms),
                Deferred::Timeout { epoch },
            ));
        }
        Control::Continue
    }

    fn on_load_started(&mut self, url: &str) {
        match self.current.as_mut() {
            Some(nav) => {
                nav.load_starts += 1;
                debug!(epoch = nav.epoch, load_starts = nav.load_starts, url, "load started");
            }
            None => debug!(url, "load started with no navigation"),
        }
    }

    fn on_load_finished<S: Schedule>(&mut self, url: &str, scheduler: &mut S) {
        let Some(nav) = self.current.as_ref() else {
            debug!(url, "load finished with no navigation");
            return;
        };
        if nav.phase != Phase::Loading {
            debug!(epoch = nav.epoch, phase = ?nav.phase, url, "load finished ignored");
            return;
        }
        debug!(epoch = nav.epoch, token = nav.load_starts, url, "load finished");
        scheduler.schedule(
            self.config.stability_delay(),
            Deferred::StabilityCheck {
                epoch: nav.epoch,
                token: nav.load_starts,
            },
        );
    }

    fn on_deferred<S: Schedule>(&mut self, task: Deferred, scheduler: &mut S) {
        match task {
            Deferred::StabilityCheck { epoch, token } => {
                self.check_stability(epoch, token, scheduler);
            }
            Deferred::Settled { epoch } => {
                if self.is_current(epoch, Phase::Settling) {
                    self.finish(Outcome::Completed);
                }
            }
            Deferred::Timeout { epoch } => {
                self.timeout_timer = None;
                if self.is_current(epoch, Phase::Loading) {
                    self.on_timeout();
                }
            }
        }
    }

    fn check_stability<S: Schedule>(&mut self, epoch: u64, token: u64, scheduler: &mut S) {
        if !self.is_current(epoch, Phase::Loading) {
            debug!(epoch, "stale stability check");
            return;
        }
        let load_starts = self.load_starts();
        if load_starts != token {
            debug!(epoch, token, load_starts, "stability check superseded");
            return;
        }

        self.cancel_timeout(scheduler);
        self.engine.stop_loading();
        let Some(nav) = self.current.as_mut() else {
            return;
        };
        nav.phase = Phase::Settling;
        debug!(epoch, settle_ms = nav.settle.as_millis() as u64, "page stable");
        scheduler.schedule(nav.settle, Deferred::Settled { epoch });
    }

    fn on_timeout(&mut self) {
        let progress = self.engine.progress();
        self.engine.stop_loading();
        if let Some(nav) = self.current.as_mut() {
            warn!(epoch = nav.epoch, url = %nav.url, progress, "page timeout triggered");
            nav.progress_at_timeout = Some(progress);
        }
        self.finish(Outcome::TimedOut);
    }

    fn finish(&mut self, outcome: Outcome) {
        let final_url = self.engine.current_url();
        let script_timeouts = self.script_timeouts.count();
        let Some(nav) = self.current.as_mut() else {
            return;
        };
        nav.phase = Phase::Finished(outcome);
        let report = NavigationReport {
            epoch: nav.epoch,
            url: nav.url.clone(),
            final_url,
            outcome,
            elapsed_ms: nav.started_at.elapsed().as_millis() as u64,
            load_starts: nav.load_starts,
            progress_at_timeout: nav.progress_at_timeout,
            script_timeouts,
            title: nav.title.clone(),
            errors: nav.errors.clone(),
        };
        info!(
            epoch = nav.epoch,
            url = %nav.url,
            %outcome,
            elapsed_ms = report.elapsed_ms,
            "finishing URL"
        );
        if !self.gate.release(report) {
            debug!(epoch = nav.epoch, "gate was not pending");
        }
    }

    fn cancel_timeout<S: Schedule>(&mut self, scheduler: &mut S) {
        if let Some(id) = self.timeout_timer.take() {
            scheduler.cancel(id);
        }
    }

    fn is_current(&self, epoch: u64, phase: Phase) -> bool {
        self.current
            .as_ref()
            .is_some_and(|nav| nav.epoch == epoch && nav.phase == phase)
    }
}
