//! The harness handle and its dispatcher thread.
//!
//! [`Harness::spawn`] starts one thread running a current-thread tokio
//! runtime. That thread builds the engine, then consumes [`HarnessEvent`]s
//! until shutdown. Callers on other threads post commands and block on the
//! completion gate.

use crate::config::HarnessConfig;
use crate::engine::RenderingEngine;
use crate::event::{EventSink, HarnessEvent, NavigationRequest};
use crate::gate::{CompletionGate, GateRefusal, GateWait};
use crate::navigator::{Control, Navigator};
use crate::report::NavigationReport;
use crate::result::{HarnessError, HarnessResult};
use crate::scheduler::TokioScheduler;
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Name given to the dispatcher thread
pub const DISPATCHER_THREAD_NAME: &str = "reliant-dispatcher";

#[derive(Debug)]
struct Shared {
    sink: EventSink,
    gate: Arc<CompletionGate<NavigationReport>>,
    dispatcher: ThreadId,
    current_url: Mutex<Option<String>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn join(&self) {
        if thread::current().id() == self.dispatcher {
            return;
        }
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("dispatcher thread panicked");
            }
        }
    }
}

/// Closes the gate when the dispatcher thread exits, including by panic
struct CloseOnExit(Arc<CompletionGate<NavigationReport>>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.sink.post(HarnessEvent::Shutdown);
        self.join();
    }
}

/// Handle to a running harness.
///
/// Clones share one dispatcher. The dispatcher shuts down when the last
/// handle is dropped, when [`Harness::shutdown`] is called, or when a
/// navigation with an empty URL is requested.
#[derive(Debug, Clone)]
pub struct Harness {
    shared: Arc<Shared>,
}

impl Harness {
    /// Start a dispatcher thread and build the engine on it.
    ///
    /// `factory` runs on the dispatcher thread, outside the dispatcher's
    /// runtime, and receives the sink the engine reports events through.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, the thread or runtime
    /// cannot be started, or the factory fails
    pub fn spawn<E, F>(config: HarnessConfig, factory: F) -> HarnessResult<Self>
    where
        E: RenderingEngine + 'static,
        F: FnOnce(EventSink) -> HarnessResult<E> + Send + 'static,
    {
        config.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx.clone());
        let gate = Arc::new(CompletionGate::new());
        let (ready_tx, ready_rx) = std_mpsc::channel::<HarnessResult<()>>();

        let thread_gate = Arc::clone(&gate);
        let thread_sink = sink.clone();
        let handle = thread::Builder::new()
            .name(DISPATCHER_THREAD_NAME.to_string())
            .spawn(move || {
                let _close = CloseOnExit(Arc::clone(&thread_gate));
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(HarnessError::DispatcherSpawn {
                            message: e.to_string(),
                        }));
                        return;
                    }
                };
                let engine = match factory(thread_sink) {
                    Ok(engine) => engine,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let navigator = Navigator::new(engine, config, Arc::clone(&thread_gate));
                let navigator = runtime.block_on(dispatch(navigator, rx, tx));
                thread_gate.close();
                // engines may own runtimes of their own; drop outside block_on
                drop(navigator.into_engine());
                info!("dispatcher stopped");
            })?;

        let dispatcher = handle.thread().id();
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(HarnessError::DispatcherSpawn {
                    message: "dispatcher exited during startup".to_string(),
                });
            }
        }

        Ok(Self {
            shared: Arc::new(Shared {
                sink,
                gate,
                dispatcher,
                current_url: Mutex::new(None),
                thread: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Clear per-navigation state before the next navigation.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NavigationInFlight`] if the previous
    /// navigation has not been released, or [`HarnessError::ShutDown`]
    pub fn reset(&self) -> HarnessResult<()> {
        self.shared.gate.reset().map_err(|r| self.refusal(r))?;
        self.post(HarnessEvent::Reset)
    }

    /// Navigate to `url`, timing out after `timeout_ms` (0 = never).
    ///
    /// An empty `url` ends the harness: the engine is not asked to load
    /// anything and the dispatcher stops.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NavigationInFlight`] if the previous
    /// navigation has not been released, or [`HarnessError::ShutDown`]
    pub fn navigate(&self, url: impl Into<String>, timeout_ms: u64) -> HarnessResult<()> {
        self.navigate_with(NavigationRequest::new(url, timeout_ms))
    }

    /// Navigate with a full request, including the settle delay
    ///
    /// # Errors
    ///
    /// See [`Harness::navigate`]
    pub fn navigate_with(&self, request: NavigationRequest) -> HarnessResult<()> {
        if request.is_terminal() {
            debug!("empty URL requested, shutting down");
            return self.post(HarnessEvent::Navigate(request));
        }
        self.shared.gate.arm().map_err(|r| self.refusal(r))?;
        *self
            .shared
            .current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.url.clone());
        self.post(HarnessEvent::Navigate(request))
    }

    /// Block until the current navigation ends; returns true if it timed out.
    ///
    /// Returns false immediately when nothing is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::WaitOnDispatcher`] when called from the
    /// dispatcher thread, or [`HarnessError::ShutDown`] if the harness stopped
    /// before the navigation ended
    pub fn wait_until_done(&self) -> HarnessResult<bool> {
        Ok(self.wait_for_report()?.is_some_and(|r| r.timed_out()))
    }

    /// Block until the current navigation ends and return its report.
    ///
    /// `None` when nothing was in flight.
    ///
    /// # Errors
    ///
    /// See [`Harness::wait_until_done`]
    pub fn wait_for_report(&self) -> HarnessResult<Option<NavigationReport>> {
        self.ensure_off_dispatcher()?;
        Self::observed(self.shared.gate.wait())
    }

    /// Like [`Harness::wait_for_report`] but gives up after `timeout`;
    /// `Ok(None)` means still running or nothing in flight.
    ///
    /// # Errors
    ///
    /// See [`Harness::wait_until_done`]
    pub fn wait_until_done_timeout(
        &self,
        timeout: Duration,
    ) -> HarnessResult<Option<NavigationReport>> {
        self.ensure_off_dispatcher()?;
        match self.shared.gate.wait_timeout(timeout) {
            Some(observed) => Self::observed(observed),
            None => Ok(None),
        }
    }

    /// Whether no navigation is pending
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.gate.is_done()
    }

    /// Whether the dispatcher has stopped
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.gate.is_closed()
    }

    /// Sink for engine bindings living outside the dispatcher
    #[must_use]
    pub fn event_sink(&self) -> EventSink {
        self.shared.sink.clone()
    }

    /// Stop the dispatcher and wait for it to exit
    pub fn shutdown(&self) {
        self.shared.sink.post(HarnessEvent::Shutdown);
        self.shared.join();
    }

    /// Wait for the dispatcher to exit without asking it to
    pub fn join(&self) {
        self.shared.join();
    }

    fn post(&self, event: HarnessEvent) -> HarnessResult<()> {
        if self.shared.sink.post(event) {
            Ok(())
        } else {
            Err(HarnessError::ShutDown)
        }
    }

    fn ensure_off_dispatcher(&self) -> HarnessResult<()> {
        if thread::current().id() == self.shared.dispatcher {
            return Err(HarnessError::WaitOnDispatcher);
        }
        Ok(())
    }

    fn refusal(&self, refusal: GateRefusal) -> HarnessError {
        match refusal {
            GateRefusal::Closed => HarnessError::ShutDown,
            GateRefusal::Pending => HarnessError::NavigationInFlight {
                url: self
                    .shared
                    .current_url
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
                    .unwrap_or_default(),
            },
        }
    }

    fn observed(observed: GateWait<NavigationReport>) -> HarnessResult<Option<NavigationReport>> {
        match observed {
            GateWait::Released(report) => Ok(Some(report)),
            GateWait::Idle => Ok(None),
            GateWait::Closed => Err(HarnessError::ShutDown),
        }
    }
}

async fn dispatch<E: RenderingEngine>(
    mut navigator: Navigator<E>,
    mut rx: mpsc::UnboundedReceiver<HarnessEvent>,
    tx: mpsc::UnboundedSender<HarnessEvent>,
) -> Navigator<E> {
    let mut scheduler = TokioScheduler::new(tx);
    while let Some(event) = rx.recv().await {
        if navigator.handle(event, &mut scheduler) == Control::Shutdown {
            break;
        }
    }
    scheduler.cancel_all();
    rx.close();
    navigator
}
