//! Reliant: page-load reliability harness
//!
//! Drives a rendering engine through a sequence of URLs and tells the caller,
//! for each one, whether the page became stable or the timeout fired first.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  navigate/reset   ┌──────────────────────────────┐
//! │ test thread  │──────────────────►│ dispatcher thread            │
//! │              │                   │  ┌──────────┐  ┌──────────┐  │
//! │ wait_until_  │◄── gate release ──│  │Navigator │─►│ Engine   │  │
//! │ done()       │                   │  └──────────┘  └────┬─────┘  │
//! └──────────────┘                   │       ▲  timers     │ events │
//!                                    │       └─────────────┘        │
//!                                    └──────────────────────────────┘
//! ```
//!
//! A navigation is complete when the engine reports a finished load and no
//! new load starts within the stability window (500 ms by default). Redirect
//! chains, client-side reloads and late frames therefore extend the wait
//! instead of ending it early.
//!
//! ```no_run
//! use reliant::{Harness, HarnessConfig, SimulatedEngine};
//!
//! let harness = Harness::spawn(HarnessConfig::default(), |sink| {
//!     Ok(SimulatedEngine::new(sink))
//! })?;
//! harness.reset()?;
//! harness.navigate("sim://home?redirects=1", 5_000)?;
//! let timed_out = harness.wait_until_done()?;
//! assert!(!timed_out);
//! harness.navigate("", 0)?;
//! # Ok::<(), reliant::HarnessError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

#[cfg(feature = "browser")]
mod cdp;
mod config;
mod engine;
mod event;
mod gate;
mod harness;
mod navigator;
mod policy;
mod report;
mod result;
mod scheduler;
mod simulated;

#[cfg(feature = "browser")]
pub use cdp::{ChromiumEngine, ChromiumOptions};
pub use config::{HarnessConfig, DEFAULT_SCRIPT_TIMEOUT_THRESHOLD, DEFAULT_STABILITY_DELAY_MS};
pub use engine::{EngineCall, RecordingEngine, RenderingEngine};
pub use event::{Deferred, EventSink, HarnessEvent, LoadError, NavigationRequest};
pub use gate::{CompletionGate, GateRefusal, GateWait};
pub use harness::{Harness, DISPATCHER_THREAD_NAME};
pub use navigator::{Control, Navigator, Phase};
pub use policy::{
    AuthDecision, AutoDialogBehavior, Dialog, DialogAction, DialogType, ResponsePolicy,
    ScriptTimeoutDebounce, SslDecision,
};
pub use report::{NavigationReport, Outcome};
pub use result::{HarnessError, HarnessResult};
pub use scheduler::{Schedule, TimerId, TokioScheduler};
pub use simulated::{PageProfile, SimulatedEngine, SIM_SCHEME};
