//! Headless Chromium engine over the Chrome `DevTools` Protocol.
//!
//! The browser lives on a private multi-thread runtime owned by the engine.
//! Page events are forwarded to the harness through an [`EventSink`]:
//!
//! | CDP event                     | Harness event          |
//! |-------------------------------|------------------------|
//! | `Page.frameStartedLoading`    | load started (main frame) |
//! | `Page.frameStoppedLoading`    | load finished (main frame) |
//! | `Page.javascriptDialogOpening`| dialog, answered by policy |
//! | `Page.loadEventFired`         | title                  |
//!
//! Engine calls from the dispatcher never block: they are queued to a
//! command task that runs them in order on the browser runtime.

use crate::engine::RenderingEngine;
use crate::event::EventSink;
use crate::policy::{Dialog, DialogAction, DialogType};
use crate::result::{HarnessError, HarnessResult};
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType as CdpDialogType, EventDomContentEventFired, EventFrameNavigated,
    EventFrameStartedLoading, EventFrameStoppedLoading, EventJavascriptDialogOpening,
    EventLoadEventFired, FrameId, HandleJavaScriptDialogParams, StopLoadingParams,
};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launch options for [`ChromiumEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Load pages with invalid certificates
    pub ignore_certificate_errors: bool,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 800,
            ignore_certificate_errors: true,
        }
    }
}

impl ChromiumOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set whether certificate errors are ignored
    #[must_use]
    pub const fn with_ignore_certificate_errors(mut self, ignore: bool) -> Self {
        self.ignore_certificate_errors = ignore;
        self
    }
}

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Command {
    Load(String),
    Stop,
}

/// Rendering engine backed by a real Chromium tab
pub struct ChromiumEngine {
    runtime: Runtime,
    browser: CdpBrowser,
    commands: mpsc::UnboundedSender<Command>,
    progress: Arc<AtomicU8>,
    url: Arc<Mutex<Option<String>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ChromiumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumEngine")
            .field("progress", &self.progress)
            .field("url", &self.url)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl ChromiumEngine {
    /// Launch Chromium and open one tab reporting through `events`.
    ///
    /// Must not be called from inside a tokio runtime; the harness factory
    /// runs outside one.
    ///
    /// # Errors
    ///
    /// Returns error if the runtime or browser cannot be started
    pub fn launch(options: &ChromiumOptions, events: EventSink) -> HarnessResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("reliant-chromium")
            .enable_all()
            .build()?;

        let progress = Arc::new(AtomicU8::new(0));
        let url = Arc::new(Mutex::new(None));
        let (commands, command_rx) = mpsc::unbounded_channel();

        let (browser, tasks) = runtime.block_on(async {
            let (browser, page, mut tasks) = open(options).await?;
            let main_frame = page.mainframe().await.map_err(launch_error)?;
            tasks.extend(
                forward_events(&page, main_frame, &events, &progress, &url)
                    .await
                    .map_err(launch_error)?,
            );
            tasks.push(tokio::spawn(run_commands(page, events, command_rx)));
            Ok::<_, HarnessError>((browser, tasks))
        })?;

        Ok(Self {
            runtime,
            browser,
            commands,
            progress,
            url,
            tasks,
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("chromium command task has stopped");
        }
    }
}

impl RenderingEngine for ChromiumEngine {
    fn load_url(&mut self, url: &str) {
        self.progress.store(0, Ordering::SeqCst);
        // until Page.frameNavigated reports where the load ended up
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
        self.send(Command::Load(url.to_string()));
    }

    fn stop_loading(&mut self) {
        self.send(Command::Stop);
    }

    fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    fn current_url(&self) -> Option<String> {
        self.url.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        // close needs the CDP handler task alive
        let browser = &mut self.browser;
        self.runtime.block_on(async {
            match tokio::time::timeout(CLOSE_TIMEOUT, browser.close()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!("browser close failed: {e}"),
                Err(_) => warn!("browser did not close within {CLOSE_TIMEOUT:?}"),
            }
        });
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn launch_error(e: impl std::fmt::Display) -> HarnessError {
    HarnessError::engine_launch(e.to_string())
}

async fn open(
    options: &ChromiumOptions,
) -> HarnessResult<(CdpBrowser, CdpPage, Vec<JoinHandle<()>>)> {
    let mut builder =
        CdpConfig::builder().window_size(options.viewport_width, options.viewport_height);
    if !options.headless {
        builder = builder.with_head();
    }
    if !options.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(ref path) = options.chromium_path {
        builder = builder.chrome_executable(path);
    }
    let config = builder.build().map_err(launch_error)?;

    let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(launch_error)?;
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    let page = browser.new_page("about:blank").await.map_err(launch_error)?;
    if options.ignore_certificate_errors {
        page.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await
            .map_err(launch_error)?;
    }
    Ok((browser, page, vec![handler_task]))
}

async fn forward_events(
    page: &CdpPage,
    main_frame: Option<FrameId>,
    events: &EventSink,
    progress: &Arc<AtomicU8>,
    url: &Arc<Mutex<Option<String>>>,
) -> chromiumoxide::error::Result<Vec<JoinHandle<()>>> {
    let mut tasks = Vec::new();

    let mut started = page.event_listener::<EventFrameStartedLoading>().await?;
    let (sink, main, prog) = (events.clone(), main_frame.clone(), Arc::clone(progress));
    let current = Arc::clone(url);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = started.next().await {
            // subframes never report a matching main-frame stop
            if !is_main_frame(main.as_ref(), &event.frame_id) {
                continue;
            }
            prog.store(10, Ordering::SeqCst);
            let url = current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_default();
            sink.load_started(url);
        }
    }));

    let mut stopped = page.event_listener::<EventFrameStoppedLoading>().await?;
    let (sink, main, prog) = (events.clone(), main_frame, Arc::clone(progress));
    let current = Arc::clone(url);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = stopped.next().await {
            if !is_main_frame(main.as_ref(), &event.frame_id) {
                continue;
            }
            prog.store(100, Ordering::SeqCst);
            let url = current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_default();
            sink.load_finished(url);
        }
    }));

    let mut dom_ready = page.event_listener::<EventDomContentEventFired>().await?;
    let prog = Arc::clone(progress);
    tasks.push(tokio::spawn(async move {
        while dom_ready.next().await.is_some() {
            prog.fetch_max(60, Ordering::SeqCst);
        }
    }));

    let mut navigated = page.event_listener::<EventFrameNavigated>().await?;
    let current = Arc::clone(url);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = navigated.next().await {
            if event.frame.parent_id.is_none() {
                *current.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(event.frame.url.clone());
            }
        }
    }));

    let mut loaded = page.event_listener::<EventLoadEventFired>().await?;
    let (sink, title_page) = (events.clone(), page.clone());
    tasks.push(tokio::spawn(async move {
        while loaded.next().await.is_some() {
            match title_page.get_title().await {
                Ok(Some(title)) => {
                    sink.title(title);
                }
                Ok(None) => {}
                Err(e) => debug!("title lookup failed: {e}"),
            }
        }
    }));

    let mut dialogs = page.event_listener::<EventJavascriptDialogOpening>().await?;
    let (sink, dialog_page) = (events.clone(), page.clone());
    tasks.push(tokio::spawn(async move {
        while let Some(event) = dialogs.next().await {
            let dialog = Dialog {
                dialog_type: dialog_type(&event.r#type),
                message: event.message.clone(),
                default_value: event.default_prompt.clone(),
            };
            let Ok(action) = sink.dialog(dialog).await else {
                break;
            };
            let accept = !matches!(action, DialogAction::Dismiss);
            let mut params = HandleJavaScriptDialogParams::new(accept);
            if let DialogAction::AcceptWith(text) = action {
                params.prompt_text = Some(text);
            }
            if let Err(e) = dialog_page.execute(params).await {
                warn!("failed to answer dialog: {e}");
            }
        }
    }));

    Ok(tasks)
}

/// Frames are treated as main when the main frame id is unknown
fn is_main_frame(main: Option<&FrameId>, frame: &FrameId) -> bool {
    main.map_or(true, |id| id == frame)
}

fn dialog_type(kind: &CdpDialogType) -> DialogType {
    match kind {
        CdpDialogType::Alert => DialogType::Alert,
        CdpDialogType::Confirm => DialogType::Confirm,
        CdpDialogType::Prompt => DialogType::Prompt,
        CdpDialogType::Beforeunload => DialogType::BeforeUnload,
    }
}

async fn run_commands(
    page: CdpPage,
    events: EventSink,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut navigation: Option<JoinHandle<()>> = None;
    while let Some(command) = commands.recv().await {
        match command {
            Command::Load(url) => {
                let (page, events) = (page.clone(), events.clone());
                navigation = Some(tokio::spawn(async move {
                    if let Err(e) = page.goto(url.clone()).await {
                        events.load_error(-1, e.to_string(), url);
                    }
                }));
            }
            Command::Stop => {
                if let Some(pending) = navigation.take() {
                    pending.abort();
                }
                if let Err(e) = page.execute(StopLoadingParams::default()).await {
                    debug!("stop loading failed: {e}");
                }
            }
        }
    }
}
