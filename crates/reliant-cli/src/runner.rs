//! Drives a URL list through one harness, one navigation at a time

use crate::commands::EngineArg;
use crate::error::{CliError, CliResult};
use crate::output::ResultPrinter;
use reliant::{Harness, HarnessConfig, HarnessError, NavigationReport, NavigationRequest};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Chromium launch settings taken from the command line
#[derive(Debug, Clone, Default)]
pub struct ChromiumSettings {
    /// Show the browser window
    pub headed: bool,
    /// Disable the sandbox
    pub no_sandbox: bool,
    /// Browser binary
    pub chromium_path: Option<String>,
}

/// Per-URL navigation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    /// Timeout per URL in milliseconds (0 = never)
    pub timeout_ms: u64,
    /// Settle delay override
    pub settle_ms: Option<u64>,
}

/// Reports of a finished run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// One report per URL, in order
    pub reports: Vec<NavigationReport>,
    /// Wall time of the whole run
    pub duration: Duration,
}

impl RunSummary {
    /// URLs that became stable
    #[must_use]
    pub fn completed(&self) -> usize {
        self.reports.iter().filter(|r| !r.timed_out()).count()
    }

    /// URLs that hit their timeout
    #[must_use]
    pub fn timed_out(&self) -> usize {
        self.reports.iter().filter(|r| r.timed_out()).count()
    }
}

/// Parse a URL list: one URL per line, blank lines and `#` comments skipped
#[must_use]
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a URL list from `path`, or stdin when `path` is `-`
pub fn read_url_list(path: &Path) -> CliResult<Vec<String>> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            CliError::invalid_argument(format!("cannot read URL list {}: {e}", path.display()))
        })?
    };
    Ok(parse_url_list(&text))
}

/// Start a harness on the chosen engine
pub fn spawn_harness(
    engine: EngineArg,
    config: HarnessConfig,
    chromium: &ChromiumSettings,
) -> CliResult<Harness> {
    match engine {
        EngineArg::Simulated => Ok(Harness::spawn(config, |sink| {
            Ok(reliant::SimulatedEngine::new(sink))
        })?),
        EngineArg::Chromium => spawn_chromium(config, chromium),
    }
}

#[cfg(feature = "browser")]
fn spawn_chromium(config: HarnessConfig, chromium: &ChromiumSettings) -> CliResult<Harness> {
    let mut options = reliant::ChromiumOptions::default()
        .with_headless(!chromium.headed)
        .with_ignore_certificate_errors(config.ssl_errors == reliant::SslDecision::Proceed);
    if chromium.no_sandbox {
        options = options.with_no_sandbox();
    }
    if let Some(path) = &chromium.chromium_path {
        options = options.with_chromium_path(path.clone());
    }
    Ok(Harness::spawn(config, move |sink| {
        reliant::ChromiumEngine::launch(&options, sink)
    })?)
}

#[cfg(not(feature = "browser"))]
fn spawn_chromium(_config: HarnessConfig, _chromium: &ChromiumSettings) -> CliResult<Harness> {
    Err(CliError::invalid_argument(
        "the chromium engine is not compiled in; rebuild with --features browser",
    ))
}

/// Navigate to each URL in turn, waiting for each to finish, then end the
/// harness with an empty navigation
pub fn drive(
    harness: &Harness,
    urls: &[String],
    plan: RunPlan,
    printer: &mut ResultPrinter,
) -> CliResult<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::default();

    for url in urls {
        harness.reset()?;
        let mut request = NavigationRequest::new(url.clone(), plan.timeout_ms);
        if let Some(settle) = plan.settle_ms {
            request = request.with_settle(settle);
        }
        harness.navigate_with(request)?;
        printer.loading(url);
        let report = harness.wait_for_report()?.ok_or(HarnessError::ShutDown)?;
        printer.report(&report);
        summary.reports.push(report);
    }

    harness.navigate("", 0)?;
    harness.join();
    summary.duration = start.elapsed();
    info!(
        urls = urls.len(),
        completed = summary.completed(),
        timed_out = summary.timed_out(),
        "run finished"
    );
    printer.summary(summary.completed(), summary.timed_out(), summary.duration);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_parse_url_list() {
        let urls = parse_url_list("# pages\nhttp://a/\n\n  sim://b?latency=5  \n#skip\n");
        assert_eq!(urls, vec!["http://a/".to_string(), "sim://b?latency=5".to_string()]);
    }

    #[test]
    fn test_read_missing_list() {
        let err = read_url_list(Path::new("/nonexistent/urls.txt")).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }

    #[test]
    fn test_drive_simulated_run() {
        let config = HarnessConfig::default().with_stability_delay(50);
        let harness =
            spawn_harness(EngineArg::Simulated, config, &ChromiumSettings::default()).unwrap();
        let urls = vec![
            "sim://ok?latency=10".to_string(),
            "sim://stuck?latency=10&hang=1".to_string(),
        ];
        let plan = RunPlan {
            timeout_ms: 300,
            settle_ms: None,
        };
        let mut printer = ResultPrinter::new(OutputFormat::Json, false, true);
        let summary = drive(&harness, &urls, plan, &mut printer).unwrap();

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.timed_out(), 1);
        assert!(harness.is_shut_down());
    }

    #[cfg(not(feature = "browser"))]
    #[test]
    fn test_chromium_requires_feature() {
        let err = spawn_harness(
            EngineArg::Chromium,
            HarnessConfig::default(),
            &ChromiumSettings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("browser"));
    }
}
