//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use reliant::{NavigationReport, Outcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output format for navigation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON report per line
    Json,
}

/// Prints one line per navigation to stdout, with a spinner on stderr while
/// a page is loading
#[derive(Debug)]
pub struct ResultPrinter {
    term: Term,
    spinner: Option<ProgressBar>,
    format: OutputFormat,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl ResultPrinter {
    /// Create a new printer
    #[must_use]
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            spinner: None,
            format,
            use_color,
            quiet,
        }
    }

    /// Show a spinner for `url` (text format only)
    pub fn loading(&mut self, url: &str) {
        if self.quiet || self.format == OutputFormat::Json {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(url.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    /// Print the result of one navigation
    pub fn report(&mut self, report: &NavigationReport) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        let line = match self.format {
            OutputFormat::Json => match serde_json::to_string(report) {
                Ok(json) => json,
                Err(e) => format!("{{\"error\":\"{e}\"}}"),
            },
            OutputFormat::Text => {
                // timeouts are printed even in quiet mode
                if self.quiet && !report.timed_out() {
                    return;
                }
                format_report(report, self.use_color)
            }
        };
        let _ = self.term.write_line(&line);
    }

    /// Print the closing summary line (text format only)
    pub fn summary(&self, completed: usize, timed_out: usize, duration: Duration) {
        if self.format == OutputFormat::Json || (self.quiet && timed_out == 0) {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self
            .term
            .write_line(&format_summary(completed, timed_out, duration, self.use_color));
    }
}

/// One human-readable line for a navigation report
#[must_use]
pub fn format_report(report: &NavigationReport, use_color: bool) -> String {
    let (mark, detail) = match report.outcome {
        Outcome::Completed => (
            if use_color {
                style("✓").green().bold().to_string()
            } else {
                "DONE".to_string()
            },
            format!(
                "completed in {}ms ({} load{})",
                report.elapsed_ms,
                report.load_starts,
                if report.load_starts == 1 { "" } else { "s" }
            ),
        ),
        Outcome::TimedOut => (
            if use_color {
                style("✗").red().bold().to_string()
            } else {
                "TIMEOUT".to_string()
            },
            match report.progress_at_timeout {
                Some(progress) => format!("timed out after {}ms at {progress}%", report.elapsed_ms),
                None => format!("timed out after {}ms", report.elapsed_ms),
            },
        ),
    };
    let mut line = format!("{mark} {} {detail}", report.url);
    if let Some(title) = &report.title {
        line.push_str(&format!(" \"{title}\""));
    }
    if !report.errors.is_empty() {
        line.push_str(&format!(" [{} errors]", report.errors.len()));
    }
    line
}

/// Summary line for a whole run
#[must_use]
pub fn format_summary(
    completed: usize,
    timed_out: usize,
    duration: Duration,
    use_color: bool,
) -> String {
    let total = completed + timed_out;
    let secs = duration.as_secs_f64();
    if use_color {
        let status = if timed_out > 0 {
            Style::new().yellow().bold().apply_to("UNSTABLE")
        } else {
            Style::new().green().bold().apply_to("STABLE")
        };
        format!("{status} {total} URLs in {secs:.2}s ({completed} completed, {timed_out} timed out)")
    } else {
        let status = if timed_out > 0 { "UNSTABLE" } else { "STABLE" };
        format!("{status} {total} URLs in {secs:.2}s ({completed} completed, {timed_out} timed out)")
    }
}
