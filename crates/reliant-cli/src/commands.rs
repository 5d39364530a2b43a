//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Reliant: drive a list of URLs through the page-load reliability harness
#[derive(Parser, Debug)]
#[command(name = "reliant")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load each URL in a list and report whether it completed or timed out
    Run(RunArgs),

    /// Show the effective harness configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// File with one URL per line ("-" reads stdin; blank lines and # comments are skipped)
    pub urls: PathBuf,

    /// Per-URL timeout in milliseconds (0 = never)
    #[arg(short, long, default_value = "10000")]
    pub timeout: u64,

    /// Extra wait after a page becomes stable, in milliseconds
    #[arg(long)]
    pub settle: Option<u64>,

    /// Stability window in milliseconds (overrides the config file)
    #[arg(long)]
    pub stability_delay: Option<u64>,

    /// Rendering engine
    #[arg(short, long, value_enum, default_value = "simulated")]
    pub engine: EngineArg,

    /// Harness configuration file (YAML)
    #[arg(short, long, env = "RELIANT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Result output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Exit with failure if any URL timed out
    #[arg(long)]
    pub fail_on_timeout: bool,

    /// Chromium: show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium: disable the sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium: path to the browser binary
    #[arg(long, env = "RELIANT_CHROMIUM")]
    pub chromium_path: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Harness configuration file (YAML)
    #[arg(short, long, env = "RELIANT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Rendering engine argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineArg {
    /// Scripted in-process pages (sim:// URLs)
    #[default]
    Simulated,
    /// Headless Chromium over CDP (needs the `browser` feature)
    Chromium,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormatArg {
    /// One human-readable line per URL
    #[default]
    Text,
    /// One JSON report per line
    Json,
}

impl From<OutputFormatArg> for crate::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => Self::Text,
            OutputFormatArg::Json => Self::Json,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for crate::logging::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
