//! Reliant CLI Library
//!
//! Command-line driver for the Reliant page-load harness: reads a URL list,
//! drives each URL through one harness and prints one result per URL.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod logging;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, EngineArg, LogFormatArg, OutputFormatArg, RunArgs,
};
pub use config::{load_harness_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::{env_filter, init_logging, LogFormat};
pub use output::{format_report, format_summary, OutputFormat, ResultPrinter};
pub use runner::{
    drive, parse_url_list, read_url_list, spawn_harness, ChromiumSettings, RunPlan, RunSummary,
};
