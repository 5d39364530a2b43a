//! Reliant CLI: load URL lists and report page stability
//!
//! ## Usage
//!
//! ```bash
//! reliant run urls.txt                          # Simulated engine, 10s timeout
//! reliant run urls.txt --engine chromium -t 5000
//! reliant run - --format json < urls.txt        # JSON lines
//! reliant config --config reliant.yaml          # Effective configuration
//! ```

use clap::Parser;
use reliant_cli::{
    drive, init_logging, load_harness_config, read_url_list, spawn_harness, ChromiumSettings,
    Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs, ResultPrinter,
    RunArgs, RunPlan, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(
        config.verbosity,
        cli.log_format.into(),
        config.color.should_color(),
    )?;

    match cli.command {
        Commands::Run(args) => run_urls(&config, &args),
        Commands::Config(args) => run_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn run_urls(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let mut harness_config = load_harness_config(args.config.as_deref())?;
    if let Some(delay) = args.stability_delay {
        harness_config = harness_config.with_stability_delay(delay);
    }

    let urls = read_url_list(&args.urls)?;
    if urls.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "no URLs in {}",
            args.urls.display()
        )));
    }

    let chromium = ChromiumSettings {
        headed: args.headed,
        no_sandbox: args.no_sandbox,
        chromium_path: args.chromium_path.clone(),
    };
    let harness = spawn_harness(args.engine, harness_config, &chromium)?;

    let plan = RunPlan {
        timeout_ms: args.timeout,
        settle_ms: args.settle,
    };
    let mut printer = ResultPrinter::new(
        args.format.into(),
        config.color.should_color(),
        config.verbosity.is_quiet(),
    );
    let summary = drive(&harness, &urls, plan, &mut printer)?;

    if args.fail_on_timeout && summary.timed_out() > 0 {
        return Err(CliError::TimedOut {
            count: summary.timed_out(),
            total: summary.reports.len(),
        });
    }
    Ok(())
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let harness_config = load_harness_config(args.config.as_deref())?;
    let text = if args.json {
        serde_json::to_string_pretty(&harness_config)?
    } else {
        serde_yaml_ng::to_string(&harness_config)?
    };
    println!("{}", text.trim_end());
    Ok(())
}
