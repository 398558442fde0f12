mod output;
mod root;

use anyhow::Context;
use bootstrap_core::pipeline::{Pipeline, EXIT_FAILED};
use bootstrap_core::process::{Interrupt, SystemRunner};
use bootstrap_core::settings::Settings;
use clap::Parser;
use output::Printer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bootstrap",
    about = "Set up the Galileo tutorial environment: check Python, create the virtualenv, seed .env, install and verify dependencies",
    version
)]
struct Cli {
    /// Project root (default: auto-detect from .env.example / requirements.txt, then .git/)
    #[arg(long, env = "BOOTSTRAP_ROOT")]
    root: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long, short = 'j')]
    json: bool,

    /// Log every external command and its exit status to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            EXIT_FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let interrupt = Interrupt::new();
    let flag = interrupt.clone();
    ctrlc::set_handler(move || flag.trigger()).context("failed to install Ctrl-C handler")?;

    let root = root::resolve_root(cli.root.as_deref())?;
    let settings = Settings::load(&root).context("failed to load .bootstrap.yaml")?;
    let printer = Printer::detect();

    if !cli.json {
        printer.header(&root);
    }
    for warning in settings.validate() {
        if cli.json {
            tracing::warn!("{}", warning.message);
        } else {
            printer.warning(&warning.message);
        }
    }

    let runner = SystemRunner::new(interrupt);
    let pipeline = Pipeline::new(&runner, settings.layout(&root));
    let report = pipeline.run(&mut |event| {
        if !cli.json {
            printer.event(event);
        }
    });

    if cli.json {
        output::print_json(&report)?;
    } else {
        printer.summary(&report);
    }

    Ok(report.exit_code())
}
