use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use slipguard_archive::{Error, ExtractionReport, extract_archive};
use tracing_subscriber::EnvFilter;

use crate::cli::App;
use crate::config::Settings;

mod cli;
mod config;

/// How a finished extraction maps onto the process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Clean,
    Fatal,
    Rejected,
}

impl Outcome {
    fn of(report: &ExtractionReport) -> Self {
        if report.fatal.is_some() {
            Self::Fatal
        } else if report.is_partially_rejected() || !report.audit.is_empty() {
            Self::Rejected
        } else {
            Self::Clean
        }
    }

    fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::Fatal => ExitCode::from(1),
            Self::Rejected => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    let app = App::parse();
    if let Err(e) = init_tracing(app.verbose) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match run(&app) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("error: {e:#}");
            Outcome::Fatal.exit_code()
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let (bin, lib) = if verbose {
        ("slipguard=debug", "slipguard_archive=debug")
    } else {
        ("slipguard=warn", "slipguard_archive=error")
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(bin.parse()?)
                .add_directive(lib.parse()?),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(anyhow::Error::from_boxed)?;
    Ok(())
}

fn run(app: &App) -> anyhow::Result<Outcome> {
    let settings = Settings::load(app).context("failed to load configuration")?;
    tracing::debug!(?settings, src = %app.src.display(), dest = %app.dest.display(), "starting");

    let report = extract_archive(&app.src, &app.dest, &settings.options());
    print!("{}", render(&report));
    Ok(Outcome::of(&report))
}

/// Human-readable summary of a report.
fn render(report: &ExtractionReport) -> String {
    let mut out = String::new();

    match &report.fatal {
        Some(Error::UnsupportedFormat { .. }) => out.push_str("File type not supported\n"),
        Some(e) => out.push_str(&format!("Extraction failed: {e}\n")),
        None => {}
    }

    if !report.warnings.is_empty() {
        out.push_str("Entries rejected:\n");
        for warning in &report.warnings {
            out.push_str(&format!("  {warning}\n"));
        }
    }

    if !report.audit.is_empty() {
        out.push_str("Symlinks escaping destination:\n");
        for escaping in &report.audit {
            match &escaping.target {
                Some(target) => out.push_str(&format!(
                    "  {} -> {}\n",
                    escaping.link.display(),
                    target.display()
                )),
                None => out.push_str(&format!("  {}\n", escaping.link.display())),
            }
        }
    }

    if report.is_clean() && report.audit.is_empty() {
        if report.validated_only {
            out.push_str("Archive is valid\n");
        } else {
            out.push_str("Archive extracted successfully\n");
        }
    }

    out
}
