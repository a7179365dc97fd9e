// gateboot CLI entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "gateboot", about = "Reconcile durable state and hand off to the gateway")]
struct Cli {
    /// Settings file (defaults to $GATEBOOT_SETTINGS, then /etc/gateboot/boot.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Force JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable for `overlay` and `--json`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::detect(cli.json);
    match commands::run(cli.command, cli.settings.as_deref(), format) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            let code = ExitCode::from_error(&error);
            output::print_error(format, code.label(), &format!("{error:#}"));
            code.into()
        }
    }
}
