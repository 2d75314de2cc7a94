mod commands;
mod helpers;

use clap::Parser;
use diffusion_core::domain::DiffusionError;
use tracing_subscriber::EnvFilter;

const PROGRAM_NAME: &str = "iondiff";
const LOG_LEVEL_ENV: &str = "LOGLEVEL";

/// Installs the stderr log subscriber; the level comes from `LOGLEVEL`
/// (`info` when unset or unparsable).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diffusion_error = error.as_diffusion_error();
            eprintln!("{}", diffusion_error.diagnostic_line());
            if let Some(summary_line) = diffusion_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diffusion_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "iondiff",
    version,
    about = "Diffusion coefficients from molecular-dynamics MSD"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Compute the MSD of a trajectory, fit the diffusion coefficient and write the record
    Msd(commands::MsdArgs),
    /// Re-fit a stored record over a new discard window
    Recompute(commands::RecomputeArgs),
    /// Diffusion coefficient as a function of averaging-window width
    Convergence(commands::ConvergenceArgs),
    /// Detect atomic jumps in the per-atom MSD of a stored record
    Jumps(commands::JumpsArgs),
    /// Activation energy from records at several temperatures
    Arrhenius(commands::ArrheniusArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Msd(args) => commands::run_msd_command(args),
        CliCommand::Recompute(args) => commands::run_recompute_command(args),
        CliCommand::Convergence(args) => commands::run_convergence_command(args),
        CliCommand::Jumps(args) => commands::run_jumps_command(args),
        CliCommand::Arrhenius(args) => commands::run_arrhenius_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(#[from] DiffusionError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_diffusion_error(&self) -> DiffusionError {
        match self {
            Self::Usage(message) => DiffusionError::configuration("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DiffusionError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_exits_successfully() {
        assert_eq!(run(["--help"]).expect("help should succeed"), 0);
        assert_eq!(run(["msd", "--help"]).expect("help should succeed"), 0);
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        let error = run(["diffuse"]).expect_err("unknown command");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.as_diffusion_error().exit_code(), 2);
    }

    #[test]
    fn compute_errors_keep_their_category() {
        let error = run(["convergence", "/nonexistent/record.json"]).expect_err("missing record");
        assert_eq!(error.as_diffusion_error().exit_code(), 4);
    }
}
