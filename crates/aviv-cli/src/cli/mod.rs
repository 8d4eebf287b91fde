mod commands;
mod helpers;

use aviv_core::domain::AvivError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_aviv_error();
            eprintln!("{}", error.diagnostic_line());
            eprintln!("{}", error.fatal_exit_line());
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("aviv-process".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.verbose);
            dispatch_parsed(cli.command)
        }
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
#[command(name = "aviv-process", version, about = "Process Aviv CD and ATF instrument files")]
struct Cli {
    /// Log every pipeline stage to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Show the instrument, experiment and configuration recorded in a file
    Identify(commands::IdentifyArgs),
    /// Correct a file and write the annotated table
    Process(commands::ProcessArgs),
    /// Denaturant concentration from refractive indexes
    Denaturant(commands::DenaturantArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Identify(args) => commands::run_identify_command(args),
        CliCommand::Process(args) => commands::run_process_command(args),
        CliCommand::Denaturant(args) => commands::run_denaturant_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Process(AvivError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_aviv_error(&self) -> AvivError {
        match self {
            Self::Usage(message) => AvivError::configuration("CONFIG.CLI_USAGE", message.trim_end()),
            Self::Process(error) => error.clone(),
            Self::Internal(error) => AvivError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use aviv_core::domain::{AvivError, AvivErrorCategory};

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["calibrate"]).expect_err("unknown command should fail");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.as_aviv_error().exit_code(), 3);
    }

    #[test]
    fn help_exits_cleanly() {
        assert_eq!(run(["--help"]).expect("help renders"), 0);
    }

    #[test]
    fn process_errors_keep_their_category() {
        let error = CliError::Process(AvivError::unsupported("UNSUPPORTED.COMBINATION", "no route"));
        let mapped = error.as_aviv_error();
        assert_eq!(mapped.category(), AvivErrorCategory::Unsupported);
        assert_eq!(mapped.exit_code(), 4);

        let error = CliError::Internal(anyhow::anyhow!("disk full"));
        assert_eq!(error.as_aviv_error().code(), "IO.CLI");
    }
}
