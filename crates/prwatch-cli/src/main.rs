mod bootstrap_helpers;
mod cli_args;
mod watch_command;

use std::process::ExitCode;

use clap::Parser;
use prwatch_core::comment::EXIT_CODE_ERROR;
use tracing::level_filters::LevelFilter;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::watch_command::run_watch_command;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LevelFilter::WARN);
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_for_parse_error(&error),
    };
    match run_watch_command(&cli).await {
        Ok(code) => exit_code_from(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            exit_code_from(EXIT_CODE_ERROR)
        }
    }
}

/// Usage errors share the generic error code; 2 is reserved for an empty timeout.
fn exit_for_parse_error(error: &clap::Error) -> ExitCode {
    let _ = error.print();
    if error.use_stderr() {
        exit_code_from(EXIT_CODE_ERROR)
    } else {
        ExitCode::SUCCESS
    }
}

fn exit_code_from(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
