// mono CLI entry point

use std::process::ExitCode;

use clap::Parser;
use monomind_cli::{output, Cli, CliError, CommandRouter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CliError>() {
                Some(cli_error) => {
                    output::print_error(&cli_error.user_message());
                    if debug {
                        eprintln!("{}", cli_error.technical_details());
                    }
                }
                None => output::print_error(&format!("{:#}", e)),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    CommandRouter::run(&cli).await?;
    Ok(())
}
