mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use smartzone_core::Controller;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { mut global, command } = cli;
    match command {
        // Shell completions need no controller
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "smartzone", &mut std::io::stdout());
            Ok(())
        }

        // Bad input fails before any request
        Command::Apply(args) => {
            let document = commands::apply::load_document(&args.file)?;
            let mut controller = connect(&mut global).await?;
            let result = commands::apply::handle(&controller, &document, &args, &global).await;
            controller.logout().await;
            result
        }

        cmd => {
            let mut controller = connect(&mut global).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &global).await;
            controller.logout().await;
            result
        }
    }
}

/// Load the config file, settle the output format, and log in.
async fn connect(global: &mut GlobalOpts) -> Result<Controller, CliError> {
    let config = config::load()?;
    config::apply_output_default(&config, global)?;
    let controller_config = config::build_controller_config(&config, global)?;
    Ok(Controller::connect(&controller_config).await?)
}
