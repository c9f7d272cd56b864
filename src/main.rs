use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dbview::cli::{Cli, Command};
use dbview::config::InstallConfig;
use dbview::install;
use dbview::setup::PgAdmin;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Install(args) => {
            let config = InstallConfig::from(args);
            if !install::check_input_parameters(&config) {
                return Ok(());
            }

            let outcome = install::run_install(&PgAdmin::new(), &config).await?;
            info!(tenant = %config.tenant_role(), "Done. ({outcome})");
        }
    }
    Ok(())
}
