//! abono CLI entry point.

use abono_client::cli::{self, Cli};
use abono_client::config::ClientConfig;
use abono_client::error::ClientError;
use abono_client::telemetry;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    let config = ClientConfig::load(cli.config)?;
    telemetry::init_tracing(&config.log)?;
    let dispatcher = abono_client::connect(&config)?;

    let output = cli::run(cli.action.into(), dispatcher).await?;
    print!("{}", output);
    Ok(())
}
