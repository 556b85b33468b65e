//! Connects to LND, issues one informational call and prints the response.
//!
//! ```bash
//! lnd-probe --server localhost:10009 --tls-cert ~/.lnd/tls.cert \
//!     --macaroon ~/.lnd/data/chain/bitcoin/mainnet/readonly.macaroon
//! ```

use std::process::ExitCode;
use clap::Parser;
use lnd_probe::config::Args;
use lnd_probe::BootstrapError;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*};

async fn run(args: &Args) -> Result<(), BootstrapError> {
    let mut client = args.bootstrapper().connect().await?;
    let response = client.probe(args.probe).await?;
    println!("{}", response);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(args.diagnostics().env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(server = %args.server, "lnd-probe: starting");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err.kind();
            error!(?kind, "{:#}", anyhow::Error::new(err));
            ExitCode::FAILURE
        },
    }
}
