//! Command line configuration of the `lnd-probe` binary
//!
//! Every option can also be supplied through the environment.

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use crate::{Bootstrapper, Diagnostics, Probe};

/// Connects to LND, issues one informational call and prints the response.
#[derive(Debug, Clone, Parser)]
#[command(name = "lnd-probe", version, about, long_about = None)]
pub struct Args {
    /// Path to TLS certificate
    #[arg(long = "tls-cert", env = "LND_TLS_CERT", default_value = "./tls.cert")]
    pub tls_cert: PathBuf,

    /// Path to macaroon
    #[arg(long, env = "LND_MACAROON", default_value = "./admin.macaroon")]
    pub macaroon: PathBuf,

    /// Remote server location, `host:port` or `https://host:port`
    #[arg(long, env = "LND_SERVER")]
    pub server: String,

    /// Enable gRPC transport logging
    #[arg(long)]
    pub grpclog: bool,

    /// Seconds dialing and the call may take together
    #[arg(long, value_name = "SECONDS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Call used to probe the node
    #[arg(long, value_enum, default_value_t = Probe::Info)]
    pub probe: Probe,
}

impl Args {
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new().with_transport(self.grpclog)
    }

    pub fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(self.server.clone(), self.tls_cert.clone(), self.macaroon.clone())
            .timeout(Duration::from_secs(self.timeout))
            .diagnostics(self.diagnostics())
    }
}
