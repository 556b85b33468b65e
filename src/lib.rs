// include_str! is not supported in attributes yet
#![doc = r###"
Bootstraps an authenticated session with LND and probes it with one informational call.

## About

The session is established the way a careful client should do it:

* the node's `tls.cert` is pinned, the server must present exactly that chain,
* the macaroon is decoded (V1 or V2 binary encoding) before anything touches the network,
  and attached to every call as the `macaroon` header,
* dialing happens once, eagerly, under a deadline: refused connections and certificate
  mismatches are reported right away instead of being retried until the time runs out,
* the probe call gets whatever is left of the same deadline.

It contains a vendored subset of LND's `lightning.proto` and `verrpc.proto` (only the
informational calls) and accepts an environment variable `LND_REPO_DIR` which overrides
the vendored files during build.

## Usage

```no_run
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), lnd_probe::BootstrapError> {
    let mut client = lnd_probe::Bootstrapper::new("localhost:10009", "./tls.cert", "./admin.macaroon")
        .timeout(Duration::from_secs(10))
        .connect()
        .await?;

    let info = client.get_info().await?;
    println!("{:#?}", info);
    Ok(())
}
```

The `lnd-probe` binary wraps exactly this and is configured from the command line.

## License

MITNFA
"###]

/// This is part of public interface so it's re-exported.
pub extern crate tonic;

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use error::InternalBootstrapError;
use tonic::codegen::InterceptedService;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

pub use auth::{AuthInterceptor, CallCredential};
pub use deadline::Deadline;
pub use diagnostics::Diagnostics;
pub use error::{BootstrapError, ErrorKind};
pub use macaroon::Macaroon;

/// Convenience type alias for lightning client.
pub type LightningClient = lnrpc::lightning_client::LightningClient<InterceptedService<Channel, AuthInterceptor>>;

/// Convenience type alias for versioner service client.
pub type VersionerClient =
    verrpc::versioner_client::VersionerClient<InterceptedService<Channel, AuthInterceptor>>;

/// How long dialing and the probe call may take together unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub mod auth;
pub mod config;
mod deadline;
pub mod diagnostics;
mod error;
pub mod macaroon;
mod tls;

macro_rules! try_map_err {
    ($result:expr, $mapfn:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => return Err($mapfn(error).into()),
        }
    }
}

/// Messages and other types generated by `tonic`/`prost`
///
/// Only the calls used for probing are vendored; start from
/// [`LightningClient`](lnrpc::lightning_client::LightningClient).
pub mod lnrpc {
    tonic::include_proto!("lnrpc");
}

pub mod verrpc {
    tonic::include_proto!("verrpc");
}

/// Transport and call credentials, both loaded and validated
///
/// The only way to obtain this is [`Bootstrapper::load_credentials`], so a session can not be
/// dialed before both credentials are in place.
#[derive(Clone)]
pub struct Credentials {
    tls_config: ClientTlsConfig,
    interceptor: AuthInterceptor,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

/// Connects to a single LND node
///
/// Holds everything needed to establish the session: where the credentials live, where the
/// node is and how long the whole bootstrap may take.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    address: String,
    cert_file: PathBuf,
    macaroon_file: PathBuf,
    timeout: Duration,
    diagnostics: Diagnostics,
}

impl Bootstrapper {
    /// The address may be given as `host:port`, in which case `https://` is assumed.
    pub fn new(address: impl Into<String>, cert_file: impl Into<PathBuf>, macaroon_file: impl Into<PathBuf>) -> Self {
        Bootstrapper {
            address: address.into(),
            cert_file: cert_file.into(),
            macaroon_file: macaroon_file.into(),
            timeout: DEFAULT_TIMEOUT,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Reads and validates the certificate and the macaroon
    ///
    /// No network I/O happens here.
    #[tracing::instrument(name = "Loading credentials", skip(self), fields(cert = %self.cert_file.display(), macaroon = %self.macaroon_file.display()))]
    pub async fn load_credentials(&self) -> Result<Credentials, BootstrapError> {
        let verifier = tls::CertVerifier::load(&self.cert_file, self.diagnostics).await?;
        let pinned = verifier.len();
        let macaroon = load_macaroon(&self.macaroon_file).await?;
        let interceptor = AuthInterceptor::new(&macaroon)
            .map_err(InternalBootstrapError::InvalidCallCredential)?;

        tracing::debug!(pinned, macaroon_version = ?macaroon.version(), caveats = macaroon.caveats().len(), "credentials loaded");

        Ok(Credentials {
            tls_config: tls::config(verifier),
            interceptor,
        })
    }

    /// Dials the node once, blocking until it is connected, fails permanently or the deadline
    /// elapses.
    #[tracing::instrument(name = "Connecting to LND", skip(self, credentials, deadline), fields(address = %self.address))]
    pub async fn connect_with(&self, credentials: Credentials, deadline: Deadline) -> Result<Client, BootstrapError> {
        let address = normalize_address(&self.address);
        let endpoint = try_map_err!(Endpoint::from_shared(address.clone()),
            |error| InternalBootstrapError::InvalidAddress { address: address.clone(), error: Box::new(error), });

        let tls_config = match endpoint.uri().scheme_str() {
            Some("https") => credentials.tls_config,
            _ => return Err(InternalBootstrapError::InvalidAddress { address, error: "only https is supported".into(), }.into()),
        };
        // The pinned verifier ignores the name but rustls can not be given an IP literal.
        let tls_config = match endpoint.uri().host() {
            Some(host) if is_ip_literal(host) => tls_config.domain_name("localhost"),
            _ => tls_config,
        };

        let start = tokio::time::Instant::now();
        let endpoint = endpoint
            .tls_config(tls_config)
            .map_err(InternalBootstrapError::TlsConfig)?;
        let channel = deadline
            .run(endpoint.connect())
            .await
            .map_err(|_| InternalBootstrapError::ConnectTimeout { address: address.clone(), timeout: deadline.budget(), })?
            .map_err(|error| InternalBootstrapError::Connect { address: address.clone(), error, })?;

        tracing::info!(duration = ?start.elapsed(), "dialed to LND");
        if self.diagnostics.transport() {
            tracing::debug!(remaining = ?deadline.remaining(), "deadline budget left for calls");
        }

        Ok(Client::new(channel, credentials.interceptor, deadline))
    }

    /// Loads the credentials and dials the node under a deadline starting now.
    pub async fn connect(&self) -> Result<Client, BootstrapError> {
        let deadline = Deadline::after(self.timeout);
        let credentials = self.load_credentials().await?;
        self.connect_with(credentials, deadline).await
    }
}

async fn load_macaroon(path: &Path) -> Result<Macaroon, InternalBootstrapError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| InternalBootstrapError::ReadFile { what: "macaroon", file: path.to_owned(), error, })?;
    Macaroon::decode(&bytes)
        .map_err(|error| InternalBootstrapError::ParseMacaroon { file: path.to_owned(), error, })
}

fn normalize_address(address: &str) -> String {
    if address.contains("://") {
        address.to_owned()
    } else {
        format!("https://{}", address)
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// Informational call used to check that a session works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Probe {
    /// `Lightning.GetInfo`, like `lncli getinfo`
    #[default]
    Info,
    /// `Versioner.GetVersion`, like `lncli version`
    Version,
}

/// Response of a [`Probe`].
#[derive(Debug, Clone)]
pub enum ProbeResponse {
    Info(lnrpc::GetInfoResponse),
    Version(verrpc::Version),
}

impl fmt::Display for ProbeResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProbeResponse::Info(info) => write!(f, "{:#?}", info),
            ProbeResponse::Version(version) => write!(f, "{:#?}", version),
        }
    }
}

/// The client returned by [`Bootstrapper::connect`]
///
/// Every request carries the macaroon. The convenience calls are bounded by the deadline the
/// session was dialed under; the raw clients are not.
#[derive(Clone)]
pub struct Client {
    lightning: LightningClient,
    versioner: VersionerClient,
    deadline: Deadline,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Client {
    fn new(channel: Channel, interceptor: AuthInterceptor, deadline: Deadline) -> Self {
        Client {
            lightning: lnrpc::lightning_client::LightningClient::with_interceptor(channel.clone(), interceptor.clone()),
            versioner: verrpc::versioner_client::VersionerClient::with_interceptor(channel, interceptor),
            deadline,
        }
    }

    /// Returns the lightning client.
    pub fn lightning(&mut self) -> &mut LightningClient {
        &mut self.lightning
    }

    /// Returns the versioner client.
    pub fn versioner(&mut self) -> &mut VersionerClient {
        &mut self.versioner
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub async fn get_info(&mut self) -> Result<lnrpc::GetInfoResponse, BootstrapError> {
        const METHOD: &str = "GetInfo";

        // nothing left of the budget, don't put a doomed call on the wire
        if self.deadline.has_elapsed() {
            return Err(InternalBootstrapError::CallTimeout { method: METHOD, }.into());
        }
        let response = self.deadline
            .run(self.lightning.get_info(lnrpc::GetInfoRequest {}))
            .await
            .map_err(|_| InternalBootstrapError::CallTimeout { method: METHOD, })?
            .map_err(|status| InternalBootstrapError::Call { method: METHOD, status, })?;
        Ok(response.into_inner())
    }

    pub async fn get_version(&mut self) -> Result<verrpc::Version, BootstrapError> {
        const METHOD: &str = "GetVersion";

        // nothing left of the budget, don't put a doomed call on the wire
        if self.deadline.has_elapsed() {
            return Err(InternalBootstrapError::CallTimeout { method: METHOD, }.into());
        }
        let response = self.deadline
            .run(self.versioner.get_version(verrpc::VersionRequest {}))
            .await
            .map_err(|_| InternalBootstrapError::CallTimeout { method: METHOD, })?
            .map_err(|status| InternalBootstrapError::Call { method: METHOD, status, })?;
        Ok(response.into_inner())
    }

    #[tracing::instrument(skip(self))]
    pub async fn probe(&mut self, probe: Probe) -> Result<ProbeResponse, BootstrapError> {
        let start = tokio::time::Instant::now();
        let response = match probe {
            Probe::Info => ProbeResponse::Info(self.get_info().await?),
            Probe::Version => ProbeResponse::Version(self.get_version().await?),
        };
        tracing::debug!(duration = ?start.elapsed(), "probe answered");
        Ok(response)
    }
}
