//! Logging configuration handed to the bootstrapper
//!
//! Nothing here touches global state. The bootstrapper consults [`Diagnostics`] to decide how
//! much transport detail to emit and the binary turns it into the filter of the subscriber it
//! installs.

use tracing_subscriber::EnvFilter;

/// Targets of the transport stack underneath `tonic`.
// rustls 0.19 logs through `log` only, which is not bridged here.
const TRANSPORT_TARGETS: &[&str] = &["h2", "hyper", "tonic", "tower"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    transport: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables verbose transport diagnostics.
    ///
    /// The transport stack then reports warnings and errors (its informational output is too
    /// noisy to be useful) and the bootstrapper logs certificate and dial details.
    pub fn with_transport(mut self, enabled: bool) -> Self {
        self.transport = enabled;
        self
    }

    pub fn transport(&self) -> bool {
        self.transport
    }

    /// Filter directives in `EnvFilter` syntax.
    pub fn directives(&self) -> String {
        let (own, transport) = if self.transport { ("debug", "warn") } else { ("info", "off") };

        let mut directives = vec!["info".to_owned(), format!("{}={}", env!("CARGO_CRATE_NAME"), own)];
        directives.extend(TRANSPORT_TARGETS.iter().map(|target| format!("{}={}", target, transport)));
        directives.join(",")
    }

    /// Builds the subscriber filter, `RUST_LOG` takes precedence when set.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}
