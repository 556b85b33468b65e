use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::macaroon::DecodeError;

/// Error that could happen while bootstrapping a session with LND
///
/// Returned by the loading, connecting and probing steps of [`Bootstrapper`](crate::Bootstrapper).
/// The variants are kept private; use [`kind()`](BootstrapError::kind) to find out which step failed
/// and `Display`/`source()` to report the cause.
#[derive(Debug)]
pub struct BootstrapError {
    internal: InternalBootstrapError,
}

/// The bootstrap step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The certificate or macaroon file is missing, unreadable or malformed.
    CredentialLoad,
    /// Dialing failed, including permanent transport errors and deadline expiry.
    Connection,
    /// The probe call failed, including deadline expiry.
    Call,
}

impl BootstrapError {
    pub fn kind(&self) -> ErrorKind {
        use InternalBootstrapError::*;

        match &self.internal {
            ReadFile { .. }
            | ParseCert { .. }
            | NoCertificates { .. }
            | InvalidCert { .. }
            | ParseMacaroon { .. }
            | InvalidCallCredential(_) => ErrorKind::CredentialLoad,
            InvalidAddress { .. } | TlsConfig(_) | Connect { .. } | ConnectTimeout { .. } => ErrorKind::Connection,
            Call { .. } | CallTimeout { .. } => ErrorKind::Call,
        }
    }

    /// Returns `true` if the deadline elapsed while dialing or while waiting for the call.
    pub fn is_deadline_exceeded(&self) -> bool {
        use InternalBootstrapError::*;

        match &self.internal {
            ConnectTimeout { .. } | CallTimeout { .. } => true,
            Call { status, .. } => status.code() == tonic::Code::DeadlineExceeded,
            _ => false,
        }
    }

    /// The credential file involved in the failure, if any.
    pub fn path(&self) -> Option<&Path> {
        use InternalBootstrapError::*;

        match &self.internal {
            ReadFile { file, .. }
            | ParseCert { file, .. }
            | NoCertificates { file }
            | InvalidCert { file, .. }
            | ParseMacaroon { file, .. } => Some(file.as_path()),
            _ => None,
        }
    }
}

impl From<InternalBootstrapError> for BootstrapError {
    fn from(value: InternalBootstrapError) -> Self {
        BootstrapError {
            internal: value,
        }
    }
}

#[derive(Debug)]
pub(crate) enum InternalBootstrapError {
    ReadFile { what: &'static str, file: PathBuf, error: std::io::Error, },
    ParseCert { file: PathBuf, error: std::io::Error, },
    NoCertificates { file: PathBuf, },
    InvalidCert { file: PathBuf, error: webpki::Error, },
    ParseMacaroon { file: PathBuf, error: DecodeError, },
    InvalidCallCredential(Box<dyn std::error::Error + Send + Sync + 'static>),
    InvalidAddress { address: String, error: Box<dyn std::error::Error + Send + Sync + 'static>, },
    TlsConfig(tonic::transport::Error),
    Connect { address: String, error: tonic::transport::Error, },
    ConnectTimeout { address: String, timeout: Duration, },
    Call { method: &'static str, status: tonic::Status, },
    CallTimeout { method: &'static str, },
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use InternalBootstrapError::*;

        match &self.internal {
            ReadFile { what, file, .. } => write!(f, "could not read {} {}", what, file.display()),
            ParseCert { file, .. } => write!(f, "failed to parse certificate {}", file.display()),
            NoCertificates { file } => write!(f, "no certificates found in {}", file.display()),
            InvalidCert { file, .. } => write!(f, "invalid X.509 certificate in {}", file.display()),
            ParseMacaroon { file, .. } => write!(f, "could not read macaroon bytes from {}", file.display()),
            InvalidCallCredential(_) => write!(f, "credential can not be sent as request metadata"),
            InvalidAddress { address, .. } => write!(f, "invalid address {}", address),
            TlsConfig(_) => write!(f, "failed to configure TLS"),
            Connect { address, .. } => write!(f, "could not dial to LND at {}", address),
            ConnectTimeout { address, timeout } => write!(f, "could not dial to LND at {} within {:?}", address, timeout),
            Call { method, .. } => write!(f, "{} call failed", method),
            CallTimeout { method } => write!(f, "{} call did not complete before the deadline", method),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use InternalBootstrapError::*;

        match &self.internal {
            ReadFile { error, .. } => Some(error),
            ParseCert { error, .. } => Some(error),
            InvalidCert { error, .. } => Some(error),
            ParseMacaroon { error, .. } => Some(error),
            InvalidCallCredential(error) => Some(&**error),
            InvalidAddress { error, .. } => Some(&**error),
            TlsConfig(error) => Some(error),
            Connect { error, .. } => Some(error),
            Call { status, .. } => Some(status),
            NoCertificates { .. } | ConnectTimeout { .. } | CallTimeout { .. } => None,
        }
    }
}
