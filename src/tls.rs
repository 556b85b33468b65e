use std::path::Path;
use std::sync::Arc;
use rustls::{RootCertStore, Certificate, TLSError, ServerCertVerified};
use webpki::DNSNameRef;
use crate::diagnostics::Diagnostics;
use crate::error::InternalBootstrapError;

pub(crate) fn config(verifier: CertVerifier) -> tonic::transport::ClientTlsConfig {
    let mut tls_config = rustls::ClientConfig::new();
    tls_config.dangerous().set_certificate_verifier(Arc::new(verifier));
    tls_config.set_protocols(&["h2".into()]);
    tonic::transport::ClientTlsConfig::new()
        .rustls_client_config(tls_config)
}

/// Accepts exactly the certificate chain read from the node's `tls.cert`
///
/// LND serves a self-signed certificate, so instead of building a path to a root the
/// presented chain is compared byte for byte with the pinned one.
pub(crate) struct CertVerifier {
    certs: Vec<Vec<u8>>,
    verbose: bool,
}

impl CertVerifier {
    pub(crate) async fn load(path: &Path, diagnostics: Diagnostics) -> Result<Self, InternalBootstrapError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|error| InternalBootstrapError::ReadFile { what: "TLS cert", file: path.to_owned(), error })?;
        CertVerifier::parse(&contents, path, diagnostics)
    }

    fn parse(cert_bytes: &[u8], path: &Path, diagnostics: Diagnostics) -> Result<Self, InternalBootstrapError> {
        let mut reader = cert_bytes;
        let certs = rustls_pemfile::certs(&mut reader)
            .map_err(|error| InternalBootstrapError::ParseCert { file: path.to_owned(), error })?;

        if certs.is_empty() {
            return Err(InternalBootstrapError::NoCertificates { file: path.to_owned() });
        }

        for cert in &certs {
            webpki::EndEntityCert::from(cert)
                .map_err(|error| InternalBootstrapError::InvalidCert { file: path.to_owned(), error })?;
        }

        if diagnostics.transport() {
            tracing::debug!(
                count = certs.len(),
                der_lengths = ?certs.iter().map(Vec::len).collect::<Vec<_>>(),
                "Certificates loaded"
            );
        }

        Ok(CertVerifier {
            certs,
            verbose: diagnostics.transport(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.certs.len()
    }
}

impl rustls::ServerCertVerifier for CertVerifier {
    fn verify_server_cert(&self, _roots: &RootCertStore, presented_certs: &[Certificate], _dns_name: DNSNameRef<'_>, _ocsp_response: &[u8]) -> Result<ServerCertVerified, TLSError> {
        if self.certs.len() != presented_certs.len() {
            return Err(TLSError::General(format!("Mismatched number of certificates (Expected: {}, Presented: {})", self.certs.len(), presented_certs.len())));
        }

        for (c, p) in self.certs.iter().zip(presented_certs.iter()) {
            if p.0 != *c {
                return Err(TLSError::General("Server certificates do not match ours".to_owned()));
            } else if self.verbose {
                tracing::trace!("Confirmed certificate match");
            }
        }

        Ok(ServerCertVerified::assertion())
    }
}
