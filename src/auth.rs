//! Per-call authorization
//!
//! Any credential that can be rendered as an ASCII request header can authorize calls; the
//! macaroon is just the one LND uses.

use std::fmt;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use crate::macaroon::Macaroon;

/// Credential attached to every outbound call as request metadata.
pub trait CallCredential {
    fn metadata_key(&self) -> &str;

    fn metadata_value(&self) -> String;
}

impl CallCredential for Macaroon {
    fn metadata_key(&self) -> &str {
        "macaroon"
    }

    fn metadata_value(&self) -> String {
        self.to_hex()
    }
}

/// Supplies requests with a credential
///
/// The header is validated once, when the interceptor is created, so attaching it can not fail.
#[derive(Clone)]
pub struct AuthInterceptor {
    key: AsciiMetadataKey,
    value: AsciiMetadataValue,
}

impl AuthInterceptor {
    pub fn new<C: CallCredential + ?Sized>(credential: &C) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let key = AsciiMetadataKey::from_bytes(credential.metadata_key().as_bytes())?;
        let mut value = AsciiMetadataValue::from_str(&credential.metadata_value())?;
        value.set_sensitive(true);
        Ok(AuthInterceptor { key, value })
    }
}

impl fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl tonic::service::Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        request
            .metadata_mut()
            .insert(self.key.clone(), self.value.clone());
        Ok(request)
    }
}
