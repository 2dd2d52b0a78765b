//! Bootstrap credentials
//!
//! The control instance is reached through a CA certificate and key. Either
//! both come from configuration or a fresh self-signed CA is generated for the
//! environment. The pair is handed to a [`CredentialWriter`] once bootstrap
//! has provisioned the control instance.

use chrono::{Datelike, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, date_time_ymd,
};
use std::fmt;
use thiserror::Error;

/// CA validity for generated certificates, in years
const CA_VALIDITY_YEARS: i32 = 10;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("ca-cert and ca-key must be configured together")]
    Incomplete,

    #[error("cannot generate CA certificate: {0}")]
    Generate(#[from] rcgen::Error),
}

/// Sink for the credentials of a freshly bootstrapped environment
pub trait CredentialWriter: Send + Sync {
    fn write(&self, name: &str, cert: &[u8], key: &[u8]) -> anyhow::Result<()>;
}

impl<F> CredentialWriter for F
where
    F: Fn(&str, &[u8], &[u8]) -> anyhow::Result<()> + Send + Sync,
{
    fn write(&self, name: &str, cert: &[u8], key: &[u8]) -> anyhow::Result<()> {
        self(name, cert, key)
    }
}

/// CA certificate and private key, PEM encoded
#[derive(Clone)]
pub struct CaBundle {
    pub cert_pem: String,
    pub key_pem: String,
}

impl CaBundle {
    /// Use the configured pair, or generate one when neither is set
    pub fn from_config(
        environment: &str,
        cert_pem: Option<&str>,
        key_pem: Option<&str>,
    ) -> Result<Self, CredentialError> {
        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Self {
                cert_pem: cert.to_string(),
                key_pem: key.to_string(),
            }),
            (None, None) => Self::generate(environment),
            _ => Err(CredentialError::Incomplete),
        }
    }

    /// Generate a self-signed CA named after the environment
    pub fn generate(environment: &str) -> Result<Self, CredentialError> {
        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, format!("cirrus-generated CA for environment {}", environment));
        params.distinguished_name.push(DnType::OrganizationName, "cirrus");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        // Day granularity; the first of the month avoids leap-day arithmetic.
        let today = Utc::now().date_naive();
        params.not_before = date_time_ymd(today.year(), today.month() as u8, 1);
        params.not_after = date_time_ymd(today.year() + CA_VALIDITY_YEARS, today.month() as u8, 1);

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        tracing::debug!(environment, "generated CA certificate");
        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    /// Hand the pair to `writer` under the environment's name
    pub fn write_to(&self, environment: &str, writer: &dyn CredentialWriter) -> anyhow::Result<()> {
        writer.write(environment, self.cert_pem.as_bytes(), self.key_pem.as_bytes())
    }
}

impl fmt::Debug for CaBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaBundle")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}
