// src/cert/inspect.rs
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not a PEM certificate: {0}")]
    Pem(String),
    #[error("not an X.509 certificate: {0}")]
    X509(String),
    #[error("expiry {0} is out of range")]
    Expiry(i64),
}

/// The parts of a client certificate worth showing next to an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub not_after: DateTime<Utc>,
}

impl std::fmt::Display for CertSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, expires {}",
            self.subject,
            self.not_after.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Decodes kubeconfig `client-certificate-data` (base64 of a PEM or DER
/// certificate) far enough to read its subject and expiry.
pub fn summarize_certificate_data(data: &str) -> Result<CertSummary, InspectError> {
    let raw = STANDARD.decode(data.trim())?;

    let der = if raw.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(&raw)
            .map_err(|e| InspectError::Pem(e.to_string()))?;
        pem.contents
    } else {
        raw
    };

    let (_, cert) =
        X509Certificate::from_der(&der).map_err(|e| InspectError::X509(e.to_string()))?;
    let timestamp = cert.validity().not_after.timestamp();
    let not_after = DateTime::from_timestamp(timestamp, 0).ok_or(InspectError::Expiry(timestamp))?;

    Ok(CertSummary {
        subject: cert.subject().to_string(),
        not_after,
    })
}
