//! Certificate vault: key-pair container parsing and certificate selection.
//!
//! Containers are password-protected PKCS#12 bundles. Parsing extracts the
//! subject, issuer, serial, and validity window; selection picks the valid
//! certificate closest to retirement so expiring certificates get used
//! first.

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::prelude::*;

use domain::models::Certificate;

/// Errors raised while reading a key-pair container.
///
/// Non-fatal at upload time (the record is still created with empty validity
/// fields); fatal at sign time.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Container unreadable: {0}")]
    Container(String),

    #[error("Container password rejected")]
    WrongPassword,

    #[error("No certificate entry in container")]
    MissingCertificate,

    #[error("No private key entry in container")]
    MissingKey,

    #[error("Certificate unparseable: {0}")]
    Certificate(String),
}

/// Identity attributes extracted from a key-pair container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

/// Decrypted key material for one signing operation. Never persisted.
pub struct UnlockedKeyPair {
    /// PKCS#8 private key, DER.
    pub private_key_der: Vec<u8>,
    /// X.509 certificate, DER.
    pub certificate_der: Vec<u8>,
}

/// Parse a container and extract the certificate's identity attributes.
pub fn read_info(container: &[u8], password: &str) -> Result<KeyPairInfo, ParseError> {
    let pfx = p12::PFX::parse(container).map_err(|e| ParseError::Container(e.to_string()))?;
    if !pfx.verify_mac(password) {
        return Err(ParseError::WrongPassword);
    }

    let cert_bags = pfx
        .cert_x509_bags(password)
        .map_err(|e| ParseError::Container(e.to_string()))?;
    let cert_der = cert_bags.first().ok_or(ParseError::MissingCertificate)?;

    parse_certificate(cert_der)
}

/// Extract identity attributes from a DER certificate.
pub fn parse_certificate(cert_der: &[u8]) -> Result<KeyPairInfo, ParseError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| ParseError::Certificate(e.to_string()))?;

    let validity = cert.validity();
    let valid_from = DateTime::<Utc>::from_timestamp(validity.not_before.timestamp(), 0)
        .ok_or_else(|| ParseError::Certificate("notBefore out of range".to_string()))?;
    let valid_to = DateTime::<Utc>::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or_else(|| ParseError::Certificate("notAfter out of range".to_string()))?;

    Ok(KeyPairInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        valid_from,
        valid_to,
    })
}

/// Unlock a container for signing: decrypted private key plus certificate.
pub fn unlock(container: &[u8], password: &str) -> Result<UnlockedKeyPair, ParseError> {
    let pfx = p12::PFX::parse(container).map_err(|e| ParseError::Container(e.to_string()))?;
    if !pfx.verify_mac(password) {
        return Err(ParseError::WrongPassword);
    }

    let key_bags = pfx
        .key_bags(password)
        .map_err(|e| ParseError::Container(e.to_string()))?;
    let private_key_der = key_bags.into_iter().next().ok_or(ParseError::MissingKey)?;

    let cert_bags = pfx
        .cert_x509_bags(password)
        .map_err(|e| ParseError::Container(e.to_string()))?;
    let certificate_der = cert_bags
        .into_iter()
        .next()
        .ok_or(ParseError::MissingCertificate)?;

    Ok(UnlockedKeyPair {
        private_key_der,
        certificate_der,
    })
}

/// Pick the certificate to sign with: valid at `now`, soonest expiry first.
///
/// Candidates without a parsed validity window are never selected.
pub fn select_active(candidates: &[Certificate], now: DateTime<Utc>) -> Option<&Certificate> {
    candidates
        .iter()
        .filter(|c| c.is_valid_at(now))
        .min_by_key(|c| c.valid_to)
}
