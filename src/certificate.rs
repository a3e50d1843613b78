use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::pem::parse_x509_pem;

const PEM_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_FOOTER: &str = "-----END CERTIFICATE-----";

/// Facts about an issued certificate, for logs and CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Hex SHA-256 of the DER encoding.
    pub fingerprint: String,
}

/// Reads a certificate returned by the CA. Bare base64 bodies are accepted
/// as well as full PEM blocks.
pub fn inspect(certificate: &str) -> Result<CertificateSummary> {
    let pem = to_pem(certificate);
    let (_, pem_block) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| anyhow!("failed to parse certificate PEM: {e}"))?;
    let cert = pem_block.parse_x509().map_err(|e| anyhow!(e.to_string()))?;

    let not_before = Utc
        .timestamp_opt(cert.validity().not_before.timestamp(), 0)
        .single()
        .ok_or_else(|| anyhow!("certificate notBefore is out of range"))?;
    let not_after = Utc
        .timestamp_opt(cert.validity().not_after.timestamp(), 0)
        .single()
        .ok_or_else(|| anyhow!("certificate notAfter is out of range"))?;
    let fingerprint = {
        let mut hasher = Sha256::new();
        hasher.update(cert.as_raw());
        hex::encode(hasher.finalize())
    };

    Ok(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        not_before,
        not_after,
        fingerprint,
    })
}

/// Wraps a bare base64 body in PEM armour; PEM input is returned unchanged.
pub fn to_pem(certificate: &str) -> String {
    let trimmed = certificate.trim();
    if trimmed.starts_with("-----BEGIN") {
        return format!("{trimmed}\n");
    }
    let body: String = trimmed.split_whitespace().collect();
    let mut pem = String::with_capacity(body.len() + 64);
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem.push('\n');
    pem
}
