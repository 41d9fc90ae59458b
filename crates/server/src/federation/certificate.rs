use crate::response::X509CertSummary;
use rustls_pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

/// SHA-256 over the DER encoding. This is the value key documents pin.
pub fn sha256_fingerprint(cert_der: &[u8]) -> [u8; 32] {
    Sha256::digest(cert_der).into()
}

/// Summarize one served certificate.
///
/// A certificate x509-parser cannot read still gets a summary carrying its
/// fingerprint, so the chain length in the report matches what was served.
pub fn summarize_certificate(cert_der: &CertificateDer<'_>) -> X509CertSummary {
    let cert_bytes = cert_der.as_ref();
    let mut summary = X509CertSummary {
        sha256_fingerprint: sha256_fingerprint(cert_bytes),
        ..Default::default()
    };

    let Ok((_, x509_cert)) = X509Certificate::from_der(cert_bytes) else {
        tracing::debug!("served certificate could not be parsed as X.509");
        return summary;
    };

    summary.subject_common_name = common_name(x509_cert.subject());
    summary.issuer_common_name = common_name(x509_cert.issuer());

    if let Ok(Some(san)) = x509_cert.subject_alternative_name() {
        summary.dns_names = san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns_name) => Some(dns_name.to_string()),
                _ => None,
            })
            .collect();
    }

    summary
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string()
}
