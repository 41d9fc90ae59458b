use base64::Engine;
use base64::prelude::BASE64_STANDARD_NO_PAD;
use federation_report::federation::cipher::{cipher_suite_name, version_name};
use federation_report::federation::{sha256_fingerprint, summarize_certificate, summarize_cipher};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rustls_pki_types::CertificateDer;

fn self_signed(names: &[&str], common_name: &str) -> CertificateDer<'static> {
    let mut params =
        CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
            .expect("params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate().expect("key generation");
    let cert = params.self_signed(&key_pair).expect("self-signed cert");
    CertificateDer::from(cert.der().to_vec())
}

#[test]
fn test_summarize_self_signed_certificate() {
    let der = self_signed(&["example.org", "alt.example.org"], "example.org");
    let summary = summarize_certificate(&der);

    assert_eq!(summary.subject_common_name, "example.org");
    // Issuer = subject for self-signed
    assert_eq!(summary.issuer_common_name, "example.org");
    assert_eq!(
        summary.dns_names,
        vec!["example.org".to_string(), "alt.example.org".to_string()]
    );
    assert_eq!(summary.sha256_fingerprint, sha256_fingerprint(der.as_ref()));
}

#[test]
fn test_fingerprint_serializes_as_unpadded_base64() {
    let der = self_signed(&["example.org"], "example.org");
    let summary = summarize_certificate(&der);

    let value = serde_json::to_value(&summary).unwrap();
    let rendered = value["SHA256Fingerprint"].as_str().unwrap();
    assert_eq!(rendered.len(), 43);
    assert!(!rendered.ends_with('='));
    assert_eq!(
        BASE64_STANDARD_NO_PAD.decode(rendered).unwrap(),
        summary.sha256_fingerprint.to_vec()
    );
    assert_eq!(value["DNSNames"][0], "example.org");
}

#[test]
fn test_certificate_without_common_name() {
    let mut params = CertificateParams::new(vec!["example.org".to_string()]).expect("params");
    params.distinguished_name = DistinguishedName::new();
    let key_pair = KeyPair::generate().expect("key generation");
    let cert = params.self_signed(&key_pair).expect("self-signed cert");
    let der = CertificateDer::from(cert.der().to_vec());

    let summary = summarize_certificate(&der);
    assert_eq!(summary.subject_common_name, "");
    assert_eq!(summary.dns_names, vec!["example.org".to_string()]);
}

#[test]
fn test_known_cipher_names() {
    let summary = summarize_cipher(0x0303, 0x002f);
    assert_eq!(summary.version, "TLS 1.2");
    assert_eq!(summary.cipher_suite, "TLS_RSA_WITH_AES_128_CBC_SHA");

    assert_eq!(version_name(0x0304), "TLS 1.3");
    assert_eq!(cipher_suite_name(0x1301), "TLS_AES_128_GCM_SHA256");
    assert_eq!(
        cipher_suite_name(0xc02f),
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
    );
}

#[test]
fn test_unknown_codes_are_placeholders() {
    let summary = summarize_cipher(0x7f1c, 0xfefe);
    assert_eq!(summary.version, "UNKNOWN[0x7f1c]");
    assert_eq!(summary.cipher_suite, "UNKNOWN[0xfefe]");
}
