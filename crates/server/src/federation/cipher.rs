//! Names for negotiated TLS parameters.
//!
//! The tables are fixed and built once. Codes missing from them render as
//! `UNKNOWN[0x..]` so new protocol parameters stay visible in reports.

use crate::response::CipherSummary;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static TLS_VERSIONS: Lazy<BTreeMap<u16, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (0x0300, "SSL 3.0"),
        (0x0301, "TLS 1.0"),
        (0x0302, "TLS 1.1"),
        (0x0303, "TLS 1.2"),
        (0x0304, "TLS 1.3"),
    ])
});

static TLS_CIPHER_SUITES: Lazy<BTreeMap<u16, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (0x0005, "TLS_RSA_WITH_RC4_128_SHA"),
        (0x000a, "TLS_RSA_WITH_3DES_EDE_CBC_SHA"),
        (0x002f, "TLS_RSA_WITH_AES_128_CBC_SHA"),
        (0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA"),
        (0x009c, "TLS_RSA_WITH_AES_128_GCM_SHA256"),
        (0x009d, "TLS_RSA_WITH_AES_256_GCM_SHA384"),
        (0xc007, "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA"),
        (0xc009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA"),
        (0xc00a, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA"),
        (0xc011, "TLS_ECDHE_RSA_WITH_RC4_128_SHA"),
        (0xc012, "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA"),
        (0xc013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA"),
        (0xc014, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA"),
        (0xc02b, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"),
        (0xc02c, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"),
        (0xc02f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
        (0xc030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"),
        (0xcca8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"),
        (0xcca9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256"),
        (0x1301, "TLS_AES_128_GCM_SHA256"),
        (0x1302, "TLS_AES_256_GCM_SHA384"),
        (0x1303, "TLS_CHACHA20_POLY1305_SHA256"),
    ])
});

fn enum_to_string(names: &BTreeMap<u16, &'static str>, value: u16) -> String {
    match names.get(&value) {
        Some(name) => (*name).to_string(),
        None => format!("UNKNOWN[0x{value:x}]"),
    }
}

pub fn version_name(version: u16) -> String {
    enum_to_string(&TLS_VERSIONS, version)
}

pub fn cipher_suite_name(cipher_suite: u16) -> String {
    enum_to_string(&TLS_CIPHER_SUITES, cipher_suite)
}

pub fn summarize_cipher(version: u16, cipher_suite: u16) -> CipherSummary {
    CipherSummary {
        version: version_name(version),
        cipher_suite: cipher_suite_name(cipher_suite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(
            summarize_cipher(0x0303, 0x002f),
            CipherSummary {
                version: "TLS 1.2".into(),
                cipher_suite: "TLS_RSA_WITH_AES_128_CBC_SHA".into(),
            }
        );
        assert_eq!(cipher_suite_name(0x1301), "TLS_AES_128_GCM_SHA256");
    }

    #[test]
    fn unknown_codes_render_placeholder() {
        assert_eq!(version_name(0x7f1c), "UNKNOWN[0x7f1c]");
        assert_eq!(cipher_suite_name(0x0000), "UNKNOWN[0x0]");
        assert_eq!(cipher_suite_name(0xffff), "UNKNOWN[0xffff]");
    }
}
