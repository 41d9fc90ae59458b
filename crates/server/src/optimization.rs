//! Process-wide TLS state shared by every probe.
//!
//! Root store and webpki verifier are built once instead of per connection.

use once_cell::sync::{Lazy, OnceCell};
use rustls::RootCertStore;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use std::sync::Arc;

static CRYPTO_PROVIDER: Lazy<Arc<CryptoProvider>> =
    Lazy::new(|| Arc::new(rustls::crypto::ring::default_provider()));

static ROOT_STORE: Lazy<Arc<RootCertStore>> = Lazy::new(|| {
    let mut root_cert_store = RootCertStore::empty();
    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(root_cert_store)
});

static WEBPKI_VERIFIER: OnceCell<Arc<WebPkiServerVerifier>> = OnceCell::new();

pub fn shared_crypto_provider() -> Arc<CryptoProvider> {
    CRYPTO_PROVIDER.clone()
}

/// The webpki verifier used to judge served chains against the public roots.
pub fn shared_webpki_verifier()
-> Result<Arc<WebPkiServerVerifier>, rustls::client::VerifierBuilderError> {
    WEBPKI_VERIFIER
        .get_or_try_init(|| {
            WebPkiServerVerifier::builder_with_provider(
                ROOT_STORE.clone(),
                shared_crypto_provider(),
            )
            .build()
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_verifier_is_reused() {
        let first = shared_webpki_verifier().unwrap();
        let second = shared_webpki_verifier().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_root_store_is_populated() {
        assert!(!ROOT_STORE.is_empty());
    }
}
