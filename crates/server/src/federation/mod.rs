//! Federation collaborators used by the report generator.
//! Modules:
//! - dns: SRV + A/AAAA discovery of a server's endpoints
//! - network: TLS dial with custom SNI and a plain HTTP/1.1 fetch
//! - keys: key document probe and ed25519 / fingerprint verification
//! - certificate: X509 summaries and fingerprints
//! - cipher: fixed name tables for TLS versions and cipher suites

pub mod certificate;
pub mod cipher;
pub mod dns;
pub mod keys;
pub mod network;

pub use dns::{DnsDiscoverer, absolutize_srv_target};

pub use network::{FullResponse, TlsSession, fetch_url_custom_sni_host};

pub use certificate::{sha256_fingerprint, summarize_certificate};

pub use cipher::summarize_cipher;

pub use keys::{DirectKeyFetcher, Ed25519KeyVerifier, canonical_json};
