//! Report data model, failure normalization and JSON rendering.

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The full report for one server name.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerReport {
    #[serde(rename = "DNSResult")]
    pub discovery: DiscoveryResult,
    /// One entry per endpoint that accepted a connection.
    pub connection_reports: BTreeMap<String, ConnectionReport>,
    /// One entry per endpoint we could not connect to.
    pub connection_errors: BTreeMap<String, Failure>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryResult {
    #[serde(rename = "SRVSkipped")]
    pub srv_skipped: bool,
    #[serde(rename = "SRVCName", default, skip_serializing_if = "Option::is_none")]
    pub srv_cname: Option<String>,
    #[serde(rename = "SRVRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub srv_records: Vec<SrvRecord>,
    #[serde(rename = "SRVError", default, skip_serializing_if = "Option::is_none")]
    pub srv_error: Option<Failure>,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostResult>,
    #[serde(default)]
    pub addrs: Vec<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostResult {
    #[serde(rename = "CName", default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionReport {
    #[serde(default)]
    pub certificates: Vec<X509CertSummary>,
    pub cipher: CipherSummary,
    /// The key document exactly as served.
    pub keys: Box<RawValue>,
    pub checks: KeyChecks,
    #[serde(
        rename = "Ed25519VerifyKeys",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ed25519_verify_keys: Option<BTreeMap<String, String>>,
    #[serde(
        rename = "SHA256TLSFingerprints",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sha256_tls_fingerprints: Option<Vec<String>>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct X509CertSummary {
    pub subject_common_name: String,
    pub issuer_common_name: String,
    #[serde(rename = "SHA256Fingerprint", with = "base64_fingerprint")]
    pub sha256_fingerprint: [u8; 32],
    #[serde(rename = "DNSNames", default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CipherSummary {
    pub version: String,
    pub cipher_suite: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyChecks {
    #[serde(rename = "AllChecksOK")]
    pub all_checks_ok: bool,
    pub matching_server_name: bool,
    #[serde(rename = "FutureValidUntilTS")]
    pub future_valid_until_ts: bool,
    #[serde(rename = "HasEd25519Key")]
    pub has_ed25519_key: bool,
    #[serde(rename = "AllEd25519ChecksOK")]
    pub all_ed25519_checks_ok: bool,
    #[serde(rename = "Ed25519Checks", default)]
    pub ed25519_checks: BTreeMap<String, Ed25519Check>,
    pub valid_certificates: bool,
    #[serde(rename = "HasTLSFingerprint")]
    pub has_tls_fingerprint: bool,
    #[serde(rename = "AllTLSFingerprintChecksOK")]
    pub all_tls_fingerprint_checks_ok: bool,
    #[serde(
        rename = "TLSFingerprintChecks",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tls_fingerprint_checks: Vec<TlsFingerprintCheck>,
    #[serde(rename = "MatchingTLSFingerprint")]
    pub matching_tls_fingerprint: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ed25519Check {
    pub valid_ed25519: bool,
    pub matching_signature: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsFingerprintCheck {
    #[serde(rename = "ValidSHA256")]
    pub valid_sha256: bool,
}

/// Typed view of `/_matrix/key/v2/server`.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct Keys {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub valid_until_ts: i64,
    #[serde(default)]
    pub verify_keys: BTreeMap<String, VerifyKey>,
    #[serde(default)]
    pub old_verify_keys: BTreeMap<String, OldVerifyKey>,
    #[serde(default)]
    pub signatures: BTreeMap<String, BTreeMap<String, String>>,
    /// Only published by legacy servers.
    #[serde(default)]
    pub tls_fingerprints: Vec<TlsFingerprint>,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct VerifyKey {
    pub key: String,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct OldVerifyKey {
    pub key: String,
    #[serde(default)]
    pub expired_ts: Option<i64>,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct TlsFingerprint {
    #[serde(default)]
    pub sha256: String,
}

/// A key document as fetched: the untouched JSON plus its typed parse.
#[derive(Debug, Clone)]
pub struct KeyDocument {
    pub raw: Box<RawValue>,
    pub keys: Keys,
}

impl KeyDocument {
    pub fn from_raw(raw: Box<RawValue>) -> Result<Self, serde_json::Error> {
        let keys = serde_json::from_str(raw.get())?;
        Ok(KeyDocument { raw, keys })
    }
}

/// A failure reduced to its message, safe to serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ReportError {
    #[serde(rename = "Message")]
    pub message: String,
}

/// A failure embedded in a report.
///
/// Native failures keep the original error value and refuse to serialize;
/// [`ServerReport::normalize_failures`] turns every one of them into a
/// [`ReportError`] before rendering.
#[derive(Debug, Clone)]
pub enum Failure {
    Native(Arc<dyn std::error::Error + Send + Sync>),
    Report(ReportError),
}

impl Failure {
    pub fn native<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Failure::Native(Arc::new(err))
    }

    pub fn message(&self) -> String {
        match self {
            Failure::Native(e) => e.to_string(),
            Failure::Report(e) => e.message.clone(),
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, Failure::Report(_))
    }

    pub fn normalize(&mut self) {
        if let Failure::Native(e) = self {
            *self = Failure::Report(ReportError {
                message: e.to_string(),
            });
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Failure::Report(a), Failure::Report(b)) => a == b,
            (Failure::Native(a), Failure::Native(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Failure::Report(e) => e.serialize(serializer),
            Failure::Native(e) => Err(S::Error::custom(format!(
                "failure was not normalized before serialization: {e}"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Failure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ReportError::deserialize(deserializer).map(Failure::Report)
    }
}

impl ServerReport {
    /// Rewrites every embedded failure into its message-only form.
    ///
    /// Absent failures stay absent and already normalized failures are left
    /// untouched, so running this twice is the same as running it once.
    pub fn normalize_failures(&mut self) {
        if let Some(err) = self.discovery.srv_error.as_mut() {
            err.normalize();
        }
        for host in self.discovery.hosts.values_mut() {
            if let Some(err) = host.error.as_mut() {
                err.normalize();
            }
        }
        for err in self.connection_errors.values_mut() {
            err.normalize();
        }
    }

    /// Indented JSON. The key documents are embedded verbatim.
    pub fn render(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

mod base64_fingerprint {
    use base64::Engine;
    use base64::prelude::BASE64_STANDARD_NO_PAD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = BASE64_STANDARD_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(D::Error::custom)?;
        decoded
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::invalid_length(v.len(), &"32 bytes"))
    }
}
