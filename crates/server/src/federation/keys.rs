use crate::error::FetchError;
use crate::federation::certificate::sha256_fingerprint;
use crate::federation::network::{TlsSession, fetch_url_custom_sni_host};
use crate::report::{KeyVerification, Probe, ProbeOutcome, VerifyKeys};
use crate::response::{Ed25519Check, KeyChecks, KeyDocument, TlsFingerprintCheck};
use crate::security::KeyDocumentLimits;
use base64::Engine;
use base64::prelude::BASE64_STANDARD_NO_PAD;
use ed25519::Signature;
use ed25519::signature::Verifier;
use ed25519_dalek::VerifyingKey;
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::time::Duration;
use tracing::{debug, warn};

pub const KEY_PATH: &str = "/_matrix/key/v2/server";

/// Fetches the key document straight from one endpoint.
#[derive(Debug, Clone)]
pub struct DirectKeyFetcher {
    pub connect_timeout: Duration,
    pub limits: KeyDocumentLimits,
}

impl DirectKeyFetcher {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            limits: KeyDocumentLimits::default(),
        }
    }
}

impl Probe for DirectKeyFetcher {
    #[tracing::instrument(
        name = "federation_fetch_keys",
        skip(self),
        fields(addr = %addr, server_name = %server_name, sni = ?sni)
    )]
    async fn probe(
        &self,
        server_name: &str,
        addr: &str,
        sni: Option<&str>,
    ) -> Result<ProbeOutcome, FetchError> {
        let sni = sni.filter(|s| !s.is_empty()).unwrap_or(server_name);
        let response = fetch_url_custom_sni_host(
            KEY_PATH,
            addr,
            server_name,
            sni,
            self.connect_timeout,
            self.limits.max_size(),
        )
        .await?;

        let key_document = self
            .limits
            .parse(&response.body)
            .map_err(|e| FetchError::Json(e.to_string()))?;
        debug!(
            key_count = key_document.keys.verify_keys.len(),
            "Fetched key document"
        );

        Ok(ProbeOutcome {
            key_document,
            session: response.session,
        })
    }
}

/// Checks ed25519 self-signatures, expiry, server name and certificate
/// pinning of a key document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519KeyVerifier;

impl VerifyKeys for Ed25519KeyVerifier {
    fn verify_keys(
        &self,
        server_name: &str,
        now: OffsetDateTime,
        key_document: &KeyDocument,
        session: &TlsSession,
    ) -> KeyVerification {
        let keys = &key_document.keys;
        let mut checks = KeyChecks {
            matching_server_name: keys.server_name == server_name,
            future_valid_until_ts: i128::from(keys.valid_until_ts) > unix_millis(now),
            valid_certificates: !session.peer_certificates.is_empty()
                && session.certificate_error.is_none(),
            ..Default::default()
        };

        let (ed25519_checks, ed25519_verify_keys) =
            check_verify_keys(server_name, key_document);
        checks.has_ed25519_key = !ed25519_checks.is_empty();
        checks.all_ed25519_checks_ok = ed25519_checks.values().all(|c| c.matching_signature);
        checks.ed25519_checks = ed25519_checks;

        let served: Vec<[u8; 32]> = session
            .peer_certificates
            .iter()
            .map(|cert| sha256_fingerprint(cert))
            .collect();
        let mut matching_fingerprints = Vec::new();
        for published in &keys.tls_fingerprints {
            let decoded = decode_base64(&published.sha256).filter(|d| d.len() == 32);
            checks.tls_fingerprint_checks.push(TlsFingerprintCheck {
                valid_sha256: decoded.is_some(),
            });
            if let Some(decoded) = decoded
                && served.iter().any(|fp| fp[..] == decoded[..])
            {
                matching_fingerprints.push(BASE64_STANDARD_NO_PAD.encode(&decoded));
            }
        }
        checks.has_tls_fingerprint = !keys.tls_fingerprints.is_empty();
        checks.all_tls_fingerprint_checks_ok =
            checks.tls_fingerprint_checks.iter().all(|c| c.valid_sha256);
        checks.matching_tls_fingerprint = !matching_fingerprints.is_empty();

        let fingerprints_ok = !checks.has_tls_fingerprint
            || (checks.all_tls_fingerprint_checks_ok && checks.matching_tls_fingerprint);
        checks.all_checks_ok = checks.matching_server_name
            && checks.future_valid_until_ts
            && checks.has_ed25519_key
            && checks.all_ed25519_checks_ok
            && checks.valid_certificates
            && fingerprints_ok;

        if let Some(e) = &session.certificate_error {
            debug!(error = %e, "Served certificate chain did not validate");
        }

        KeyVerification {
            checks,
            ed25519_verify_keys: Some(ed25519_verify_keys),
            sha256_tls_fingerprints: Some(matching_fingerprints),
        }
        .into_trusted()
    }
}

fn unix_millis(now: OffsetDateTime) -> i128 {
    now.unix_timestamp_nanos() / 1_000_000
}

fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    BASE64_STANDARD_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .ok()
}

/// Matrix canonical JSON: sorted keys, no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), sorted(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// The bytes a server signs: the document minus `signatures` and `unsigned`.
fn signed_bytes(raw: &str) -> Option<String> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object_mut()?;
    object.remove("signatures");
    object.remove("unsigned");
    Some(canonical_json(&value))
}

fn check_verify_keys(
    server_name: &str,
    key_document: &KeyDocument,
) -> (BTreeMap<String, Ed25519Check>, BTreeMap<String, String>) {
    let keys = &key_document.keys;
    let signed = signed_bytes(key_document.raw.get());
    let server_signatures = keys.signatures.get(server_name);

    let mut ed25519_checks = BTreeMap::new();
    let mut ed25519_verify_keys = BTreeMap::new();

    for (key_id, key_data) in &keys.verify_keys {
        let algorithm = key_id.split(':').next().unwrap_or_default();
        if algorithm != "ed25519" {
            debug!(key_id = %key_id, "Skipping non-ed25519 key");
            continue;
        }

        let verifying_key = decode_base64(&key_data.key)
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok());
        let signature = server_signatures
            .and_then(|sigs| sigs.get(key_id))
            .and_then(|sig| decode_base64(sig))
            .and_then(|bytes| Signature::from_slice(&bytes).ok());

        let matching_signature = match (&verifying_key, &signature, &signed) {
            (Some(verifying_key), Some(signature), Some(signed)) => {
                verifying_key.verify(signed.as_bytes(), signature).is_ok()
            }
            _ => false,
        };
        if !matching_signature {
            warn!(key_id = %key_id, "Key document signature did not verify");
        }

        ed25519_checks.insert(
            key_id.clone(),
            Ed25519Check {
                valid_ed25519: verifying_key.is_some(),
                matching_signature,
            },
        );
        if matching_signature {
            ed25519_verify_keys.insert(key_id.clone(), key_data.key.clone());
        }
    }

    (ed25519_checks, ed25519_verify_keys)
}
