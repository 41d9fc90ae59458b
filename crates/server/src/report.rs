//! Report assembly: discovery, per-endpoint probing and verification merged
//! into one [`ServerReport`].

use crate::error::{DiscoveryError, FetchError, ReportGenerationError};
use crate::federation::certificate::summarize_certificate;
use crate::federation::cipher::summarize_cipher;
use crate::federation::network::TlsSession;
use crate::response::{
    ConnectionReport, DiscoveryResult, Failure, KeyChecks, KeyDocument, ServerReport,
};
use futures::StreamExt;
use futures::stream;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use time::OffsetDateTime;
use tokio::time::{Duration, timeout};
use tracing::{info, warn};

/// Turns a server name into endpoints.
pub trait Discover: Send + Sync {
    fn discover(
        &self,
        server_name: &str,
    ) -> impl Future<Output = Result<DiscoveryResult, DiscoveryError>> + Send;
}

/// What a successful probe brings back from one endpoint.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub key_document: KeyDocument,
    pub session: TlsSession,
}

/// Connects to one endpoint and fetches its key document.
pub trait Probe: Send + Sync {
    fn probe(
        &self,
        server_name: &str,
        addr: &str,
        sni: Option<&str>,
    ) -> impl Future<Output = Result<ProbeOutcome, FetchError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct KeyVerification {
    pub checks: KeyChecks,
    pub ed25519_verify_keys: Option<BTreeMap<String, String>>,
    pub sha256_tls_fingerprints: Option<Vec<String>>,
}

impl KeyVerification {
    /// Verified material is only reported next to a fully passing check set.
    pub fn into_trusted(mut self) -> Self {
        if !self.checks.all_checks_ok {
            self.ed25519_verify_keys = None;
            self.sha256_tls_fingerprints = None;
        }
        self
    }
}

/// Checks a key document against the connection it was served on.
pub trait VerifyKeys: Send + Sync {
    fn verify_keys(
        &self,
        server_name: &str,
        now: OffsetDateTime,
        key_document: &KeyDocument,
        session: &TlsSession,
    ) -> KeyVerification;
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Budget for one endpoint, covering connect, handshake and fetch.
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            max_concurrent_probes: 8,
        }
    }
}

pub struct ReportGenerator<D, P, V> {
    discoverer: D,
    prober: P,
    verifier: V,
    options: ReportOptions,
}

impl<D, P, V> ReportGenerator<D, P, V>
where
    D: Discover,
    P: Probe,
    V: VerifyKeys,
{
    pub fn new(discoverer: D, prober: P, verifier: V, options: ReportOptions) -> Self {
        Self {
            discoverer,
            prober,
            verifier,
            options,
        }
    }

    pub async fn build_report(
        &self,
        server_name: &str,
        sni: Option<&str>,
    ) -> Result<ServerReport, DiscoveryError> {
        self.build_report_at(server_name, sni, OffsetDateTime::now_utc())
            .await
    }

    /// Build a report using `now` for every time-dependent check.
    ///
    /// Only discovery can fail the whole report. Every resolved address ends
    /// up in exactly one of the two connection maps.
    #[tracing::instrument(
        name = "build_report",
        skip(self, now),
        fields(server_name = %server_name, sni = ?sni)
    )]
    pub async fn build_report_at(
        &self,
        server_name: &str,
        sni: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<ServerReport, DiscoveryError> {
        let discovery = self.discoverer.discover(server_name).await?;

        let addrs: Vec<String> = {
            let mut seen = HashSet::new();
            discovery
                .addrs
                .iter()
                .filter(|addr| seen.insert(addr.as_str()))
                .cloned()
                .collect()
        };

        let mut report = ServerReport {
            discovery,
            ..Default::default()
        };

        let probe_timeout = self.options.probe_timeout;
        let mut probes = stream::iter(addrs)
            .map(move |addr| async move {
                let result = timeout(probe_timeout, self.prober.probe(server_name, &addr, sni))
                    .await
                    .unwrap_or(Err(FetchError::Timeout(probe_timeout)));
                (addr, result)
            })
            .buffer_unordered(self.options.max_concurrent_probes.max(1));

        while let Some((addr, result)) = probes.next().await {
            match result {
                Ok(outcome) => {
                    let connection = self.connection_report(server_name, now, outcome);
                    report.connection_reports.insert(addr, connection);
                }
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Endpoint probe failed");
                    report.connection_errors.insert(addr, Failure::native(e));
                }
            }
        }

        info!(
            connected = report.connection_reports.len(),
            failed = report.connection_errors.len(),
            "Report assembled"
        );
        Ok(report)
    }

    fn connection_report(
        &self,
        server_name: &str,
        now: OffsetDateTime,
        outcome: ProbeOutcome,
    ) -> ConnectionReport {
        let ProbeOutcome {
            key_document,
            session,
        } = outcome;

        let certificates = session
            .peer_certificates
            .iter()
            .map(summarize_certificate)
            .collect();
        let cipher = summarize_cipher(session.version, session.cipher_suite);
        let verification = self
            .verifier
            .verify_keys(server_name, now, &key_document, &session)
            .into_trusted();

        ConnectionReport {
            certificates,
            cipher,
            keys: key_document.raw,
            checks: verification.checks,
            ed25519_verify_keys: verification.ed25519_verify_keys,
            sha256_tls_fingerprints: verification.sha256_tls_fingerprints,
        }
    }

    /// The normalized report rendered as indented JSON.
    pub async fn json_report(
        &self,
        server_name: &str,
        sni: Option<&str>,
    ) -> Result<Vec<u8>, ReportGenerationError> {
        let mut report = self.build_report(server_name, sni).await?;
        report.normalize_failures();
        Ok(report.render()?)
    }
}
