use crate::error::FetchError;
use crate::optimization::{shared_crypto_provider, shared_webpki_verifier};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper::Request;
use hyper_util::rt::TokioIo;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// What was negotiated on one TLS connection.
#[derive(Debug, Clone, Default)]
pub struct TlsSession {
    pub version: u16,
    pub cipher_suite: u16,
    /// As served, leaf first.
    pub peer_certificates: Vec<CertificateDer<'static>>,
    /// Why the served chain failed validation against the public roots.
    pub certificate_error: Option<String>,
}

#[derive(Debug)]
pub struct FullResponse {
    pub session: TlsSession,
    pub body: Bytes,
}

/// Accepts any chain but remembers whether webpki would have.
#[derive(Debug)]
struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    outcome: Mutex<Option<String>>,
}

impl RecordingVerifier {
    fn certificate_error(&self) -> Option<String> {
        self.outcome.lock().ok().and_then(|outcome| outcome.clone())
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if let Err(e) =
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            && let Ok(mut outcome) = self.outcome.lock()
        {
            *outcome = Some(e.to_string());
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Aborts the HTTP connection driver when the fetch is dropped, so the socket
/// closes on timeout as well as on completion.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn host_part(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    name.split(':').next().unwrap_or(name)
}

/// Dial `addr`, handshake with `sni`, and GET `path` with `Host: host`.
#[tracing::instrument(name = "fetch_url_custom_sni_host", level = "debug", skip(path, max_body))]
pub async fn fetch_url_custom_sni_host(
    path: &str,
    addr: &str,
    host: &str,
    sni: &str,
    connect_timeout: Duration,
    max_body: usize,
) -> Result<FullResponse, FetchError> {
    let sni_host = host_part(sni);
    debug!("Fetching {path} from {addr} with SNI {sni_host} and host {host}");

    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FetchError::Timeout(connect_timeout))?
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let inner = shared_webpki_verifier().map_err(|e| FetchError::Tls(e.to_string()))?;
    let verifier = Arc::new(RecordingVerifier {
        inner,
        outcome: Mutex::new(None),
    });
    let config = ClientConfig::builder_with_provider(shared_crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone())
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let domain = ServerName::try_from(sni_host.to_string())
        .map_err(|_| FetchError::InvalidDomain(sni_host.to_string()))?;

    let tls_stream = connector
        .connect(domain, stream)
        .await
        .map_err(|e| FetchError::Tls(e.to_string()))?;

    let (_io, connection_info) = tls_stream.get_ref();
    let session = TlsSession {
        version: connection_info
            .protocol_version()
            .map(u16::from)
            .unwrap_or_default(),
        cipher_suite: connection_info
            .negotiated_cipher_suite()
            .map(|c| u16::from(c.suite()))
            .unwrap_or_default(),
        peer_certificates: connection_info
            .peer_certificates()
            .map(|certs| certs.to_vec())
            .unwrap_or_default(),
        certificate_error: verifier.certificate_error(),
    };

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls_stream))
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    let _guard = ConnectionGuard(tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            debug!("Connection closed with error: {err}");
        }
    }));

    let req = Request::builder()
        .uri(path)
        .header(hyper::header::USER_AGENT, "matrix-federation-report/0.1")
        .header(hyper::header::HOST, host)
        .body(Empty::<Bytes>::new())
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let res = sender
        .send_request(req)
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    if !res.status().is_success() {
        return Err(FetchError::Http {
            status: res.status(),
            context: path.to_string(),
        });
    }

    let body = Limited::new(res.into_body(), max_body)
        .collect()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?
        .to_bytes();

    Ok(FullResponse { session, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_part_strips_port_and_brackets() {
        assert_eq!(host_part("example.org"), "example.org");
        assert_eq!(host_part("example.org:8448"), "example.org");
        assert_eq!(host_part("[2001:db8::1]:8448"), "2001:db8::1");
        assert_eq!(host_part("[::1]"), "::1");
    }
}
