use crate::error::DiscoveryError;
use crate::report::Discover;
use crate::response::{DiscoveryResult, Failure, HostResult, SrvRecord};
use crate::validation::server_name::parse_and_validate_server_name;
use hickory_resolver::lookup::Lookup;
use hickory_resolver::{Resolver, name_server::ConnectionProvider};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::{Duration, timeout};
use tracing::{debug, info};

pub const DEFAULT_FEDERATION_PORT: u16 = 8448;
const SRV_PREFIXES: [&str; 2] = ["_matrix-fed._tcp", "_matrix._tcp"];

pub fn absolutize_srv_target(target: &str, base: &str) -> String {
    if target.ends_with('.') {
        target.to_string()
    } else {
        format!("{}.{}.", target, base.trim_end_matches('.'))
    }
}

fn first_cname(lookup: &Lookup) -> Option<String> {
    lookup
        .record_iter()
        .find_map(|record| record.data().as_cname().map(|cname| cname.to_utf8()))
}

/// DNS based discovery: SRV first, then the bare name on port 8448.
pub struct DnsDiscoverer<P: ConnectionProvider> {
    resolver: Arc<Resolver<P>>,
    lookup_timeout: Duration,
}

impl<P: ConnectionProvider> Clone for DnsDiscoverer<P> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            lookup_timeout: self.lookup_timeout,
        }
    }
}

impl<P: ConnectionProvider> DnsDiscoverer<P> {
    pub fn new(resolver: Arc<Resolver<P>>, lookup_timeout: Duration) -> Self {
        Self {
            resolver,
            lookup_timeout,
        }
    }

    /// SRV targets for `host`. `Ok(None)` means no prefix had records.
    async fn lookup_srv(
        &self,
        host: &str,
    ) -> Result<Option<(Option<String>, Vec<SrvRecord>)>, Failure> {
        let mut last_error = None;
        for srv_prefix in SRV_PREFIXES {
            let name = format!("{srv_prefix}.{host}.");
            match timeout(self.lookup_timeout, self.resolver.srv_lookup(name.as_str())).await {
                Ok(Ok(srv)) if srv.iter().next().is_some() => {
                    let records = srv
                        .iter()
                        .map(|record| SrvRecord {
                            target: absolutize_srv_target(&record.target().to_utf8(), host),
                            port: record.port(),
                            priority: record.priority(),
                            weight: record.weight(),
                        })
                        .collect();
                    return Ok(Some((first_cname(srv.as_lookup()), records)));
                }
                Ok(Ok(_)) => debug!("Empty SRV answer for {name}"),
                Ok(Err(e)) => {
                    debug!("SRV lookup for {name} failed: {e}");
                    last_error = Some(Failure::native(e));
                }
                Err(_) => {
                    last_error = Some(Failure::native(DiscoveryError::Timeout(
                        self.lookup_timeout,
                    )));
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn lookup_host(&self, host: &str) -> (HostResult, Vec<IpAddr>) {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return (HostResult::default(), vec![ip]);
        }

        let fqdn = format!("{}.", host.trim_end_matches('.'));
        match timeout(self.lookup_timeout, self.resolver.lookup_ip(fqdn.as_str())).await {
            Ok(Ok(lookup)) => {
                let ips: Vec<IpAddr> = lookup.iter().collect();
                let result = HostResult {
                    cname: first_cname(lookup.as_lookup()),
                    ..Default::default()
                };
                (result, ips)
            }
            Ok(Err(e)) => (
                HostResult {
                    error: Some(Failure::native(e)),
                    ..Default::default()
                },
                Vec::new(),
            ),
            Err(_) => (
                HostResult {
                    error: Some(Failure::native(DiscoveryError::Timeout(
                        self.lookup_timeout,
                    ))),
                    ..Default::default()
                },
                Vec::new(),
            ),
        }
    }
}

impl<P: ConnectionProvider> Discover for DnsDiscoverer<P> {
    #[tracing::instrument(name = "lookup_server", skip(self), fields(server_name = %server_name))]
    async fn discover(&self, server_name: &str) -> Result<DiscoveryResult, DiscoveryError> {
        let parsed = parse_and_validate_server_name(server_name)?;
        let mut result = DiscoveryResult::default();
        let mut targets: Vec<(String, u16)> = Vec::new();

        if parsed.skips_srv() {
            result.srv_skipped = true;
            targets.push((
                parsed.host.clone(),
                parsed.port.unwrap_or(DEFAULT_FEDERATION_PORT),
            ));
        } else {
            match self.lookup_srv(&parsed.host).await {
                Ok(Some((cname, records))) => {
                    result.srv_cname = cname;
                    targets.extend(
                        records
                            .iter()
                            .map(|r| (r.target.trim_end_matches('.').to_string(), r.port)),
                    );
                    result.srv_records = records;
                }
                Ok(None) => targets.push((parsed.host.clone(), DEFAULT_FEDERATION_PORT)),
                Err(e) => {
                    result.srv_error = Some(e);
                    targets.push((parsed.host.clone(), DEFAULT_FEDERATION_PORT));
                }
            }
        }

        let mut seen = HashSet::new();
        for (host, port) in targets {
            let ips = match result.hosts.get(&host) {
                Some(known) => known
                    .addrs
                    .iter()
                    .filter_map(|a| a.parse::<SocketAddr>().ok())
                    .map(|a| a.ip())
                    .collect(),
                None => {
                    let (host_result, ips) = self.lookup_host(&host).await;
                    result.hosts.insert(host.clone(), host_result);
                    ips
                }
            };
            let entry = result.hosts.entry(host).or_default();
            for ip in ips {
                let addr = SocketAddr::new(ip, port).to_string();
                if !entry.addrs.contains(&addr) {
                    entry.addrs.push(addr.clone());
                }
                if seen.insert(addr.clone()) {
                    result.addrs.push(addr);
                }
            }
        }

        if result.addrs.is_empty() {
            let details = result
                .hosts
                .iter()
                .map(|(host, r)| match &r.error {
                    Some(e) => format!("{host}: {e}"),
                    None => format!("{host}: no A/AAAA records"),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DiscoveryError::NoAddresses {
                server_name: server_name.to_string(),
                details,
            });
        }

        info!(
            addrs = result.addrs.len(),
            srv_skipped = result.srv_skipped,
            "Resolved server"
        );
        Ok(result)
    }
}
