use crate::error::DiscoveryError;
use std::net::IpAddr;

/// A validated server name split into host and optional port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedServerName {
    /// Hostname or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: Option<u16>,
    pub ip_literal: Option<IpAddr>,
}

impl ParsedServerName {
    /// SRV lookups only apply to a bare hostname.
    pub fn skips_srv(&self) -> bool {
        self.port.is_some() || self.ip_literal.is_some()
    }
}

pub fn parse_and_validate_server_name(
    server_name: &str,
) -> Result<ParsedServerName, DiscoveryError> {
    if server_name.is_empty() {
        return Err(DiscoveryError::InvalidServerName("empty string".into()));
    }

    let (host, port_part) = if let Some(rest) = server_name.strip_prefix('[') {
        let (literal, after) = rest.split_once(']').ok_or_else(|| {
            DiscoveryError::InvalidServerName(format!("{server_name} (unterminated IPv6 literal)"))
        })?;
        let port_part = match after {
            "" => None,
            p => Some(p.strip_prefix(':').ok_or_else(|| {
                DiscoveryError::InvalidServerName(format!(
                    "{server_name} (garbage after IPv6 literal)"
                ))
            })?),
        };
        (literal, port_part)
    } else {
        match server_name.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (server_name, None),
        }
    };

    if host.is_empty() {
        return Err(DiscoveryError::InvalidServerName("empty hostname".into()));
    }

    let port = port_part
        .map(|p| {
            p.parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| {
                    DiscoveryError::InvalidServerName(format!("{server_name} (invalid port '{p}')"))
                })
        })
        .transpose()?;

    let ip_literal = host.parse::<IpAddr>().ok();
    if server_name.starts_with('[') && !matches!(ip_literal, Some(IpAddr::V6(_))) {
        return Err(DiscoveryError::InvalidServerName(format!(
            "{server_name} (not a valid IPv6 literal)"
        )));
    }

    if ip_literal.is_none() {
        if !host.is_ascii() || host.len() > 255 || host.contains("..") {
            return Err(DiscoveryError::InvalidServerName(format!(
                "{server_name} (Not a valid DNS name)"
            )));
        }
        if let Some(c) = host
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '.')
        {
            return Err(DiscoveryError::InvalidServerName(format!(
                "{server_name} (Invalid character '{c}')"
            )));
        }
    }

    Ok(ParsedServerName {
        host: host.to_lowercase(),
        port,
        ip_literal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_hostname() {
        let parsed = parse_and_validate_server_name("Matrix.ORG").unwrap();
        assert_eq!(parsed.host, "matrix.org");
        assert_eq!(parsed.port, None);
        assert!(!parsed.skips_srv());
    }

    #[test]
    fn hostname_with_port() {
        let parsed = parse_and_validate_server_name("matrix.org:8448").unwrap();
        assert_eq!(parsed.port, Some(8448));
        assert!(parsed.skips_srv());
    }

    #[test]
    fn ip_literals() {
        let v4 = parse_and_validate_server_name("192.168.1.10").unwrap();
        assert!(v4.ip_literal.is_some());
        assert!(v4.skips_srv());

        let v6 = parse_and_validate_server_name("[2001:db8::1]:8448").unwrap();
        assert_eq!(v6.host, "2001:db8::1");
        assert_eq!(v6.port, Some(8448));

        assert!(parse_and_validate_server_name("[example.org]").is_err());
        assert!(parse_and_validate_server_name("[::1").is_err());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(parse_and_validate_server_name("").is_err());
        assert!(parse_and_validate_server_name(":8448").is_err());
        assert!(parse_and_validate_server_name("bad_domain!org").is_err());
        assert!(parse_and_validate_server_name("a..b").is_err());
        assert!(parse_and_validate_server_name("example.org:http").is_err());
        assert!(parse_and_validate_server_name("example.org:0").is_err());
    }
}
