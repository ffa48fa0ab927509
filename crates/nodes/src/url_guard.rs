//! Outbound URL screening.
//!
//! Every URL that comes from node configuration is passed through
//! [`check_url`] before it reaches an HTTP client. Only `http`/`https` URLs
//! whose host is not loopback, private, link-local, unique-local, a cloud
//! metadata endpoint or an internal-only name are allowed.
//!
//! Hostnames are screened on their text as well, so wildcard-DNS names such
//! as `127.0.0.1.nip.io` are refused without a lookup. [`resolve_checked`]
//! adds the lookup for callers about to open a connection.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;
use url::{Host, Url};

/// Why a URL was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("URL could not be parsed")]
    Malformed,

    #[error("scheme '{0}' is not allowed")]
    Scheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("host '{0}' resolves to a blocked network")]
    BlockedHost(String),

    #[error("host '{0}' could not be resolved")]
    Unresolvable(String),
}

/// Parse `raw` and refuse it unless it is safe to call from the server.
pub fn check_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw.trim()).map_err(|_| UrlRejection::Malformed)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::Scheme(other.to_owned())),
    }

    let blocked = match url.host().ok_or(UrlRejection::MissingHost)? {
        Host::Domain(domain) => is_blocked_domain(domain),
        Host::Ipv4(ip) => is_blocked_ipv4(ip),
        Host::Ipv6(ip) => is_blocked_ipv6(ip),
    };

    if blocked {
        return Err(UrlRejection::BlockedHost(
            url.host_str().unwrap_or_default().to_owned(),
        ));
    }

    Ok(url)
}

/// `true` if `raw` may be called. Malformed input is simply not allowed.
pub fn is_allowed(raw: &str) -> bool {
    check_url(raw).is_ok()
}

fn is_blocked_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();

    // A domain the URL parser did not normalise into an address, e.g. a
    // bracketless IPv6 literal smuggled through a non-special form.
    if let Ok(ip) = domain.parse::<IpAddr>() {
        return is_blocked_ip(ip);
    }

    domain == "localhost"
        || domain.ends_with(".localhost")
        || domain.ends_with(".local")
        || domain.ends_with(".internal")
        || has_blocked_prefix(&domain)
}

/// Address-shaped prefixes matched against the hostname text.
const BLOCKED_PREFIXES: &[&str] = &["127.", "10.", "192.168.", "169.254.", "0.", "fe80:", "fc00:"];

fn has_blocked_prefix(host: &str) -> bool {
    if BLOCKED_PREFIXES.iter().any(|prefix| host.starts_with(prefix)) {
        return true;
    }

    // 172.16. through 172.31.
    host.strip_prefix("172.")
        .and_then(|rest| rest.split('.').next())
        .and_then(|octet| octet.parse::<u8>().ok())
        .is_some_and(|octet| (16..=31).contains(&octet))
}

/// Resolve the host of an already checked `url` and refuse it if any address
/// it resolves to is blocked.
///
/// Returns the resolved socket addresses on success.
pub async fn resolve_checked(url: &Url) -> Result<Vec<SocketAddr>, UrlRejection> {
    let host = url.host_str().ok_or(UrlRejection::MissingHost)?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs: Vec<SocketAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![SocketAddr::new(IpAddr::V4(ip), port)],
        Some(Host::Ipv6(ip)) => vec![SocketAddr::new(IpAddr::V6(ip), port)],
        _ => tokio::net::lookup_host((host, port))
            .await
            .map_err(|_| UrlRejection::Unresolvable(host.to_owned()))?
            .collect(),
    };

    if addrs.is_empty() {
        return Err(UrlRejection::Unresolvable(host.to_owned()));
    }
    if addrs.iter().any(|addr| is_blocked_ip(addr.ip())) {
        return Err(UrlRejection::BlockedHost(host.to_owned()));
    }
    Ok(addrs)
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    // 127/8, 10/8, 172.16/12, 192.168/16, 169.254/16 (includes the
    // 169.254.169.254 metadata service), 0/8.
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.octets()[0] == 0
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique-local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
}
