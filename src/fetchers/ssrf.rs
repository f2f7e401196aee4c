//! SSRF protection envelope
//!
//! Pre-connect checks applied to outbound HTTP destinations: dangerous
//! ports are rejected outright, and the host is resolved to all of its
//! addresses, every one of which must be publicly routable. Used by the
//! HTTP fetcher and by the paste manipulator's secondary fetch.

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

/// Ports commonly used by internal services; outbound requests to these are
/// never allowed.
const DANGEROUS_PORTS: &[u16] = &[
    22,    // SSH
    23,    // Telnet
    25,    // SMTP
    53,    // DNS
    110,   // POP3
    143,   // IMAP
    993,   // IMAPS
    995,   // POP3S
    1433,  // MSSQL
    3306,  // MySQL
    5432,  // PostgreSQL
    6379,  // Redis
    11211, // Memcached
    27017, // MongoDB
];

/// Checks whether an address is private, loopback or link-local
pub fn is_private_or_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_or_local_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_local_v4(mapped);
            }
            v6.is_loopback() || is_link_local_v6(v6)
        }
    }
}

fn is_private_or_local_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 10                                        // 10.0.0.0/8
        || (octets[0] == 172 && (16..=31).contains(&octets[1])) // 172.16.0.0/12
        || (octets[0] == 192 && octets[1] == 168)          // 192.168.0.0/16
        || octets[0] == 127                                // 127.0.0.0/8
        || (octets[0] == 169 && octets[1] == 254) // 169.254.0.0/16 link-local
}

fn is_link_local_v6(ip: Ipv6Addr) -> bool {
    // fe80::/10 unicast and ff02::/16 multicast
    (ip.segments()[0] & 0xffc0) == 0xfe80 || (ip.segments()[0] & 0xff0f) == 0xff02
}

fn is_dangerous_port(port: u16) -> bool {
    DANGEROUS_PORTS.contains(&port)
}

/// Validates an outbound destination before any connection is made. The
/// host is resolved to all of its addresses; the request is rejected if
/// any of them is private, loopback or link-local.
pub async fn check_url(url: &Url) -> Result<()> {
    if let Some(port) = url.port() {
        if is_dangerous_port(port) {
            return Err(Error::Fetch(format!(
                "access to port {} is not allowed for security reasons",
                port
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::Fetch("URL has no host".to_string()))?;

    // IP literals need no resolution
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        if is_private_or_local_ip(ip) {
            return Err(Error::Fetch(format!(
                "access to private/local IP {} is not allowed for security reasons",
                ip
            )));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Fetch(format!("failed to resolve hostname {}: {}", host, e)))?;

    for addr in addrs {
        if is_private_or_local_ip(addr.ip()) {
            return Err(Error::Fetch(format!(
                "access to private/local IP {} (resolved from {}) is not allowed for security reasons",
                addr.ip(),
                host
            )));
        }
    }

    Ok(())
}
