//! Private address gate.
//!
//! Hosts that are, or resolve to, private or reserved addresses are refused
//! unless `network.allow_private_hosts` is set.

use std::net::IpAddr;

use reqwest::Url;
use url::Host;

use linkdigest_core::Error;

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast and broadcast addresses
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_or_reserved(IpAddr::V4(v4)),
            None => {
                v6.is_loopback()
                    || v6.is_multicast()
                    || v6.is_unspecified()
                    || (v6.segments()[0] & 0xfe00) == 0xfc00
                    || (v6.segments()[0] & 0xffc0) == 0xfe80
            }
        },
    }
}

fn blocked(ip: IpAddr, url: &Url) -> Error {
    Error::InvalidUrl(format!("{url} resolves to blocked address {ip}"))
}

/// Refuse `url` if its host is, or resolves to, a private or reserved address.
pub async fn check_host(url: &Url) -> Result<(), Error> {
    let host = url.host().ok_or_else(|| Error::InvalidUrl(format!("{url} has no host")))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let domain = match host {
        Host::Ipv4(v4) => return if is_private_or_reserved(v4.into()) { Err(blocked(v4.into(), url)) } else { Ok(()) },
        Host::Ipv6(v6) => return if is_private_or_reserved(v6.into()) { Err(blocked(v6.into(), url)) } else { Ok(()) },
        Host::Domain(domain) => domain,
    };

    if domain.eq_ignore_ascii_case("localhost") || domain.ends_with(".localhost") {
        return Err(Error::InvalidUrl(format!("{url} targets localhost")));
    }

    let addrs = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|e| Error::FetchFailed(format!("DNS resolution failed for {domain}: {e}")))?;

    for addr in addrs {
        if is_private_or_reserved(addr.ip()) {
            return Err(blocked(addr.ip(), url));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_private_v4_ranges() {
        for ip in [
            Ipv4Addr::new(127, 0, 0, 1),
            Ipv4Addr::new(10, 1, 2, 3),
            Ipv4Addr::new(172, 16, 0, 1),
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(169, 254, 169, 254),
            Ipv4Addr::new(224, 0, 0, 1),
            Ipv4Addr::new(255, 255, 255, 255),
            Ipv4Addr::new(0, 0, 0, 0),
        ] {
            assert!(is_private_or_reserved(ip.into()), "{ip}");
        }
    }

    #[test]
    fn test_public_v4_allowed() {
        assert!(!is_private_or_reserved(Ipv4Addr::new(93, 184, 216, 34).into()));
        assert!(!is_private_or_reserved(Ipv4Addr::new(172, 32, 0, 1).into()));
    }

    #[test]
    fn test_v6_ranges() {
        assert!(is_private_or_reserved(Ipv6Addr::LOCALHOST.into()));
        assert!(is_private_or_reserved(Ipv6Addr::UNSPECIFIED.into()));
        assert!(is_private_or_reserved("fd00::1".parse::<IpAddr>().unwrap()));
        assert!(is_private_or_reserved("fe80::1".parse::<IpAddr>().unwrap()));
        assert!(is_private_or_reserved("::ffff:127.0.0.1".parse::<IpAddr>().unwrap()));
        assert!(!is_private_or_reserved("2606:4700::1111".parse::<IpAddr>().unwrap()));
    }

    #[tokio::test]
    async fn test_check_host_literals() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert!(matches!(check_host(&url("http://127.0.0.1:8080/")).await, Err(Error::InvalidUrl(_))));
        assert!(matches!(check_host(&url("http://[::1]/")).await, Err(Error::InvalidUrl(_))));
        assert!(matches!(check_host(&url("http://localhost/")).await, Err(Error::InvalidUrl(_))));
        assert!(check_host(&url("https://93.184.216.34/")).await.is_ok());
    }
}
