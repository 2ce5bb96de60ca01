use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a caller-supplied upstream URL is refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL that a request asks the service to fetch.
///
/// Sources such as `atom-regex` take the upstream address from the query
/// string, which would otherwise let any client make the service request
/// internal addresses. Only `http`/`https` are accepted, and unless
/// `allow_private` is set, loopback, RFC 1918, link-local and unique-local
/// hosts are refused.
///
/// Hostnames are not resolved; this guards literal addresses only.
pub fn validate_upstream_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }
    if allow_private {
        return Ok(url);
    }

    let Some(host) = url.host_str() else {
        return Ok(url);
    };
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        // ::ffff:a.b.c.d reaches the wrapped IPv4 host
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
            v4 => v4,
        };
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_internal(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}
