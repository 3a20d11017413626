use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Host policy applied by [`validate_feed_url`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostPolicy {
    /// Reject localhost and private network addresses
    #[default]
    PublicOnly,
    /// Accept any host
    AllowPrivate,
}

impl HostPolicy {
    pub fn from_allow_private(allow_private: bool) -> Self {
        if allow_private {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }
}

/// Validates a URL string for use as a feed source.
///
/// Only `http` and `https` URLs with a host are accepted. Under
/// [`HostPolicy::PublicOnly`], localhost (`localhost`, `127.0.0.1`, `::1`) and
/// private ranges (RFC 1918, link-local, unique local IPv6) are rejected as
/// well.
///
/// # Examples
///
/// ```
/// use feedsink::util::{validate_feed_url, HostPolicy};
///
/// let url = validate_feed_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("http://localhost/feed", HostPolicy::PublicOnly).is_err());
/// assert!(validate_feed_url("http://localhost/feed", HostPolicy::AllowPrivate).is_ok());
/// assert!(validate_feed_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// ```
pub fn validate_feed_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if policy == HostPolicy::AllowPrivate {
        return Ok(url);
    }

    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public(url: &str) -> Result<Url, UrlValidationError> {
        validate_feed_url(url, HostPolicy::PublicOnly)
    }

    #[test]
    fn test_valid_urls() {
        assert!(public("https://www.gamingonlinux.com/article_rss.php").is_ok());
        assert!(public("http://news.example.org").is_ok());
        assert!(public("  https://example.com:443/feed.xml  ").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            public("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(public("ftp://example.com").is_err());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            public("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(matches!(
            public("http://localhost/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(public("http://LOCALHOST/feed").is_err());
        assert!(public("http://127.0.0.1/feed").is_err());
        assert!(public("http://[::1]/feed").is_err());
    }

    #[test]
    fn test_private_ips_rejected() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
            "http://0.0.0.0/feed",
        ] {
            assert!(public(url).is_err(), "{} should be rejected", url);
        }
    }

    #[test]
    fn test_allow_private_accepts_local_hosts() {
        for url in ["http://localhost/feed", "http://127.0.0.1:8080/feed", "http://10.0.0.1/"] {
            assert!(validate_feed_url(url, HostPolicy::AllowPrivate).is_ok());
        }
        // Scheme rules still apply
        assert!(validate_feed_url("ftp://127.0.0.1/", HostPolicy::AllowPrivate).is_err());
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(HostPolicy::from_allow_private(true), HostPolicy::AllowPrivate);
        assert_eq!(HostPolicy::from_allow_private(false), HostPolicy::PublicOnly);
        assert_eq!(HostPolicy::default(), HostPolicy::PublicOnly);
    }
}
