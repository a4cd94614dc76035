use url::{Host, Url};

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_gather::url::extract_domain;
///
/// let url = Url::parse("https://Sub.EXAMPLE.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Returns the registrable domain (eTLD+1) of a host name
///
/// Uses the Public Suffix List, so `news.bbc.co.uk` maps to `bbc.co.uk`.
/// IP literals, single-label hosts such as `localhost`, and hosts that are
/// themselves a public suffix are returned unchanged.
///
/// # Examples
///
/// ```
/// use sumi_gather::url::registrable_domain;
///
/// assert_eq!(registrable_domain("sub.example.com"), "example.com");
/// assert_eq!(registrable_domain("www.example.co.uk"), "example.co.uk");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if is_ip_literal(&host) || !host.contains('.') {
        return host;
    }

    match psl::domain(host.as_bytes()) {
        Some(domain) => String::from_utf8_lossy(domain.as_bytes()).into_owned(),
        None => host,
    }
}

/// Returns the registrable domain of a URL's host
pub fn url_registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(registrable_domain(domain)),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(format!("[{}]", addr)),
    }
}

/// Checks whether a URL belongs to the crawl scope
///
/// A URL is in scope when it uses http(s) and its registrable domain equals
/// `scope_domain`.
pub fn is_in_scope(url: &Url, scope_domain: &str) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    url_registrable_domain(url).map_or(false, |domain| domain == scope_domain)
}

fn is_ip_literal(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<std::net::IpAddr>().is_ok()
}
