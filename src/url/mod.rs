//! URL handling module for Sumi-Gather
//!
//! This module provides URL normalization, host extraction and the
//! registrable-domain scope check that keeps a crawl on one site.

mod domain;
mod normalize;

pub use domain::{
    extract_domain, is_in_scope, registrable_domain, url_registrable_domain,
};
pub use normalize::{normalize_parsed, normalize_url};

use ::url::Url;

/// Normalizes a discovered link and keeps it only if it is in scope
///
/// Returns the normalized string form, or `None` when the link is malformed,
/// uses a non-HTTP(S) scheme, or belongs to another registrable domain.
pub fn scoped_link(link: &str, scope_domain: &str) -> Option<String> {
    let url: Url = normalize_url(link).ok()?;
    is_in_scope(&url, scope_domain).then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_link_keeps_subdomain() {
        assert_eq!(
            scoped_link("https://Blog.Example.com/a#x", "example.com"),
            Some("https://blog.example.com/a".to_string())
        );
    }

    #[test]
    fn test_scoped_link_rejects_foreign_domain() {
        assert_eq!(scoped_link("https://other.com/", "example.com"), None);
    }

    #[test]
    fn test_scoped_link_rejects_non_http() {
        assert_eq!(scoped_link("mailto:a@example.com", "example.com"), None);
        assert_eq!(scoped_link("javascript:void(0)", "example.com"), None);
    }
}
