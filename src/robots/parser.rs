//! Robots.txt rule evaluation
//!
//! Wraps the robotstxt crate's Google-compatible matcher. Only `User-agent`,
//! `Allow` and `Disallow` are honored.

use robotstxt::DefaultMatcher;

/// Rules that apply to one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRobots {
    /// No robots.txt, or a 4xx response: everything may be fetched
    AllowAll,

    /// Fail-closed result for an unreachable robots.txt
    DenyAll,

    /// Raw robots.txt body, matched on demand
    Rules(String),
}

impl ParsedRobots {
    /// Creates rules from a robots.txt body
    ///
    /// A body with no non-comment content allows everything.
    pub fn from_content(content: &str) -> Self {
        let has_directives = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .any(|line| !line.is_empty());

        if has_directives {
            Self::Rules(content.to_string())
        } else {
            Self::AllowAll
        }
    }

    pub fn allow_all() -> Self {
        Self::AllowAll
    }

    pub fn deny_all() -> Self {
        Self::DenyAll
    }

    /// Checks if `url` may be fetched by `user_agent`
    ///
    /// `url` may be absolute or just a path; only its path and query are matched.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DenyAll => false,
            Self::Rules(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "SumiGather"));
        assert!(robots.is_allowed("/admin", "SumiGather"));
    }

    #[test]
    fn test_deny_all() {
        let robots = ParsedRobots::deny_all();
        assert!(!robots.is_allowed("/", "SumiGather"));
        assert!(!robots.is_allowed("https://example.com/page", "SumiGather"));
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("/", "SumiGather"));
        assert!(!robots.is_allowed("https://example.com/page", "SumiGather"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed("https://example.com/", "SumiGather"));
        assert!(robots.is_allowed("https://example.com/page", "SumiGather"));
        assert!(!robots.is_allowed("https://example.com/admin", "SumiGather"));
        assert!(!robots.is_allowed("https://example.com/admin/users?id=3", "SumiGather"));
    }

    #[test]
    fn test_parse_allow_overrides_disallow() {
        let content = "User-agent: *\nDisallow: /private\nAllow: /private/public";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/private", "SumiGather"));
        assert!(robots.is_allowed("/private/public", "SumiGather"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content = "User-agent: SumiGather\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/page", "SumiGather"));
        assert!(robots.is_allowed("/page", "OtherBot"));
    }

    #[test]
    fn test_garbage_allows_everything() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("/any/path", "SumiGather"));
    }

    #[test]
    fn test_comment_only_body_is_allow_all() {
        assert_eq!(ParsedRobots::from_content(""), ParsedRobots::AllowAll);
        assert_eq!(
            ParsedRobots::from_content("# nothing here\n\n   # still nothing\n"),
            ParsedRobots::AllowAll
        );
    }
}
