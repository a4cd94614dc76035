//! Publication date inference
//!
//! Four independent strategies are tried in order and the first one that
//! yields a date wins:
//!
//! 1. a `<time>` element (`datetime` attribute, else its text)
//! 2. an element carrying a date-like class
//! 3. a `<meta>` publication tag
//! 4. a date-shaped substring of the visible text
//!
//! Parsed values are converted to UTC and rendered as RFC 3339. A missing date
//! is a normal outcome, not an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;

/// Which strategy produced a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateStrategy {
    TimeElement = 1,
    DateClass = 2,
    MetaTag = 3,
    TextPattern = 4,
}

impl DateStrategy {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::TimeElement),
            2 => Some(Self::DateClass),
            3 => Some(Self::MetaTag),
            4 => Some(Self::TextPattern),
            _ => None,
        }
    }
}

impl fmt::Display for DateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A publication date found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDate {
    /// RFC 3339 in UTC, or the raw `<time>` value when it could not be parsed
    pub value: String,
    pub parsed: Option<DateTime<Utc>>,
    pub strategy: DateStrategy,
}

impl PublishedDate {
    fn parsed(dt: DateTime<Utc>, strategy: DateStrategy) -> Self {
        Self {
            value: dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            parsed: Some(dt),
            strategy,
        }
    }
}

/// A strategy looks at the document and its visible text
pub type Strategy = fn(&Html, &str) -> Option<PublishedDate>;

/// Strategies in priority order
pub const STRATEGIES: [Strategy; 4] = [
    from_time_element,
    from_date_class,
    from_meta_tags,
    from_text_pattern,
];

/// Classes that mark an element as holding a date
pub const DATE_CLASSES: &[&str] = &["date", "post-date", "published", "entry-date", "article-date"];

/// `property`/`name`/`itemprop` values of publication meta tags
pub const DATE_META_KEYS: &[&str] = &[
    "article:published_time",
    "og:pubdate",
    "date",
    "pubdate",
    "dc.date.issued",
    "last_updated",
];

/// Runs the cascade over a parsed document
pub fn infer_published_date(document: &Html, visible_text: &str) -> Option<PublishedDate> {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(document, visible_text))
}

fn from_time_element(document: &Html, _text: &str) -> Option<PublishedDate> {
    let selector = Selector::parse("time").ok()?;
    let mut unparsed: Option<String> = None;

    for element in document.select(&selector) {
        let raw = match element.value().attr("datetime").map(str::trim) {
            Some(attr) if !attr.is_empty() => attr.to_string(),
            _ => collapse_whitespace(&element.text().collect::<String>()),
        };
        if raw.is_empty() {
            continue;
        }
        if let Some(dt) = parse_date(&raw) {
            return Some(PublishedDate::parsed(dt, DateStrategy::TimeElement));
        }
        unparsed.get_or_insert(raw);
    }

    unparsed.map(|value| PublishedDate {
        value,
        parsed: None,
        strategy: DateStrategy::TimeElement,
    })
}

fn from_date_class(document: &Html, _text: &str) -> Option<PublishedDate> {
    let selector = Selector::parse("[class]").ok()?;

    document
        .select(&selector)
        .filter(|element| {
            element
                .value()
                .classes()
                .any(|class| DATE_CLASSES.iter().any(|c| class.eq_ignore_ascii_case(c)))
        })
        .find_map(|element| {
            let text = collapse_whitespace(&element.text().collect::<String>());
            parse_date(&text).or_else(|| find_date_in_text(&text))
        })
        .map(|dt| PublishedDate::parsed(dt, DateStrategy::DateClass))
}

fn from_meta_tags(document: &Html, _text: &str) -> Option<PublishedDate> {
    let selector = Selector::parse("meta[content]").ok()?;

    let metas: Vec<_> = document
        .select(&selector)
        .filter_map(|element| {
            let value = element.value();
            let key = value
                .attr("property")
                .or_else(|| value.attr("name"))
                .or_else(|| value.attr("itemprop"))?
                .trim()
                .to_ascii_lowercase();
            Some((key, value.attr("content")?.to_string()))
        })
        .collect();

    // Key order decides, not document order
    DATE_META_KEYS
        .iter()
        .flat_map(|wanted| {
            metas
                .iter()
                .filter(move |(key, _)| key == wanted)
                .map(|(_, content)| content)
        })
        .find_map(|content| parse_date(content))
        .map(|dt| PublishedDate::parsed(dt, DateStrategy::MetaTag))
}

fn from_text_pattern(_document: &Html, text: &str) -> Option<PublishedDate> {
    find_date_in_text(text).map(|dt| PublishedDate::parsed(dt, DateStrategy::TextPattern))
}

const MONTH: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?";

fn date_alternatives() -> String {
    format!(
        r"\d{{4}}-\d{{2}}-\d{{2}}(?:[T ]\d{{2}}:\d{{2}}(?::\d{{2}})?(?:\.\d+)?(?:Z|[+-]\d{{2}}:?\d{{2}})?)?|{m}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?\s+{m},?\s+\d{{4}}|\d{{1,2}}/\d{{1,2}}/\d{{4}}|\d{{4}}/\d{{1,2}}/\d{{1,2}}",
        m = MONTH
    )
}

static PREFIXED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:published|posted|last\s+updated|updated)(?:\s+on)?\s*:?\s*({})",
        date_alternatives()
    ))
    .expect("Invalid prefixed date regex")
});

static ANY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})", date_alternatives())).expect("Invalid date regex")
});

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("Invalid ordinal regex"));

static ABBREVIATION_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]{3,4})\.").expect("Invalid abbreviation regex"));

/// Finds the first parseable date-shaped substring, preferring labelled ones
pub fn find_date_in_text(text: &str) -> Option<DateTime<Utc>> {
    PREFIXED_DATE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .chain(ANY_DATE.find_iter(text))
        .find_map(|m| parse_date(m.as_str()))
}

enum Format {
    Rfc3339,
    Rfc2822,
    /// Pattern with an explicit offset
    Offset(&'static str),
    /// Naive date and time, taken as UTC
    DateTime(&'static str),
    /// Naive date, taken as midnight UTC
    Date(&'static str),
}

const FORMATS: &[Format] = &[
    Format::Rfc3339,
    Format::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Format::Offset("%Y-%m-%dT%H:%M%:z"),
    Format::Offset("%Y-%m-%d %H:%M:%S%.f%:z"),
    Format::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Format::DateTime("%Y-%m-%dT%H:%M"),
    Format::DateTime("%Y-%m-%d %H:%M:%S"),
    Format::DateTime("%Y-%m-%d %H:%M"),
    Format::Date("%Y-%m-%d"),
    Format::Rfc2822,
    Format::Date("%B %d, %Y"),
    Format::Date("%B %d %Y"),
    Format::Date("%d %B %Y"),
    Format::Date("%d %B, %Y"),
    Format::Date("%m/%d/%Y"),
    Format::Date("%d/%m/%Y"),
    Format::Date("%Y/%m/%d"),
    Format::Date("%b %d, %Y"),
    Format::Date("%d %b %Y"),
    Format::Date("%A, %B %d, %Y"),
    Format::Date("%a, %B %d, %Y"),
    Format::Date("%A, %d %B %Y"),
    Format::Date("%a, %d %b %Y"),
    Format::DateTime("%B %d, %Y %H:%M"),
    Format::DateTime("%B %d, %Y %I:%M %p"),
    Format::DateTime("%d %B %Y %H:%M"),
    Format::DateTime("%m/%d/%Y %H:%M"),
    Format::DateTime("%m/%d/%Y %I:%M %p"),
    Format::DateTime("%d/%m/%Y %H:%M"),
];

/// Parses a date string against the known formats
///
/// Returns `None` for anything unrecognised.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let cleaned = clean_date_string(raw);
    if cleaned.is_empty() {
        return None;
    }
    let s = cleaned.as_str();

    FORMATS.iter().find_map(|format| match format {
        Format::Rfc3339 => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Format::Rfc2822 => DateTime::parse_from_rfc2822(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Format::Offset(fmt) => DateTime::parse_from_str(s, fmt)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Format::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive)),
        Format::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive)),
    })
}

fn clean_date_string(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    let collapsed = collapsed.replace(" at ", " ");
    let without_ordinals = ORDINAL_SUFFIX.replace_all(&collapsed, "$1");
    ABBREVIATION_DOT
        .replace_all(&without_ordinals, "$1")
        .replace("Sept ", "Sep ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
