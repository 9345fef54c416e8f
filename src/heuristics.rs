//! Pattern tables for next-episode discovery.
//!
//! The tables are plain data; `next_episode` only knows how to evaluate a
//! compiled [`LinkPattern`] and an ordered list of URL number patterns.

use crate::logging;
use regex::Regex;
use scraper::Selector;
use std::fmt;

/// Structural patterns, tried in order. An entry ending in `:contains("…")`
/// matches anchor text instead of markup.
pub const NEXT_LINK_PATTERNS: &[&str] = &[
    r#"a[href*="episode-"]:not([href*="previous"])"#,
    r#"a[href*="capitulo-"]:not([href*="anterior"])"#,
    r#"a[href*="cap-"]:not([href*="anterior"])"#,
    "a.next-episode",
    "a.siguiente",
    ".next-chapter a",
    ".episode-nav .next",
    ".navigation .next",
    r#"a[title*="next"]"#,
    r#"a[title*="siguiente"]"#,
    r#"a[title*="próximo"]"#,
    r#"a:contains("Next")"#,
    r#"a:contains("Siguiente")"#,
    r#"a:contains("Próximo")"#,
    r#"a:contains("→")"#,
    r#"a:contains("►")"#,
];

/// URL patterns whose first group is the current episode number. Only the
/// first pattern that matches the page URL is used.
pub const EPISODE_NUMBER_PATTERNS: &[&str] = &[
    r"(?i)episode-(\d+)",
    r"(?i)capitulo-(\d+)",
    r"(?i)cap-(\d+)",
    r"(?i)ep-(\d+)",
    r"(\d+)\D*$",
];

pub enum LinkPattern {
    Selector { source: String, selector: Selector },
    Text {
        source: String,
        base: Selector,
        needle: String,
    },
}

impl LinkPattern {
    pub fn source(&self) -> &str {
        match self {
            LinkPattern::Selector { source, .. } | LinkPattern::Text { source, .. } => source,
        }
    }
}

impl fmt::Debug for LinkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LinkPattern").field(&self.source()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub source: String,
    pub reason: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern {:?}: {}", self.source, self.reason)
    }
}

impl std::error::Error for PatternError {}

const CONTAINS_MARKER: &str = ":contains(";

pub fn compile_link_pattern(source: &str) -> Result<LinkPattern, PatternError> {
    let error = |reason: String| PatternError {
        source: source.to_string(),
        reason,
    };

    if let Some(start) = source.find(CONTAINS_MARKER) {
        let base_css = source[..start].trim();
        let argument = source[start + CONTAINS_MARKER.len()..]
            .strip_suffix(')')
            .ok_or_else(|| error("unterminated :contains(".to_string()))?;
        let needle = argument
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        if needle.is_empty() {
            return Err(error("empty :contains() argument".to_string()));
        }
        let base_css = if base_css.is_empty() { "a" } else { base_css };
        let base = Selector::parse(base_css).map_err(|err| error(format!("{err:?}")))?;
        return Ok(LinkPattern::Text {
            source: source.to_string(),
            base,
            needle: needle.to_lowercase(),
        });
    }

    let selector = Selector::parse(source).map_err(|err| error(format!("{err:?}")))?;
    Ok(LinkPattern::Selector {
        source: source.to_string(),
        selector,
    })
}

/// Compiled heuristic set. Patterns that fail to compile are logged and left out.
#[derive(Debug)]
pub struct HeuristicTable {
    pub link_patterns: Vec<LinkPattern>,
    pub number_patterns: Vec<Regex>,
    pub rejected: Vec<PatternError>,
}

impl HeuristicTable {
    pub fn builtin() -> Self {
        Self::with_extra(&[])
    }

    pub fn with_extra(extra_link_patterns: &[String]) -> Self {
        let mut rejected = Vec::new();
        let mut link_patterns = Vec::new();
        let sources = NEXT_LINK_PATTERNS
            .iter()
            .copied()
            .chain(extra_link_patterns.iter().map(String::as_str));
        for source in sources {
            match compile_link_pattern(source) {
                Ok(pattern) => link_patterns.push(pattern),
                Err(err) => {
                    logging::warn("heuristics", format!("selector error: {err}"));
                    rejected.push(err);
                }
            }
        }

        let mut number_patterns = Vec::new();
        for source in EPISODE_NUMBER_PATTERNS {
            match Regex::new(source) {
                Ok(re) => number_patterns.push(re),
                Err(err) => {
                    logging::warn("heuristics", format!("url pattern error {source:?}: {err}"));
                    rejected.push(PatternError {
                        source: source.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Self {
            link_patterns,
            number_patterns,
            rejected,
        }
    }

    /// Current episode number from the first number pattern that matches `url`.
    pub fn episode_number(&self, url: &str) -> Option<u64> {
        let caps = self
            .number_patterns
            .iter()
            .find_map(|re| re.captures(url))?;
        caps.get(1)?.as_str().parse().ok()
    }
}

impl Default for HeuristicTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_compiles() {
        let table = HeuristicTable::builtin();
        assert!(table.rejected.is_empty(), "{:?}", table.rejected);
        assert_eq!(table.link_patterns.len(), NEXT_LINK_PATTERNS.len());
        assert_eq!(table.number_patterns.len(), EPISODE_NUMBER_PATTERNS.len());
    }

    #[test]
    fn test_contains_entries_become_text_patterns() {
        match compile_link_pattern(r#"a:contains("Siguiente")"#).unwrap() {
            LinkPattern::Text { needle, .. } => assert_eq!(needle, "siguiente"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_patterns_are_rejected_not_fatal() {
        let table = HeuristicTable::with_extra(&["a[[".to_string(), ".next-link".to_string()]);
        assert_eq!(table.rejected.len(), 1);
        assert_eq!(table.rejected[0].source, "a[[");
        assert_eq!(table.link_patterns.len(), NEXT_LINK_PATTERNS.len() + 1);
    }

    #[test]
    fn test_first_matching_number_pattern_wins() {
        let table = HeuristicTable::builtin();
        assert_eq!(table.episode_number("https://x.tv/show-2/episode-7"), Some(7));
        assert_eq!(table.episode_number("https://x.tv/serie/cap-12.html"), Some(12));
        assert_eq!(table.episode_number("https://x.tv/watch/2024/s1e45?t=3"), Some(3));
        assert_eq!(table.episode_number("https://x.tv/watch"), None);
    }
}
