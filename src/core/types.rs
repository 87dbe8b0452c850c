use std::fmt;
use std::ops::Deref;

/// One media item to fetch, usually a video URL.
///
/// Always trimmed and non-empty. Whether it resolves to anything is up to
/// the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentifier(String);

impl SourceIdentifier {
    /// Trim `raw` and wrap it. Returns `None` for empty or whitespace-only input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for SourceIdentifier {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SourceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split a comma-separated list into identifiers, dropping blank parts.
///
/// ```
/// use tapedeck::core::types::parse_source_list;
///
/// let ids = parse_source_list("https://a.test/1, https://a.test/2");
/// assert_eq!(ids.len(), 2);
/// assert_eq!(ids[1].as_str(), "https://a.test/2");
/// ```
pub fn parse_source_list(raw: &str) -> Vec<SourceIdentifier> {
    raw.split(',').filter_map(SourceIdentifier::new).collect()
}
