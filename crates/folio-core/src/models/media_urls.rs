use serde::{Deserialize, Serialize};

/// Media URL field of a post: either a single URL or a list of them.
///
/// Rows coming from the content sheet store this column as raw text that is
/// either a JSON array or a bare URL. [`MediaUrls::parse`] settles which one
/// it is once, at ingestion; everything downstream works with the enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaUrls {
    Many(Vec<String>),
    Single(String),
}

impl MediaUrls {
    /// Decode the raw cell text.
    ///
    /// Text starting with `[` or `"` must be valid JSON (array of strings or
    /// a string); anything else is taken as one bare URL. Blank text yields
    /// an empty list.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(MediaUrls::Many(Vec::new()));
        }
        if trimmed.starts_with('[') || trimmed.starts_with('"') {
            return serde_json::from_str(trimmed);
        }
        Ok(MediaUrls::Single(trimmed.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            MediaUrls::Many(urls) => urls,
            MediaUrls::Single(url) => std::slice::from_ref(url),
        };
        slice.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            MediaUrls::Many(urls) => urls,
            MediaUrls::Single(url) => vec![url],
        }
    }
}
