use serde::{Deserialize, Serialize};

/// Content extracted from a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// First non-empty text found inside `<title>`, empty when there is none.
    pub title: String,
    /// Body words joined by a single space.
    pub body: String,
    /// The address the page was fetched from.
    pub source_url: String,
    /// Same-site `href` values in document order, as written in the page.
    pub links: Vec<String>,
}

impl PageRecord {
    /// Number of words held in `body`.
    pub fn word_count(&self) -> usize {
        self.body.split(' ').filter(|w| !w.is_empty()).count()
    }
}
