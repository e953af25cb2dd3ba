//! Streaming extraction of crawlable content from HTML pages.
//!
//! A page is tokenized once, front to back, and reduced to a [`PageRecord`]: the first title
//! text, up to [`MAX_BODY_WORDS`] words of body text and the `href` of every anchor that
//! points to the same site as the page itself.

mod decode;
mod domain;
mod page;
mod record;
mod text;

pub use domain::is_same_domain;
pub use page::{parse, parse_reader, PageParser, ParseError, SKIPPED_TAGS};
pub use record::PageRecord;
pub use text::{words, MAX_BODY_WORDS};
