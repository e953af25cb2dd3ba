//! Single-pass page tokenization.

use std::io::{self, Read};

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
    TokenizerResult,
};
use html5ever::Attribute;

use crate::decode::Utf8Decoder;
use crate::domain::is_same_domain;
use crate::record::PageRecord;
use crate::text::{is_word_char, words, MAX_BODY_WORDS};

const CHUNK_SIZE: usize = 8 * 1024;

/// Pending text length past which complete words are moved to the body early.
const TEXT_FLUSH_LEN: usize = 16 * 1024;

/// Tags whose start tag is ignored altogether.
///
/// Only the tag itself is skipped: text nested inside one of them is still collected when it
/// sits within `<body>`.
pub const SKIPPED_TAGS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "template",
    "iframe",
    "canvas",
    "svg",
    "meta",
    "link",
    "head",
    "object",
    "embed",
    "javascript",
    "nav",
    "footer",
    "form",
    "span",
    "img",
];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("couldn't read page content: {0}")]
    Read(#[from] io::Error),
}

/// Parses a complete page held in memory.
pub fn parse(content: &[u8], base_url: &str) -> Result<PageRecord, ParseError> {
    parse_reader(content, base_url)
}

/// Parses a page from a byte stream, reading it in fixed-size chunks.
///
/// End of stream terminates the page; any other read error aborts it.
pub fn parse_reader<R: Read>(mut reader: R, base_url: &str) -> Result<PageRecord, ParseError> {
    let mut parser = PageParser::new(base_url);
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => parser.feed(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(parser.finish())
}

/// Incremental page parser.
///
/// Bytes are fed as they arrive; nothing but the pending text run and the extracted record is
/// kept between chunks.
///
/// ```
/// use sitecrawl_parser::PageParser;
///
/// let mut parser = PageParser::new("https://example.com/");
/// parser.feed(b"<html><head><title>Home</title></head>");
/// parser.feed(b"<body>Hello <a href=\"/about\">about</a></body></html>");
/// let page = parser.finish();
///
/// assert_eq!(page.title, "Home");
/// assert_eq!(page.body, "Hello about");
/// assert_eq!(page.links, vec!["/about"]);
/// ```
pub struct PageParser {
    tokenizer: Tokenizer<PageSink>,
    input: BufferQueue,
    decoder: Utf8Decoder,
}

impl PageParser {
    pub fn new(base_url: &str) -> Self {
        Self {
            tokenizer: Tokenizer::new(PageSink::new(base_url), TokenizerOpts::default()),
            input: BufferQueue::new(),
            decoder: Utf8Decoder::default(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        let mut decoded = String::with_capacity(bytes.len());
        self.decoder.decode(bytes, &mut decoded);
        self.push(decoded);
    }

    pub fn finish(mut self) -> PageRecord {
        let mut tail = String::new();
        self.decoder.finish(&mut tail);
        self.push(tail);
        self.tokenizer.end();
        self.tokenizer.sink.into_record()
    }

    fn push(&mut self, decoded: String) {
        if decoded.is_empty() {
            return;
        }
        self.input.push_back(StrTendril::from(decoded));
        // PageSink never hands control back for scripts, so the whole input is consumed.
        let res = self.tokenizer.feed(&mut self.input);
        debug_assert!(matches!(res, TokenizerResult::Done));
    }
}

/// Token-driven extraction state.
///
/// The tokenizer may split one run of text in several character tokens, they are joined back
/// in `text` and handled once the next non-text token shows up.
struct PageSink {
    record: PageRecord,
    in_title: bool,
    in_body: bool,
    words: Vec<String>,
    text: String,
}

impl PageSink {
    fn new(base_url: &str) -> Self {
        Self {
            record: PageRecord {
                source_url: base_url.to_string(),
                ..Default::default()
            },
            in_title: false,
            in_body: false,
            words: Vec::new(),
            text: String::new(),
        }
    }

    fn wants_title(&self) -> bool {
        self.in_title && self.record.title.is_empty()
    }

    fn wants_text(&self) -> bool {
        self.wants_title() || (self.in_body && self.words.len() < MAX_BODY_WORDS)
    }

    fn push_text(&mut self, chars: &str) {
        self.text.push_str(chars);
        if self.text.len() >= TEXT_FLUSH_LEN && !self.wants_title() {
            self.flush_words();
        }
    }

    /// Moves the complete words of the pending run to the body, the last one may still grow.
    fn flush_words(&mut self) {
        let Some((at, c)) = self
            .text
            .char_indices()
            .rev()
            .find(|&(_, c)| !is_word_char(c))
        else {
            return;
        };
        let rest = self.text.split_off(at + c.len_utf8());
        let done = std::mem::replace(&mut self.text, rest);
        self.push_words(&done);
    }

    fn push_words(&mut self, text: &str) {
        if self.in_body && self.words.len() < MAX_BODY_WORDS {
            let remaining = MAX_BODY_WORDS - self.words.len();
            self.words.extend(words(text).into_iter().take(remaining));
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let text = text.trim();

        if self.wants_title() {
            self.record.title = text.to_string();
        }
        self.push_words(text);
    }

    fn start_tag(&mut self, tag: &Tag) {
        let name: &str = &tag.name;
        if SKIPPED_TAGS.contains(&name) {
            return;
        }
        match name {
            "title" => self.in_title = true,
            "body" => self.in_body = true,
            "a" => {
                if let Some(href) = same_domain_href(&self.record.source_url, &tag.attrs) {
                    self.record.links.push(href);
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: &Tag) {
        match &*tag.name {
            "title" => self.in_title = false,
            "body" => self.in_body = false,
            _ => {}
        }
    }

    fn into_record(mut self) -> PageRecord {
        self.flush_text();
        self.record.body = self.words.join(" ");
        self.record
    }
}

impl TokenSink for PageSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(chars) => {
                if self.wants_text() {
                    self.push_text(&chars);
                }
                TokenSinkResult::Continue
            }
            // Recoverable tokenizer diagnostics, they don't end a text run.
            Token::NullCharacterToken | Token::ParseError(_) => TokenSinkResult::Continue,
            Token::TagToken(tag) => {
                self.flush_text();
                match tag.kind {
                    TagKind::StartTag => {
                        self.start_tag(&tag);
                        if tag.self_closing {
                            TokenSinkResult::Continue
                        } else {
                            raw_content(&tag.name)
                        }
                    }
                    TagKind::EndTag => {
                        self.end_tag(&tag);
                        TokenSinkResult::Continue
                    }
                }
            }
            Token::CommentToken(_) | Token::DoctypeToken(_) | Token::EOFToken => {
                self.flush_text();
                TokenSinkResult::Continue
            }
        }
    }
}

/// Elements whose content is raw text rather than markup.
fn raw_content(name: &str) -> TokenSinkResult<()> {
    match name {
        "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
        "script" => TokenSinkResult::RawData(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => {
            TokenSinkResult::RawData(RawKind::Rawtext)
        }
        "plaintext" => TokenSinkResult::Plaintext,
        _ => TokenSinkResult::Continue,
    }
}

fn same_domain_href(base_url: &str, attrs: &[Attribute]) -> Option<String> {
    attrs
        .iter()
        .filter(|attr| &*attr.name.local == "href")
        .map(|attr| attr.value.trim())
        .find(|href| !href.is_empty() && is_same_domain(base_url, href))
        .map(str::to_string)
}
