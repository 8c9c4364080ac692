//! String sanitization for user-supplied text.
//!
//! Two ammonia policies: a rich-text one keeping only `b`, `i`, `em`, `strong`
//! (no attributes), and a plain-text one keeping no markup at all. `script` and
//! `style` elements are dropped together with their content in both.
use std::collections::HashSet;
use std::fmt;

use ammonia::Builder;

const RICH_TEXT_TAGS: [&str; 4] = ["b", "i", "em", "strong"];
const CONTENT_STRIPPED_TAGS: [&str; 2] = ["script", "style"];
const NAME_STRIPPED_CHARS: [char; 7] = ['<', '>', '&', '"', '\'', '/', '\\'];

pub struct Sanitizer {
    rich_text: Builder<'static>,
    plain_text: Builder<'static>,
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sanitizer")
            .field("rich_text_tags", &RICH_TEXT_TAGS)
            .finish()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn base_policy() -> Builder<'static> {
    let mut policy = Builder::empty();
    policy
        .clean_content_tags(HashSet::from(CONTENT_STRIPPED_TAGS))
        .strip_comments(true);
    policy
}

impl Sanitizer {
    pub fn new() -> Self {
        let mut rich_text = base_policy();
        rich_text.add_tags(RICH_TEXT_TAGS);

        Self {
            rich_text,
            plain_text: base_policy(),
        }
    }

    /// Keep `b`/`i`/`em`/`strong`, drop every other tag, trim.
    pub fn sanitize_string(&self, input: &str) -> String {
        if input.trim().is_empty() {
            return String::new();
        }
        self.rich_text.clean(input).to_string().trim().to_string()
    }

    pub fn sanitize_html(&self, input: &str) -> String {
        self.sanitize_string(input)
    }

    /// Plain text with `< > & " ' / \` removed.
    pub fn sanitize_name(&self, input: &str) -> String {
        self.plain(input)
    }

    pub fn sanitize_title(&self, input: &str) -> String {
        self.plain(input)
    }

    fn plain(&self, input: &str) -> String {
        if input.trim().is_empty() {
            return String::new();
        }
        let cleaned = self.plain_text.clean(input).to_string();
        let text = decode_entities(&cleaned);
        text.chars()
            .filter(|c| !NAME_STRIPPED_CHARS.contains(c))
            .collect::<String>()
            .trim()
            .to_string()
    }
}

// The serializer only ever emits these entities in text content; `&amp;` goes last
// so an escaped entity is not decoded twice.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
