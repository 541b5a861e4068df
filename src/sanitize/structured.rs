//! Tokenizer-based sanitizer
//!
//! The fragment is split into text, start tags, end tags and comments. Start
//! tags are rebuilt from their cleaned attribute lists, so nothing the
//! tokenizer did not understand is copied through verbatim.

use super::{BLOCKED_TAGS, IFRAME_SANDBOX, decode_entities, is_https_url, is_javascript_url};

/// Elements a browser reads as text up to the matching end tag, so markup
/// inside them (attribute values included) never nests
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "iframe", "textarea", "title", "xmp", "noscript", "noembed", "noframes",
];

/// Everything after this start tag is text; it has no end tag
const PLAINTEXT_TAG: &str = "plaintext";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    StartTag(Tag),
    EndTag(String),
    /// Comments, doctypes and processing instructions
    Ignored,
}

#[derive(Debug, PartialEq)]
struct Tag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
}

#[derive(Debug, PartialEq)]
struct Attribute {
    name: String,
    value: Option<String>,
}

impl Tag {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .and_then(|attr| attr.value.as_deref())
    }

    fn is_void(&self) -> bool {
        self.self_closing || VOID_TAGS.contains(&self.name.as_str())
    }

    /// Drop event handlers, script URLs and attribute names we cannot re-serialize safely
    fn clean_attributes(&mut self) {
        self.attributes.retain(|attr| {
            if attr.name.starts_with("on") || !is_plain_attribute_name(&attr.name) {
                return false;
            }
            if attr.name == "href" || attr.name == "src" {
                if let Some(value) = &attr.value {
                    return !is_javascript_url(value);
                }
            }
            true
        });
    }

    fn force_attribute(&mut self, name: &str, value: &str) {
        self.attributes.retain(|attr| attr.name != name);
        self.attributes.push(Attribute {
            name: name.to_string(),
            value: Some(value.to_string()),
        });
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            if let Some(value) = &attr.value {
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
    }
}

fn is_plain_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
}

fn is_blocked(name: &str) -> bool {
    BLOCKED_TAGS.contains(&name)
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_byte(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Advance while `keep` holds and return the consumed slice
    fn take_while(&mut self, keep: impl Fn(u8) -> bool) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self.peek_byte(0).is_some_and(&keep) {
            self.pos += 1;
        }
        &input[start..self.pos]
    }

    /// Move just past the next occurrence of `needle`, or to the end of input
    fn skip_past(&mut self, needle: &str) {
        match self.input[self.pos..].find(needle) {
            Some(offset) => self.pos += offset + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    /// Offset of the next `</name` from the current position, ASCII case-insensitive
    fn find_end_tag(&self, name: &str) -> Option<usize> {
        let rest = &self.input.as_bytes()[self.pos..];
        rest.windows(name.len() + 2).position(|window| {
            window.starts_with(b"</") && window[2..].eq_ignore_ascii_case(name.as_bytes())
        })
    }

    /// Skip the content of an element whose start tag was just consumed
    fn skip_element(&mut self, name: &str) {
        if name == PLAINTEXT_TAG {
            self.pos = self.input.len();
            return;
        }
        if RAW_TEXT_TAGS.contains(&name) {
            match self.find_end_tag(name) {
                Some(offset) => {
                    self.pos += offset;
                    self.skip_past(">");
                }
                None => self.pos = self.input.len(),
            }
            return;
        }

        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token {
                Token::StartTag(tag) if tag.name == name && !tag.is_void() => depth += 1,
                Token::EndTag(end) if end == name => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn read_start_tag(&mut self) -> Tag {
        // Caller checked that `<` is followed by an ASCII letter
        self.pos += 1;
        let name = self
            .take_while(|b| !b.is_ascii_whitespace() && b != b'/' && b != b'>')
            .to_ascii_lowercase();

        let mut attributes = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.peek_byte(0) {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek_byte(0) == Some(b'>') {
                        self.pos += 1;
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => attributes.push(self.read_attribute()),
            }
        }

        Tag {
            name,
            attributes,
            self_closing,
        }
    }

    fn read_attribute(&mut self) -> Attribute {
        let start = self.pos;
        // Always consume at least one byte so a stray `=` cannot stall the loop
        self.pos += 1;
        self.take_while(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'));
        let name = self.input[start..self.pos].to_ascii_lowercase();

        self.skip_whitespace();
        if self.peek_byte(0) != Some(b'=') {
            return Attribute { name, value: None };
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek_byte(0) {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let value = self.take_while(|b| b != quote);
                if self.peek_byte(0).is_some() {
                    self.pos += 1;
                }
                value
            }
            _ => self.take_while(|b| !b.is_ascii_whitespace() && b != b'>'),
        };

        Attribute {
            name,
            value: Some(value.to_string()),
        }
    }

    fn read_end_tag(&mut self) -> String {
        self.pos += 2;
        let name = self
            .take_while(|b| !b.is_ascii_whitespace() && b != b'/' && b != b'>')
            .to_ascii_lowercase();
        self.skip_past(">");
        name
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }

        if self.peek_byte(0) != Some(b'<') {
            let text = self.take_while(|b| b != b'<');
            return Some(Token::Text(text));
        }

        let rest = &self.input[self.pos..];
        if rest.starts_with("<!--") {
            self.pos += 4;
            self.skip_past("-->");
            return Some(Token::Ignored);
        }
        match self.peek_byte(1) {
            Some(b'/') if self.peek_byte(2).is_some_and(|b| b.is_ascii_alphabetic()) => {
                Some(Token::EndTag(self.read_end_tag()))
            }
            Some(b'!' | b'?') => {
                self.skip_past(">");
                Some(Token::Ignored)
            }
            Some(b) if b.is_ascii_alphabetic() => Some(Token::StartTag(self.read_start_tag())),
            _ => {
                let input = self.input;
                self.pos += 1;
                Some(Token::Text(&input[self.pos - 1..self.pos]))
            }
        }
    }
}

pub(super) fn sanitize(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tokens = Tokenizer::new(html);

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => out.push_str(&text.replace('<', "&lt;")),
            Token::Ignored => {}
            Token::StartTag(mut tag) => {
                if is_blocked(&tag.name) {
                    if !tag.is_void() {
                        tokens.skip_element(&tag.name);
                    }
                    continue;
                }
                if !is_plain_attribute_name(&tag.name) {
                    continue;
                }

                if tag.name == "iframe" {
                    if !tag.attribute("src").is_some_and(is_https_url) {
                        if !tag.self_closing {
                            tokens.skip_element("iframe");
                        }
                        continue;
                    }
                    tag.clean_attributes();
                    tag.force_attribute("loading", "lazy");
                    tag.force_attribute("referrerpolicy", "no-referrer");
                    tag.force_attribute("sandbox", IFRAME_SANDBOX);
                } else {
                    tag.clean_attributes();
                }
                tag.write_to(&mut out);
            }
            Token::EndTag(name) => {
                if !is_blocked(&name) && is_plain_attribute_name(&name) {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
        }
    }

    out
}

pub(super) fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tokens = Tokenizer::new(html);

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => out.push_str(&decode_entities(text)),
            Token::StartTag(tag) => {
                let hidden = is_blocked(&tag.name) || tag.name == "iframe";
                if hidden && !tag.is_void() {
                    tokens.skip_element(&tag.name);
                }
            }
            Token::EndTag(_) | Token::Ignored => {}
        }
    }

    out
}
