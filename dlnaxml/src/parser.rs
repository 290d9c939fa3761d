//! Chunk-driven XML parser
//!
//! The parser is a small state machine fed with arbitrary byte slices. Tokens
//! (tags, comments, text runs) are only decoded once they are complete, so a
//! chunk boundary may fall anywhere: inside a tag, an entity or a UTF-8
//! sequence.

use crate::XmlError;
use quick_xml::escape::unescape;
use std::collections::VecDeque;
use tracing::trace;

/// Default cap on a single pending token (tag or text run).
pub const DEFAULT_MAX_PENDING: usize = 64 * 1024;

/// An element that has just been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlEvent {
    /// Qualified element name (`u:Play`)
    pub name: String,
    /// Names of the open ancestors, outermost first, without the element itself
    pub path: Vec<String>,
    /// Character data directly inside the element
    pub text: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
}

impl XmlEvent {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Name of the direct parent, if any.
    pub fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    has_children: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Text,
    Markup,
}

/// Incremental XML parser.
///
/// ```
/// use dlnaxml::XmlParser;
///
/// let mut parser = XmlParser::new();
/// parser.write(b"<a><b>he").unwrap();
/// assert!(parser.next_event().is_none());
/// parser.write(b"llo</b></a>").unwrap();
/// let b = parser.next_event().unwrap();
/// assert_eq!((b.name.as_str(), b.text.as_str()), ("b", "hello"));
/// ```
#[derive(Debug)]
pub struct XmlParser {
    pending: Vec<u8>,
    state: Token,
    stack: Vec<OpenElement>,
    events: VecDeque<XmlEvent>,
    expand_entities: bool,
    max_pending: usize,
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlParser {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING)
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            state: Token::Text,
            stack: Vec::new(),
            events: VecDeque::new(),
            expand_entities: true,
            max_pending,
        }
    }

    /// When disabled, text and attribute values are returned undecoded.
    pub fn set_expand_entities(&mut self, flag: bool) {
        self.expand_entities = flag;
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of events ready to be consumed.
    pub fn available(&self) -> usize {
        self.events.len()
    }

    pub fn next_event(&mut self) -> Option<XmlEvent> {
        self.events.pop_front()
    }

    /// Feeds a chunk and parses as many complete tokens as possible.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), XmlError> {
        for &b in chunk {
            match self.state {
                Token::Text => {
                    if b == b'<' {
                        self.flush_text()?;
                        self.pending.push(b);
                        self.state = Token::Markup;
                    } else {
                        self.push_pending(b)?;
                    }
                }
                Token::Markup => {
                    self.push_pending(b)?;
                    if b == b'>' && self.markup_complete() {
                        let markup = std::mem::take(&mut self.pending);
                        self.state = Token::Text;
                        self.handle_markup(&markup)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Signals the end of input.
    ///
    /// Fails if a tag is incomplete or elements are still open. The parser is
    /// reset either way and can be reused for a new document.
    pub fn end(&mut self) -> Result<(), XmlError> {
        let result = if self.state == Token::Markup || !self.stack.is_empty() {
            Err(XmlError::UnexpectedEof(
                self.stack.iter().map(|e| e.name.clone()).collect(),
            ))
        } else {
            Ok(())
        };
        self.pending.clear();
        self.stack.clear();
        self.state = Token::Text;
        result
    }

    fn push_pending(&mut self, b: u8) -> Result<(), XmlError> {
        if self.pending.len() >= self.max_pending {
            return Err(XmlError::TokenTooLong(self.max_pending));
        }
        self.pending.push(b);
        Ok(())
    }

    /// Whether the pending markup (ending with `>`) forms a complete token.
    fn markup_complete(&self) -> bool {
        let m = &self.pending;
        if m.starts_with(b"<!--") {
            return m.len() >= 7 && m.ends_with(b"-->");
        }
        if m.starts_with(b"<![CDATA[") {
            return m.ends_with(b"]]>");
        }
        if m.starts_with(b"<?") {
            return m.ends_with(b"?>");
        }
        // '>' inside a quoted value or a DOCTYPE internal subset does not
        // close the markup
        let mut quote = None;
        let mut depth = 0usize;
        for &c in &m[..m.len() - 1] {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == b'"' || c == b'\'' => quote = Some(c),
                None if c == b'[' => depth += 1,
                None if c == b']' => depth = depth.saturating_sub(1),
                None => {}
            }
        }
        quote.is_none() && depth == 0
    }

    fn flush_text(&mut self) -> Result<(), XmlError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let raw = String::from_utf8(std::mem::take(&mut self.pending))?;
        match self.stack.last_mut() {
            Some(open) => {
                let decoded = if self.expand_entities {
                    unescape(&raw)?.into_owned()
                } else {
                    raw
                };
                open.text.push_str(&decoded);
            }
            None => {
                if !raw.trim().is_empty() {
                    trace!("Ignoring text outside of the root element: {:?}", raw);
                }
            }
        }
        Ok(())
    }

    fn handle_markup(&mut self, markup: &[u8]) -> Result<(), XmlError> {
        if markup.starts_with(b"<![CDATA[") {
            let content = String::from_utf8(markup[9..markup.len() - 3].to_vec())?;
            if let Some(open) = self.stack.last_mut() {
                open.text.push_str(&content);
            }
            return Ok(());
        }
        if markup.starts_with(b"<!") || markup.starts_with(b"<?") {
            // comment, doctype or processing instruction
            return Ok(());
        }

        let tag = String::from_utf8(markup[1..markup.len() - 1].to_vec())?;
        if let Some(name) = tag.strip_prefix('/') {
            return self.close_element(name.trim());
        }

        let (body, self_closing) = match tag.strip_suffix('/') {
            Some(body) => (body, true),
            None => (tag.as_str(), false),
        };
        let (name, attributes) = self.parse_tag(body)?;

        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }

        if self_closing {
            self.events.push_back(XmlEvent {
                name,
                path: self.path(),
                text: String::new(),
                attributes,
            });
        } else {
            self.stack.push(OpenElement {
                name,
                attributes,
                text: String::new(),
                has_children: false,
            });
        }
        Ok(())
    }

    fn close_element(&mut self, name: &str) -> Result<(), XmlError> {
        let open = self
            .stack
            .pop()
            .ok_or_else(|| XmlError::UnexpectedClose(name.to_string()))?;
        if open.name != name {
            return Err(XmlError::MismatchedTag {
                expected: open.name,
                found: name.to_string(),
            });
        }
        let text = if open.has_children && open.text.trim().is_empty() {
            String::new()
        } else {
            open.text
        };
        self.events.push_back(XmlEvent {
            name: open.name,
            path: self.path(),
            text,
            attributes: open.attributes,
        });
        Ok(())
    }

    fn path(&self) -> Vec<String> {
        self.stack.iter().map(|e| e.name.clone()).collect()
    }

    fn parse_tag(&self, body: &str) -> Result<(String, Vec<(String, String)>), XmlError> {
        let body = body.trim_end();
        let name_end = body
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(body.len());
        let name = &body[..name_end];
        if name.is_empty() {
            return Err(XmlError::MalformedTag(body.to_string()));
        }

        let mut attributes = Vec::new();
        let mut rest = body[name_end..].trim_start();
        while !rest.is_empty() {
            let eq = rest
                .find('=')
                .ok_or_else(|| XmlError::MalformedTag(body.to_string()))?;
            let key = rest[..eq].trim();
            let after = rest[eq + 1..].trim_start();
            let quote = after
                .chars()
                .next()
                .filter(|c| *c == '"' || *c == '\'')
                .ok_or_else(|| XmlError::MalformedTag(body.to_string()))?;
            let close = after[1..]
                .find(quote)
                .ok_or_else(|| XmlError::MalformedTag(body.to_string()))?;
            let raw = &after[1..1 + close];
            let value = if self.expand_entities {
                unescape(raw)?.into_owned()
            } else {
                raw.to_string()
            };
            if key.is_empty() {
                return Err(XmlError::MalformedTag(body.to_string()));
            }
            attributes.push((key.to_string(), value));
            rest = after[close + 2..].trim_start();
        }
        Ok((name.to_string(), attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(xml: &str) -> Vec<XmlEvent> {
        let mut parser = XmlParser::new();
        parser.write(xml.as_bytes()).unwrap();
        parser.end().unwrap();
        std::iter::from_fn(|| parser.next_event()).collect()
    }

    #[test]
    fn test_simple_document() {
        let events = parse_all("<a><b>1</b><c>2</c></a>");
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(events[0].path, vec!["a".to_string()]);
        assert_eq!(events[0].text, "1");
        assert!(events[2].path.is_empty());
        assert_eq!(events[2].text, "");
    }

    #[test]
    fn test_attributes_and_self_closing() {
        let events = parse_all(r#"<Event><Volume channel="Master" val="42"/></Event>"#);
        assert_eq!(events[0].name, "Volume");
        assert_eq!(events[0].attribute("val"), Some("42"));
        assert_eq!(events[0].attribute("channel"), Some("Master"));
        assert_eq!(events[0].parent(), Some("Event"));
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let events = parse_all(r#"<a title="x > y"><b/></a>"#);
        assert_eq!(events[1].attribute("title"), Some("x > y"));
    }

    #[test]
    fn test_comments_and_declarations_are_skipped() {
        let events = parse_all(
            "<?xml version=\"1.0\"?>\r\n<!-- a <comment> -->\r\n<root><x>1</x></root>",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "x");
    }

    #[test]
    fn test_doctype_internal_subset_skipped() {
        let xml = "<?xml version=\"1.0\"?>\
                   <!DOCTYPE root [ <!ENTITY e \"v>w\"> <!ELEMENT root (x)> ]>\
                   <root><x>1</x></root>";
        let events = parse_all(xml);
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "root"]);
        assert_eq!(events[0].text, "1");

        // same document fed one byte at a time
        let mut parser = XmlParser::new();
        for b in xml.bytes() {
            parser.write(&[b]).unwrap();
        }
        parser.end().unwrap();
        assert_eq!(parser.next_event().unwrap().name, "x");
    }

    #[test]
    fn test_entities_expanded() {
        let events = parse_all("<t a=\"&quot;q&quot;\">&lt;b&gt; &amp; &#65;</t>");
        assert_eq!(events[0].text, "<b> & A");
        assert_eq!(events[0].attribute("a"), Some("\"q\""));
    }

    #[test]
    fn test_entities_kept_when_expansion_disabled() {
        let mut parser = XmlParser::new();
        parser.set_expand_entities(false);
        parser.write(b"<t>&lt;x/&gt;</t>").unwrap();
        parser.end().unwrap();
        assert_eq!(parser.next_event().unwrap().text, "&lt;x/&gt;");
    }

    #[test]
    fn test_cdata() {
        let events = parse_all("<t><![CDATA[<raw> & stuff]]></t>");
        assert_eq!(events[0].text, "<raw> & stuff");
    }

    #[test]
    fn test_split_inside_entity_and_tag() {
        let mut parser = XmlParser::new();
        for chunk in ["<ro", "ot><v a='1", "'>a&a", "mp;b</v", "></root>"] {
            parser.write(chunk.as_bytes()).unwrap();
        }
        parser.end().unwrap();
        let v = parser.next_event().unwrap();
        assert_eq!(v.text, "a&b");
        assert_eq!(v.attribute("a"), Some("1"));
    }

    #[test]
    fn test_split_inside_utf8_sequence() {
        let xml = "<t>héllo</t>".as_bytes();
        let mut parser = XmlParser::new();
        parser.write(&xml[..5]).unwrap();
        parser.write(&xml[5..]).unwrap();
        parser.end().unwrap();
        assert_eq!(parser.next_event().unwrap().text, "héllo");
    }

    #[test]
    fn test_mismatched_tag() {
        let mut parser = XmlParser::new();
        let err = parser.write(b"<a><b></a>").unwrap_err();
        assert!(matches!(err, XmlError::MismatchedTag { .. }));
    }

    #[test]
    fn test_unterminated_document() {
        let mut parser = XmlParser::new();
        parser.write(b"<a><b>text").unwrap();
        let err = parser.end().unwrap_err();
        match err {
            XmlError::UnexpectedEof(open) => assert_eq!(open, vec!["a", "b"]),
            other => panic!("unexpected error {other:?}"),
        }
        // reusable after end()
        parser.write(b"<c/>").unwrap();
        parser.end().unwrap();
        assert_eq!(parser.next_event().unwrap().name, "c");
    }

    #[test]
    fn test_token_limit() {
        let mut parser = XmlParser::with_limit(16);
        let err = parser.write(b"<a>0123456789abcdefghij</a>").unwrap_err();
        assert!(matches!(err, XmlError::TokenTooLong(16)));
    }

    #[test]
    fn test_mixed_content_whitespace_dropped() {
        let events = parse_all("<a>\n  <b>x</b>\n</a>");
        assert_eq!(events[1].text, "");
    }
}
