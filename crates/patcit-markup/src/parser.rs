//! Lenient parser that builds [`MarkupDocument`] trees.

use crate::types::DOCUMENT_ROOT;
use crate::{Error, MarkupAttribute, MarkupDocument, MarkupElement, MarkupNode, Result, Span};
use quick_xml::Reader;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

/// Parse markup from a string.
///
/// Never fails on structural problems: mismatched end tags close the nearest
/// open element of the same name (or are dropped when none is open), elements
/// still open at the end of input are closed there, and undefined entities
/// are kept as raw text.
///
/// # Example
///
/// ```rust
/// use patcit_markup::parse;
///
/// let doc = parse("<a><b>one<c>two</a>").unwrap();
/// let a = doc.find("a").unwrap();
/// assert_eq!(a.text(), "one two");
/// assert_eq!(doc.recovered, 2);
/// ```
///
/// # Errors
///
/// Returns [`Error::Syntax`] only when the reader fails before a single node
/// could be recovered.
pub fn parse(content: &str) -> Result<MarkupDocument> {
    MarkupParser::new(content).parse()
}

/// Parse markup from raw bytes, which must be valid UTF-8.
pub fn parse_bytes(content: &[u8]) -> Result<MarkupDocument> {
    let content = std::str::from_utf8(content)?;
    parse(content)
}

/// Internal parser state.
struct MarkupParser<'a> {
    source: &'a str,

    reader: Reader<&'a [u8]>,

    /// Elements currently open, innermost last.
    stack: Vec<BuildNode>,

    /// Top-level nodes, children of the synthetic document root.
    top: Vec<MarkupNode>,

    recovered: usize,
}

/// A node being constructed during parsing.
struct BuildNode {
    name: String,
    prefix: Option<String>,
    attributes: Vec<MarkupAttribute>,
    /// Byte offset of the `<` that opened this element.
    start_offset: usize,
    children: Vec<MarkupNode>,
}

impl BuildNode {
    fn finish(self, end_offset: usize) -> MarkupElement {
        MarkupElement {
            name: self.name,
            prefix: self.prefix,
            attributes: self.attributes,
            children: self.children,
            span: Span::new(self.start_offset, end_offset),
        }
    }
}

impl<'a> MarkupParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        // End tags are matched by hand so mismatches can be repaired.
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            source,
            reader,
            stack: Vec::new(),
            top: Vec::new(),
            recovered: 0,
        }
    }

    fn parse(mut self) -> Result<MarkupDocument> {
        loop {
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(&e, event_start),
                Ok(Event::End(e)) => self.handle_end(&e, event_start),
                Ok(Event::Empty(e)) => {
                    let end_offset = self.reader.buffer_position() as usize;
                    let node = self.open(&e, event_start);
                    let element = node.finish(end_offset);
                    self.attach(MarkupNode::Element(element));
                }
                Ok(Event::Text(e)) => self.handle_text(&e, event_start),
                Ok(Event::CData(e)) => {
                    let end_offset = self.reader.buffer_position() as usize;
                    self.attach(MarkupNode::Text {
                        content: String::from_utf8_lossy(&e).into_owned(),
                        span: Span::new(event_start, end_offset),
                    });
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(err) => {
                    if self.stack.is_empty() && self.top.is_empty() {
                        return Err(Error::Syntax {
                            message: err.to_string(),
                            position: Some(self.reader.error_position()),
                        });
                    }
                    tracing::debug!(
                        position = self.reader.error_position(),
                        "markup reader stopped early: {}",
                        err
                    );
                    self.recovered += 1;
                    break;
                }
            }
        }

        let end_offset = self.source.len();
        if !self.stack.is_empty() {
            self.recovered += self.stack.len();
            self.close_to(0, end_offset);
        }

        let mut root = MarkupElement::new(DOCUMENT_ROOT, Span::new(0, end_offset));
        root.children = self.top;

        Ok(MarkupDocument {
            root,
            recovered: self.recovered,
        })
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, event_start: usize) {
        let node = self.open(e, event_start);
        self.stack.push(node);
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>, event_start: usize) {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let local_name = full_name.split(':').next_back().unwrap_or(&full_name);

        let matching = self
            .stack
            .iter()
            .rposition(|node| node.name.eq_ignore_ascii_case(local_name));

        match matching {
            Some(depth) => {
                // Anything opened after the matching element is closed
                // where the end tag begins.
                let implicit = self.stack.len() - depth - 1;
                if implicit > 0 {
                    self.recovered += implicit;
                    self.close_to(depth + 1, event_start);
                }
                let end_offset = self.reader.buffer_position() as usize;
                self.close_to(depth, end_offset);
            }
            None => {
                self.recovered += 1;
            }
        }
    }

    fn handle_text(&mut self, e: &BytesText<'_>, event_start: usize) {
        let content = match e.unescape() {
            Ok(text) => text.into_owned(),
            Err(_) => {
                self.recovered += 1;
                String::from_utf8_lossy(e).into_owned()
            }
        };
        let end_offset = self.reader.buffer_position() as usize;
        self.attach(MarkupNode::Text {
            content,
            span: Span::new(event_start, end_offset),
        });
    }

    /// Close every open element at stack depth `depth` and deeper, innermost
    /// first, attaching each to its parent.
    fn close_to(&mut self, depth: usize, end_offset: usize) {
        while self.stack.len() > depth {
            let Some(node) = self.stack.pop() else {
                break;
            };
            let element = node.finish(end_offset);
            self.attach(MarkupNode::Element(element));
        }
    }

    fn attach(&mut self, node: MarkupNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.top.push(node),
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, event_start: usize) -> BuildNode {
        let (name, prefix) = split_name(&String::from_utf8_lossy(e.name().as_ref()));
        let attributes = self.parse_attributes(e);

        BuildNode {
            name,
            prefix,
            attributes,
            start_offset: event_start,
            children: Vec::new(),
        }
    }

    fn parse_attributes(&mut self, e: &BytesStart<'_>) -> Vec<MarkupAttribute> {
        let mut attributes = Vec::new();

        for attr_result in e.attributes().with_checks(false) {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(_) => {
                    // Unquoted or malformed attributes end attribute parsing
                    // for this tag; the element itself is kept.
                    self.recovered += 1;
                    break;
                }
            };

            let (name, prefix) = split_name(&String::from_utf8_lossy(attr.key.as_ref()));
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => {
                    self.recovered += 1;
                    String::from_utf8_lossy(&attr.value).into_owned()
                }
            };

            attributes.push(MarkupAttribute {
                name,
                prefix,
                value,
            });
        }

        attributes
    }
}

fn split_name(full_name: &str) -> (String, Option<String>) {
    match full_name.split_once(':') {
        Some((prefix, local)) => (local.to_string(), Some(prefix.to_string())),
        None => (full_name.to_string(), None),
    }
}
