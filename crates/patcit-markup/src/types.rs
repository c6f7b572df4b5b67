//! Core types for span-tracked markup trees.

/// Name given to the synthetic element that holds a document's top-level nodes.
pub const DOCUMENT_ROOT: &str = "#document";

/// A half-open byte range `[start, end)` into the parsed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slice of `source` this span covers, if it lies on char boundaries.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

/// A parsed markup document.
///
/// Well-formed XML has one top-level element, but citation markup often has
/// several (or none, just text). All of them are children of [`root`],
/// a synthetic element named [`DOCUMENT_ROOT`] spanning the whole input.
///
/// [`root`]: MarkupDocument::root
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    pub root: MarkupElement,

    /// Number of structural problems the parser recovered from.
    pub recovered: usize,
}

/// An element with span tracking.
#[derive(Debug, Clone)]
pub struct MarkupElement {
    /// Local name as written in the source (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "tei" in `<tei:title>`).
    pub prefix: Option<String>,

    pub attributes: Vec<MarkupAttribute>,

    pub children: Vec<MarkupNode>,

    /// From the `<` of the start tag to the `>` of the end tag, or to the
    /// point where the element was implicitly closed.
    pub span: Span,
}

/// An attribute with its unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttribute {
    pub name: String,
    pub prefix: Option<String>,
    pub value: String,
}

/// One child of an element.
#[derive(Debug, Clone)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text { content: String, span: Span },
}

impl MarkupDocument {
    /// All descendant elements named `name`, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&MarkupElement> {
        self.root.find_all(name)
    }

    /// The first descendant element named `name`.
    pub fn find(&self, name: &str) -> Option<&MarkupElement> {
        self.root.find(name)
    }

    /// Whitespace-normalized text of the whole document.
    pub fn text(&self) -> String {
        self.root.text()
    }

    /// True if the document contains no elements and no non-blank text.
    pub fn is_blank(&self) -> bool {
        self.root.children.iter().all(|child| match child {
            MarkupNode::Element(_) => false,
            MarkupNode::Text { content, .. } => content.trim().is_empty(),
        })
    }
}

impl MarkupElement {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            attributes: Vec::new(),
            children: Vec::new(),
            span,
        }
    }

    /// ASCII case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Get an attribute value by (case-insensitive) local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Direct child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &MarkupElement> {
        self.children.iter().filter_map(|child| match child {
            MarkupNode::Element(e) => Some(e),
            MarkupNode::Text { .. } => None,
        })
    }

    /// Direct child elements named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MarkupElement> {
        self.elements().filter(move |e| e.is_named(name))
    }

    /// All descendant elements named `name` (excluding `self`), in document order.
    ///
    /// A match nested inside another match is returned as well; use
    /// [`find_outermost`](Self::find_outermost) to stop descending at a match.
    pub fn find_all(&self, name: &str) -> Vec<&MarkupElement> {
        let mut found = Vec::new();
        self.collect(name, true, &mut found);
        found
    }

    /// Descendant elements named `name` that have no ancestor of the same name
    /// below `self`, in document order.
    pub fn find_outermost(&self, name: &str) -> Vec<&MarkupElement> {
        let mut found = Vec::new();
        self.collect(name, false, &mut found);
        found
    }

    /// The first descendant element named `name`, depth-first.
    pub fn find(&self, name: &str) -> Option<&MarkupElement> {
        for child in self.elements() {
            if child.is_named(name) {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// The first descendant named `name` whose attribute `attr` equals `value`
    /// (attribute values compare case-insensitively).
    pub fn find_with(&self, name: &str, attr: &str, value: &str) -> Option<&MarkupElement> {
        self.find_all(name).into_iter().find(|e| {
            e.attribute(attr)
                .is_some_and(|v| v.eq_ignore_ascii_case(value))
        })
    }

    /// Concatenated descendant text with runs of whitespace collapsed to a
    /// single space and the ends trimmed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// [`text`](Self::text), or `None` when it is empty.
    pub fn non_empty_text(&self) -> Option<String> {
        let text = self.text();
        if text.is_empty() { None } else { Some(text) }
    }

    fn collect<'a>(&'a self, name: &str, nested: bool, found: &mut Vec<&'a MarkupElement>) {
        for child in self.elements() {
            if child.is_named(name) {
                found.push(child);
                if !nested {
                    continue;
                }
            }
            child.collect(name, nested, found);
        }
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                MarkupNode::Element(e) => {
                    // Element boundaries separate words even without whitespace.
                    out.push(' ');
                    e.collect_text(out);
                    out.push(' ');
                }
                MarkupNode::Text { content, .. } => out.push_str(content),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, text: &str) -> MarkupElement {
        let mut e = MarkupElement::new(name, Span::default());
        e.children.push(MarkupNode::Text {
            content: text.to_string(),
            span: Span::default(),
        });
        e
    }

    #[test]
    fn test_text_collapses_whitespace_and_separates_elements() {
        let mut persname = MarkupElement::new("persName", Span::default());
        persname
            .children
            .push(MarkupNode::Element(leaf("forename", "  Ada\n")));
        persname
            .children
            .push(MarkupNode::Element(leaf("surname", "Lovelace")));

        assert_eq!(persname.text(), "Ada Lovelace");
    }

    #[test]
    fn test_names_compare_case_insensitively() {
        let mut root = MarkupElement::new("root", Span::default());
        root.children
            .push(MarkupNode::Element(leaf("biblstruct", "x")));

        assert!(root.find("biblStruct").is_some());
        assert_eq!(root.children_named("BIBLSTRUCT").count(), 1);
    }

    #[test]
    fn test_find_outermost_stops_at_match() {
        let mut inner = MarkupElement::new("biblStruct", Span::default());
        inner.children.push(MarkupNode::Element(leaf("title", "t")));
        let mut outer = MarkupElement::new("biblStruct", Span::default());
        outer.children.push(MarkupNode::Element(inner));
        let mut root = MarkupElement::new("root", Span::default());
        root.children.push(MarkupNode::Element(outer));

        assert_eq!(root.find_all("biblStruct").len(), 2);
        assert_eq!(root.find_outermost("biblStruct").len(), 1);
    }

    #[test]
    fn test_span_slice() {
        let span = Span::new(1, 4);
        assert_eq!(span.slice("<ab>"), Some("ab>"));
        assert_eq!(span.len(), 3);
        assert!(Span::new(3, 3).is_empty());
    }
}
