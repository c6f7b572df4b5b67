//! Lenient, span-tracked parsing of citation markup.
//!
//! Citation markup arrives from an upstream document parser as TEI-like XML,
//! sometimes re-serialized through an HTML pipeline. It is frequently not
//! well-formed: end tags are missing or mismatched, names are lower-cased,
//! entities are undefined. This crate wraps [`quick-xml`] to build a tree of
//! [`MarkupElement`]s from such input anyway, recording byte [`Span`]s for
//! every node.
//!
//! # Overview
//!
//! - [`MarkupDocument`]: the parsed document; a synthetic root holds every
//!   top-level node
//! - [`MarkupElement`]: an element with name, attributes and children
//! - [`MarkupAttribute`]: an attribute with its unescaped value
//! - [`MarkupNode`]: one child, either an element or a text run
//!
//! # Example
//!
//! ```rust
//! use patcit_markup::parse;
//!
//! let doc = parse(r#"<listBibl>
//!   <biblStruct type="patent"><idno>EP1234567</idno></biblStruct>
//!   <biblstruct><title level="a">On things</title>
//! </listBibl>"#).unwrap();
//!
//! let bibls = doc.find_all("biblStruct");
//! assert_eq!(bibls.len(), 2);
//! assert_eq!(bibls[0].attribute("type"), Some("patent"));
//! assert_eq!(bibls[1].text(), "On things");
//! ```
//!
//! Element and attribute names compare ASCII case-insensitively throughout
//! the tree API.

pub mod error;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use parser::{parse, parse_bytes};
pub use types::{MarkupAttribute, MarkupDocument, MarkupElement, MarkupNode, Span};
