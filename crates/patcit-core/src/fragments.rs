/*
 * fragments.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Splits citation markup into flavor-tagged fragments.
 */

use patcit_markup::{MarkupDocument, MarkupElement};

use crate::error::StageFailure;
use crate::record::Flavor;

const BIBL_STRUCT: &str = "biblStruct";

/// One candidate citation taken from markup.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub flavor: Flavor,
    /// Position within its flavor's sequence.
    pub index: usize,
    pub element: MarkupElement,
}

impl Fragment {
    pub fn text(&self) -> String {
        self.element.text()
    }
}

/// The fragments of one markup document, split by flavor.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    pub pat: Vec<Fragment>,
    pub npl: Vec<Fragment>,
    /// Root of a non-blank document, kept for markup without `biblStruct`.
    root: Option<MarkupElement>,
}

impl Fragments {
    pub fn is_empty(&self) -> bool {
        self.pat.is_empty() && self.npl.is_empty()
    }

    /// The fragment describing a single NPL citation: the first NPL
    /// `biblStruct`, else the whole document when it has no `biblStruct` at
    /// all. `None` for blank markup.
    pub fn primary_npl(&self) -> Option<Fragment> {
        if let Some(first) = self.npl.first() {
            return Some(first.clone());
        }
        if !self.pat.is_empty() {
            return None;
        }
        self.root.as_ref().map(|root| Fragment {
            flavor: Flavor::Npl,
            index: 0,
            element: root.clone(),
        })
    }
}

/// Parse `markup` and collect its outermost `biblStruct` elements, in
/// document order. `type="patent"` marks a patent citation; everything else
/// is non-patent literature.
pub fn extract_fragments(markup: Option<&str>) -> Result<Fragments, StageFailure> {
    let Some(markup) = markup.filter(|m| !m.trim().is_empty()) else {
        return Ok(Fragments::default());
    };

    let document = patcit_markup::parse(markup)
        .map_err(|e| StageFailure::Extraction(format!("unreadable markup: {}", e)))?;
    if document.recovered > 0 {
        tracing::debug!(recovered = document.recovered, "recovered from malformed markup");
    }
    Ok(split(document))
}

fn split(document: MarkupDocument) -> Fragments {
    let mut fragments = Fragments::default();
    for element in document.root.find_outermost(BIBL_STRUCT) {
        let is_patent = element
            .attribute("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("patent"));
        let (flavor, sequence) = if is_patent {
            (Flavor::Pat, &mut fragments.pat)
        } else {
            (Flavor::Npl, &mut fragments.npl)
        };
        sequence.push(Fragment {
            flavor,
            index: sequence.len(),
            element: element.clone(),
        });
    }
    if !document.is_blank() {
        fragments.root = Some(document.root);
    }
    fragments
}
