/*
 * enrich.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-fragment enrichment with ordered fan-in.
 */

//! Enrichment Fetcher.
//!
//! A [`CitationResolver`] turns one fragment into a structured record. The
//! default [`TeiResolver`] reads the TEI structure GROBID emits; other
//! resolvers (a remote lookup service, a test double) plug in through the
//! same trait.
//!
//! [`fetch_all`] resolves all fragments of one record concurrently in a task
//! group owned by that call and returns the results in fragment order.

use async_trait::async_trait;
use patcit_markup::MarkupElement;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::dates;
use crate::error::{FetchError, StageFailure};
use crate::fragments::Fragment;
use crate::record::{CitationRecord, Flavor};

/// Resolves a fragment into a record keyed by the citing unit's primary key.
#[async_trait]
pub trait CitationResolver: Send + Sync {
    async fn resolve(
        &self,
        pk_name: &str,
        pk: &str,
        fragment: &Fragment,
    ) -> Result<CitationRecord, FetchError>;
}

/// Maps TEI `biblStruct` elements to record fields without any external
/// lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeiResolver;

#[async_trait]
impl CitationResolver for TeiResolver {
    async fn resolve(
        &self,
        pk_name: &str,
        pk: &str,
        fragment: &Fragment,
    ) -> Result<CitationRecord, FetchError> {
        let text = fragment.text();
        if text.is_empty() {
            return Err(FetchError::EmptyFragment {
                index: fragment.index,
            });
        }

        let mut record = CitationRecord::new(fragment.flavor, pk_name, pk);
        match fragment.flavor {
            Flavor::Pat => patent_fields(&mut record, &fragment.element),
            Flavor::Npl | Flavor::Bibref => npl_fields(&mut record, &fragment.element, text),
        }
        Ok(record)
    }
}

/// Resolve every fragment concurrently; slot `i` of the result holds the
/// outcome for `fragments[i]`.
///
/// A resolver error, a panic or a cancelled task fails only its own slot.
pub async fn fetch_all(
    resolver: Arc<dyn CitationResolver>,
    pk_name: &str,
    pk: &str,
    fragments: Vec<Fragment>,
) -> Vec<Result<CitationRecord, StageFailure>> {
    let mut slots: Vec<Option<Result<CitationRecord, StageFailure>>> =
        (0..fragments.len()).map(|_| None).collect();
    let mut positions = HashMap::with_capacity(fragments.len());
    let mut tasks = JoinSet::new();

    for (position, fragment) in fragments.into_iter().enumerate() {
        let resolver = Arc::clone(&resolver);
        let pk_name = pk_name.to_string();
        let pk = pk.to_string();
        let handle = tasks.spawn(async move { resolver.resolve(&pk_name, &pk, &fragment).await });
        positions.insert(handle.id(), position);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, result)) => (id, result.map_err(StageFailure::from)),
            Err(err) => {
                let failure = FetchError::Task(err.to_string());
                (err.id(), Err(StageFailure::from(failure)))
            }
        };
        if let Some(&position) = positions.get(&id) {
            slots[position] = Some(outcome);
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(StageFailure::from(FetchError::Task(
                    "task finished without a result".to_string(),
                )))
            })
        })
        .collect()
}

fn npl_fields(record: &mut CitationRecord, element: &MarkupElement, text: String) {
    for title in element.find_all("title") {
        let Some(value) = title.non_empty_text() else {
            continue;
        };
        let field = if title
            .attribute("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("abbrev"))
        {
            "title_abbrev"
        } else {
            match title.attribute("level").map(str::to_ascii_lowercase).as_deref() {
                Some("j") => "title_j",
                Some("m" | "s") => "title_m",
                _ => "title_main",
            }
        };
        if !record.contains(field) {
            record.insert(field, Value::String(value));
        }
    }

    let authors = unique(element.find_all("author").into_iter().filter_map(|author| {
        author
            .find("persName")
            .unwrap_or(author)
            .non_empty_text()
    }));
    insert_list(record, "authors", authors);
    insert_list(record, "date", tei_dates(element));

    for scope in element.find_all("biblScope") {
        match scope.attribute("unit").map(str::to_ascii_lowercase).as_deref() {
            Some("volume") => insert_text(record, "volume", scope.non_empty_text()),
            Some("issue") => insert_text(record, "issue", scope.non_empty_text()),
            Some("page") => {
                let (first, last) = page_range(scope);
                insert_text(record, "first_page", first);
                insert_text(record, "last_page", last);
            }
            _ => {}
        }
    }

    let mut urls = Vec::new();
    for idno in element.find_all("idno") {
        let value = idno.non_empty_text();
        match idno.attribute("type").map(str::to_ascii_uppercase).as_deref() {
            Some("DOI") => insert_text(record, "doi", value),
            Some("PMID") => insert_text(record, "pmid", value),
            Some("ISSN" | "EISSN") => insert_text(record, "issn", value),
            Some("ISBN") => insert_text(record, "isbn", value),
            Some("URL") => urls.extend(value),
            _ => {}
        }
    }
    urls.extend(
        element
            .find_all("ptr")
            .into_iter()
            .filter_map(|ptr| ptr.attribute("target"))
            .map(str::to_string),
    );
    insert_list(record, "url", unique(urls));

    insert_text(
        record,
        "publisher",
        element.find("publisher").and_then(MarkupElement::non_empty_text),
    );
    let biblio = element
        .find_with("note", "type", "raw_reference")
        .and_then(MarkupElement::non_empty_text)
        .unwrap_or(text);
    record.insert("npl_biblio", Value::String(biblio));
    record.insert("bibref_source", Value::String("grobid".to_string()));
}

fn patent_fields(record: &mut CitationRecord, element: &MarkupElement) {
    let orgname = element
        .find("authority")
        .unwrap_or(element)
        .find("orgName")
        .and_then(MarkupElement::non_empty_text);
    let original = element
        .find_with("idno", "subtype", "original")
        .and_then(MarkupElement::non_empty_text);
    let epodoc = element
        .find_with("idno", "subtype", "epodoc")
        .and_then(MarkupElement::non_empty_text);
    let kind_code = element
        .find_with("classCode", "scheme", "kindCode")
        .and_then(MarkupElement::non_empty_text);
    let status = element
        .attribute("status")
        .map(str::to_string)
        .or_else(|| {
            element
                .find_with("note", "type", "status")
                .and_then(MarkupElement::non_empty_text)
        });

    let pubnum = publication_number(orgname.as_deref(), epodoc.as_deref(), original.as_deref(), kind_code.as_deref());

    insert_text(record, "orgname", orgname);
    insert_text(record, "original", original);
    insert_text(record, "epodoc", epodoc);
    insert_text(record, "kind_code", kind_code);
    insert_text(record, "status", status);
    insert_list(record, "date", tei_dates(element));
    insert_text(record, "pubnum", pubnum);
}

/// `CC-NUMBER[-KIND]`, upper-cased, from the epodoc number, else from the
/// digits and letters of the original. A leading country code is dropped.
fn publication_number(
    orgname: Option<&str>,
    epodoc: Option<&str>,
    original: Option<&str>,
    kind_code: Option<&str>,
) -> Option<String> {
    let country = orgname?.trim().to_ascii_uppercase();
    let strip_country = |raw: &str| {
        let compact: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_uppercase();
        compact
            .strip_prefix(&country)
            .map(str::to_string)
            .unwrap_or(compact)
    };
    let number = epodoc
        .or(original)
        .map(strip_country)
        .filter(|n| !n.is_empty())?;

    Some(match kind_code.map(str::trim).filter(|k| !k.is_empty()) {
        Some(kind) => format!("{}-{}-{}", country, number, kind.to_ascii_uppercase()),
        None => format!("{}-{}", country, number),
    })
}

fn tei_dates(element: &MarkupElement) -> Vec<String> {
    let tokens: Vec<String> = element
        .find_all("date")
        .into_iter()
        .filter_map(|date| {
            date.attribute("when")
                .map(str::to_string)
                .or_else(|| date.non_empty_text())
        })
        .collect();
    dates::canonical_dates(tokens.iter().map(String::as_str))
}

/// `from`/`to` attributes, else `"100-110"` style text.
fn page_range(scope: &MarkupElement) -> (Option<String>, Option<String>) {
    let from = scope.attribute("from").map(str::to_string);
    let to = scope.attribute("to").map(str::to_string);
    if from.is_some() || to.is_some() {
        return (from, to);
    }
    let Some(text) = scope.non_empty_text() else {
        return (None, None);
    };
    match text.split_once(['-', '–']) {
        Some((first, last)) => (
            Some(first.trim().to_string()),
            Some(last.trim().to_string()),
        ),
        None => (Some(text), None),
    }
}

fn insert_text(record: &mut CitationRecord, field: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        if !record.contains(field) {
            record.insert(field, Value::String(value));
        }
    }
}

fn insert_list(record: &mut CitationRecord, field: &str, values: Vec<String>) {
    if !values.is_empty() {
        record.insert(field, Value::from(values));
    }
}

fn unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::extract_fragments;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const NPL_REFERENCE: &str = r#"
    <biblStruct xml:id="b0">
      <analytic>
        <title level="a" type="main">Deep residual learning for image recognition</title>
        <author><persName><forename type="first">Kaiming</forename><surname>He</surname></persName></author>
        <author><persName><forename type="first">Xiangyu</forename><surname>Zhang</surname></persName></author>
        <idno type="DOI">10.1109/CVPR.2016.90</idno>
      </analytic>
      <monogr>
        <title level="m">Proceedings of CVPR</title>
        <title level="j" type="abbrev">CVPR</title>
        <imprint>
          <publisher>IEEE</publisher>
          <biblScope unit="page" from="770" to="778" />
          <date type="published" when="2016-06-27" />
        </imprint>
      </monogr>
      <note type="raw_reference">K. He et al., Deep residual learning, CVPR 2016, pp. 770-778.</note>
    </biblStruct>"#;

    const PAT_REFERENCE: &str = r#"
    <biblStruct type="patent" status="application">
      <monogr>
        <authority><orgName type="regional">EP</orgName></authority>
        <idno subtype="original">EP 1 234 567</idno>
        <idno subtype="epodoc">EP1234567</idno>
        <classCode scheme="kindCode">A1</classCode>
        <date type="publication" when="2002-08-28" />
      </monogr>
    </biblStruct>"#;

    fn only_fragment(markup: &str) -> Fragment {
        let fragments = extract_fragments(Some(markup)).unwrap();
        fragments.npl.into_iter().chain(fragments.pat).next().unwrap()
    }

    #[tokio::test]
    async fn test_npl_fields() {
        let fragment = only_fragment(NPL_REFERENCE);
        let record = TeiResolver.resolve("npl_publn_id", "42", &fragment).await.unwrap();
        assert_eq!(
            record.to_value(),
            json!({
                "npl_publn_id": "42",
                "title_main": "Deep residual learning for image recognition",
                "title_m": "Proceedings of CVPR",
                "title_abbrev": "CVPR",
                "authors": ["Kaiming He", "Xiangyu Zhang"],
                "date": ["20160627"],
                "first_page": "770",
                "last_page": "778",
                "doi": "10.1109/CVPR.2016.90",
                "publisher": "IEEE",
                "npl_biblio": "K. He et al., Deep residual learning, CVPR 2016, pp. 770-778.",
                "bibref_source": "grobid"
            })
        );
    }

    #[tokio::test]
    async fn test_patent_fields() {
        let fragment = only_fragment(PAT_REFERENCE);
        let record = TeiResolver
            .resolve("publication_number", "US-2010-A1", &fragment)
            .await
            .unwrap();
        assert_eq!(
            record.to_value(),
            json!({
                "publication_number": "US-2010-A1",
                "orgname": "EP",
                "original": "EP 1 234 567",
                "epodoc": "EP1234567",
                "kind_code": "A1",
                "status": "application",
                "date": ["20020828"],
                "pubnum": "EP-1234567-A1"
            })
        );
    }

    #[tokio::test]
    async fn test_empty_fragment_is_an_error() {
        let fragment = only_fragment("<biblStruct><monogr/></biblStruct>");
        let err = TeiResolver.resolve("npl_publn_id", "1", &fragment).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyFragment { index: 0 }));
    }

    #[test]
    fn test_page_text_range() {
        let fragment = only_fragment(r#"<biblStruct><biblScope unit="page">100-110</biblScope></biblStruct>"#);
        let scope = fragment.element.find("biblScope").unwrap();
        assert_eq!(
            page_range(scope),
            (Some("100".to_string()), Some("110".to_string()))
        );
    }

    #[test]
    fn test_publication_number_from_original() {
        assert_eq!(
            publication_number(Some("us"), None, Some("US 5,000,000"), None).as_deref(),
            Some("US-5000000")
        );
        assert_eq!(
            publication_number(Some("DE"), Some("de102004"), None, Some("b4")).as_deref(),
            Some("DE-102004-B4")
        );
        assert_eq!(publication_number(None, Some("EP1"), None, None), None);
    }
}
