/*
 * models.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Inference contracts and the bundled lightweight models.
 */

//! Model collaborators.
//!
//! The pipeline only depends on three inference contracts:
//! [`LanguageIdentifier`], [`CategoryClassifier`] and [`SpanExtractor`].
//! Models are loaded once per run and shared read-only through `Arc`.
//!
//! The bundled implementations are small heuristic models. Each can be
//! loaded from a JSON model file; without one the built-in tables are used.
//!
//! | model | file format |
//! |---|---|
//! | [`StopwordIdentifier`] | `{"languages": [{"name", "code", "stopwords": [..]}]}` |
//! | [`KeywordClassifier`] | `{"labels": {"LABEL": ["keyword", ..]}}` |
//! | [`PatternExtractor`] | `{"patterns": {"LABEL": ["regex", ..]}}` |

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use crate::error::ModelError;

/// Output of language identification.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub is_reliable: bool,
    pub language: String,
    pub code: String,
    pub percent: f64,
    pub score: f64,
}

impl LanguageGuess {
    pub fn unknown() -> Self {
        Self {
            is_reliable: false,
            language: "Unknown".to_string(),
            code: "un".to_string(),
            percent: 0.0,
            score: 0.0,
        }
    }
}

/// A labeled span of text found by a [`SpanExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub label: String,
    pub text: String,
}

impl EntitySpan {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, text: &str) -> Result<LanguageGuess, ModelError>;
}

/// Returns `(label, probability)` pairs, most probable first.
pub trait CategoryClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<(String, f64)>, ModelError>;
}

/// Returns labeled spans in the order they were found.
pub trait SpanExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<EntitySpan>, ModelError>;
}

fn read_model<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ModelError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

// -- Language identification --------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageProfile {
    pub name: String,
    pub code: String,
    pub stopwords: Vec<String>,
}

#[derive(Deserialize)]
struct StopwordModel {
    languages: Vec<LanguageProfile>,
}

const BUILTIN_LANGUAGES: &[(&str, &str, &[&str])] = &[
    (
        "ENGLISH",
        "en",
        &[
            "the", "and", "of", "for", "with", "from", "this", "that", "are", "was", "were",
            "using", "based", "on", "in", "an", "by", "its", "their", "between", "study",
        ],
    ),
    (
        "FRENCH",
        "fr",
        &[
            "le", "la", "les", "des", "du", "et", "une", "pour", "dans", "sur", "avec", "par",
            "est", "aux", "au", "étude", "selon", "leur",
        ],
    ),
    (
        "GERMAN",
        "de",
        &[
            "der", "die", "das", "und", "von", "mit", "für", "ist", "ein", "eine", "den", "dem",
            "zur", "zum", "bei", "über", "auf", "im",
        ],
    ),
    (
        "SPANISH",
        "es",
        &[
            "el", "los", "las", "del", "y", "para", "con", "una", "por", "como", "entre", "sobre",
            "estudio", "según", "su",
        ],
    ),
    (
        "ITALIAN",
        "it",
        &[
            "il", "gli", "della", "delle", "dei", "di", "per", "con", "una", "nel", "nella", "sul",
            "tra", "studio", "che",
        ],
    ),
    (
        "DUTCH",
        "nl",
        &[
            "het", "een", "van", "voor", "met", "en", "op", "bij", "naar", "uit", "onderzoek", "zijn",
            "wordt", "deze",
        ],
    ),
    (
        "PORTUGUESE",
        "pt",
        &[
            "os", "das", "dos", "uma", "para", "com", "não", "pelo", "pela", "em", "estudo", "sobre",
            "entre", "são",
        ],
    ),
];

/// Stop-word frequency language identifier.
///
/// The language with the most stop-word hits wins. The guess is reliable
/// when it has at least two hits and strictly more than the runner-up.
#[derive(Debug, Clone)]
pub struct StopwordIdentifier {
    languages: Vec<LanguageProfile>,
}

impl Default for StopwordIdentifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StopwordIdentifier {
    pub fn builtin() -> Self {
        let languages = BUILTIN_LANGUAGES
            .iter()
            .map(|(name, code, stopwords)| LanguageProfile {
                name: name.to_string(),
                code: code.to_string(),
                stopwords: stopwords.iter().map(|w| w.to_string()).collect(),
            })
            .collect();
        Self { languages }
    }

    pub fn from_profiles(languages: Vec<LanguageProfile>) -> Self {
        let languages = languages
            .into_iter()
            .map(|mut profile| {
                profile.stopwords = profile.stopwords.iter().map(|w| w.to_lowercase()).collect();
                profile
            })
            .collect();
        Self { languages }
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let model: StopwordModel = read_model(path)?;
        Ok(Self::from_profiles(model.languages))
    }
}

impl LanguageIdentifier for StopwordIdentifier {
    fn identify(&self, text: &str) -> Result<LanguageGuess, ModelError> {
        let tokens: Vec<String> = words(text).collect();
        if tokens.is_empty() {
            return Ok(LanguageGuess::unknown());
        }

        let mut hits: Vec<(usize, &LanguageProfile)> = self
            .languages
            .iter()
            .map(|profile| {
                let count = tokens
                    .iter()
                    .filter(|token| profile.stopwords.contains(*token))
                    .count();
                (count, profile)
            })
            .collect();
        // Stable sort: ties keep the profile order.
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        let Some(&(best, profile)) = hits.first() else {
            return Ok(LanguageGuess::unknown());
        };
        if best == 0 {
            return Ok(LanguageGuess::unknown());
        }
        let runner_up = hits.get(1).map_or(0, |(count, _)| *count);

        let share = best as f64 / tokens.len() as f64;
        Ok(LanguageGuess {
            is_reliable: best >= 2 && best > runner_up,
            language: profile.name.clone(),
            code: profile.code.clone(),
            percent: (share * 100.0).round(),
            score: share,
        })
    }
}

// -- Category classification --------------------------------------------------

#[derive(Deserialize)]
struct KeywordModel {
    labels: IndexMap<String, Vec<String>>,
}

const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BIBLIOGRAPHICAL_REFERENCE",
        &["journal", "proceedings", "vol", "pp", "conference", "review", "letters", "press", "university"],
    ),
    ("DATABASE", &["genbank", "accession", "database", "embl", "uniprot", "sequence", "ncbi"]),
    ("WIKI", &["wikipedia", "wiki"]),
    ("WEBPAGE", &["http", "https", "www", "retrieved", "internet", "website", "online"]),
    ("NORM_STANDARD", &["iso", "ieee std", "standard", "3gpp", "rfc", "recommendation", "itu"]),
    ("PRODUCT_DOCUMENTATION", &["datasheet", "manual", "catalog", "catalogue", "brochure", "user guide"]),
    ("OFFICE_ACTION", &["office action", "communication pursuant", "examiner"]),
    ("SEARCH_REPORT", &["search report", "written opinion"]),
    ("LITIGATION", &["court", "plaintiff", "defendant", "v."]),
];

/// Keyword-share category classifier.
///
/// Each label scores the number of its keywords present in the lower-cased
/// text; probabilities are the label's share of all hits.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    labels: IndexMap<String, Vec<String>>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordClassifier {
    pub fn builtin() -> Self {
        Self::from_labels(
            BUILTIN_CATEGORIES
                .iter()
                .map(|(label, keywords)| {
                    (label.to_string(), keywords.iter().map(|k| k.to_string()).collect())
                })
                .collect(),
        )
    }

    pub fn from_labels(labels: IndexMap<String, Vec<String>>) -> Self {
        let labels = labels
            .into_iter()
            .map(|(label, keywords)| (label, keywords.iter().map(|k| k.to_lowercase()).collect()))
            .collect();
        Self { labels }
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let model: KeywordModel = read_model(path)?;
        Ok(Self::from_labels(model.labels))
    }

    fn hits(keywords: &[String], lower: &str, tokens: &[String]) -> usize {
        keywords
            .iter()
            .filter(|keyword| {
                if keyword.contains(' ') || keyword.contains('.') {
                    lower.contains(keyword.as_str())
                } else {
                    tokens.contains(*keyword)
                }
            })
            .count()
    }
}

impl CategoryClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Vec<(String, f64)>, ModelError> {
        let lower = text.to_lowercase();
        let tokens: Vec<String> = words(&lower).collect();
        let counts: Vec<(String, usize)> = self
            .labels
            .iter()
            .map(|(label, keywords)| (label.clone(), Self::hits(keywords, &lower, &tokens)))
            .collect();

        let total: usize = counts.iter().map(|(_, count)| count).sum();
        let mut scored: Vec<(String, f64)> = counts
            .into_iter()
            .map(|(label, count)| {
                let probability = if total == 0 { 0.0 } else { count as f64 / total as f64 };
                (label, probability)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }
}

// -- Span extraction -----------------------------------------------------------

#[derive(Deserialize)]
struct PatternModel {
    patterns: IndexMap<String, Vec<String>>,
}

const MONTH: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?";

fn builtin_patterns() -> Vec<(&'static str, Vec<String>)> {
    vec![
        (
            "DATE",
            vec![
                r"\b\d{4}[-/]\d{2}[-/]\d{2}\b".to_string(),
                r"\b\d{1,2}\.\d{1,2}\.\d{4}\b".to_string(),
                format!(r"\b{MONTH} \d{{1,2}}, \d{{4}}\b"),
                format!(r"\b\d{{1,2}} {MONTH} \d{{4}}\b"),
            ],
        ),
        (
            "NAME",
            vec![
                r"(?i)\b(GenBank|EMBL|DDBJ|UniProt(?:KB)?|Swiss-Prot|PDB|RefSeq|PubChem|dbSNP|Ensembl|NCBI)\b"
                    .to_string(),
            ],
        ),
        (
            "ACC_NUM",
            vec![r"\b(?:[A-Z]{1,2}\d{5,6}|[A-Z]{2}_\d{6,9})(?:\.\d+)?\b".to_string()],
        ),
        (
            "ITEM",
            vec![r#""([^"]{3,})""#.to_string(), "\u{201c}([^\u{201d}]{3,})\u{201d}".to_string()],
        ),
    ]
}

/// Regular-expression span extractor.
///
/// A pattern with a capture group yields the text of group 1; otherwise the
/// whole match.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    patterns: Vec<(String, Vec<Regex>)>,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternExtractor {
    pub fn builtin() -> Self {
        let patterns = builtin_patterns()
            .into_iter()
            .map(|(label, sources)| {
                let compiled = sources
                    .iter()
                    .map(|source| Regex::new(source).expect("built-in pattern is valid"))
                    .collect();
                (label.to_string(), compiled)
            })
            .collect();
        Self { patterns }
    }

    pub fn from_patterns(
        patterns: IndexMap<String, Vec<String>>,
        origin: &Path,
    ) -> Result<Self, ModelError> {
        let patterns = patterns
            .into_iter()
            .map(|(label, sources)| -> Result<(String, Vec<Regex>), ModelError> {
                let compiled = sources
                    .iter()
                    .map(|source| {
                        Regex::new(source).map_err(|e| ModelError::Format {
                            path: origin.to_path_buf(),
                            message: format!("label {}: {}", label, e),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((label, compiled))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Ok(Self { patterns })
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let model: PatternModel = read_model(path)?;
        Self::from_patterns(model.patterns, path)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(label, _)| label.as_str())
    }
}

impl SpanExtractor for PatternExtractor {
    fn extract(&self, text: &str) -> Result<Vec<EntitySpan>, ModelError> {
        let mut spans = Vec::new();
        for (label, regexes) in &self.patterns {
            for regex in regexes {
                for captures in regex.captures_iter(text) {
                    let matched = captures.get(1).or_else(|| captures.get(0));
                    if let Some(m) = matched {
                        spans.push(EntitySpan::new(label.as_str(), m.as_str()));
                    }
                }
            }
        }
        Ok(spans)
    }
}

/// The language identifier for a model handle, or the built-in one.
pub fn load_language_identifier(path: Option<&Path>) -> Result<Arc<dyn LanguageIdentifier>, ModelError> {
    Ok(match path {
        Some(path) => Arc::new(StopwordIdentifier::from_path(path)?),
        None => Arc::new(StopwordIdentifier::builtin()),
    })
}

/// The category classifier for a model handle, or the built-in one.
pub fn load_category_classifier(path: Option<&Path>) -> Result<Arc<dyn CategoryClassifier>, ModelError> {
    Ok(match path {
        Some(path) => Arc::new(KeywordClassifier::from_path(path)?),
        None => Arc::new(KeywordClassifier::builtin()),
    })
}

/// The span extractor for a model handle, or the built-in one.
pub fn load_span_extractor(path: Option<&Path>) -> Result<Arc<dyn SpanExtractor>, ModelError> {
    Ok(match path {
        Some(path) => Arc::new(PatternExtractor::from_path(path)?),
        None => Arc::new(PatternExtractor::builtin()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_identifies_english_and_french() {
        let identifier = StopwordIdentifier::builtin();
        let guess = identifier
            .identify("A study of the effects of aspirin on the heart, Journal of Medicine")
            .unwrap();
        assert_eq!(guess.code, "en");
        assert_eq!(guess.language, "ENGLISH");
        assert!(guess.is_reliable);
        assert!(guess.percent > 0.0 && guess.percent <= 100.0);

        let guess = identifier
            .identify("Étude sur les effets de la lumière dans les cellules et des tissus")
            .unwrap();
        assert_eq!(guess.code, "fr");
    }

    #[test]
    fn test_no_stopwords_is_unknown() {
        let identifier = StopwordIdentifier::builtin();
        assert_eq!(identifier.identify("GenBank AB123456").unwrap(), LanguageGuess::unknown());
        assert_eq!(identifier.identify("").unwrap().code, "un");
    }

    #[test]
    fn test_keyword_classifier_shares() {
        let classifier = KeywordClassifier::builtin();
        let scored = classifier
            .classify("Smith, Journal of Physics, vol. 3, pp. 1-9")
            .unwrap();
        assert_eq!(scored[0].0, "BIBLIOGRAPHICAL_REFERENCE");
        assert!((scored[0].1 - 1.0).abs() < f64::EPSILON);

        let scored = classifier.classify("nothing to see").unwrap();
        assert!(scored.iter().all(|(_, p)| *p == 0.0));
    }

    #[test]
    fn test_pattern_extractor_builtin() {
        let extractor = PatternExtractor::builtin();
        let spans = extractor
            .extract("GenBank accession AB123456.1, released 12 March 2003 as \"Mouse genome\"")
            .unwrap();
        assert!(spans.contains(&EntitySpan::new("NAME", "GenBank")));
        assert!(spans.contains(&EntitySpan::new("ACC_NUM", "AB123456.1")));
        assert!(spans.contains(&EntitySpan::new("DATE", "12 March 2003")));
        assert!(spans.contains(&EntitySpan::new("ITEM", "Mouse genome")));
    }

    #[test]
    fn test_models_load_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("patterns.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"patterns": {{"CODE": ["X-(\\d+)"]}}}}"#).unwrap();
        let extractor = load_span_extractor(Some(path.as_path())).unwrap();
        assert_eq!(
            extractor.extract("see X-42").unwrap(),
            vec![EntitySpan::new("CODE", "42")]
        );

        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"labels": {"WIKI": ["Wikipedia"]}}"#).unwrap();
        let classifier = load_category_classifier(Some(path.as_path())).unwrap();
        assert_eq!(
            classifier.classify("from wikipedia").unwrap(),
            vec![("WIKI".to_string(), 1.0)]
        );

        let path = dir.path().join("languages.json");
        std::fs::write(
            &path,
            r#"{"languages": [{"name": "LATIN", "code": "la", "stopwords": ["Et", "in"]}]}"#,
        )
        .unwrap();
        let identifier = load_language_identifier(Some(path.as_path())).unwrap();
        assert_eq!(identifier.identify("et in arcadia ego").unwrap().code, "la");
    }

    #[test]
    fn test_model_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_span_extractor(Some(missing.as_path())),
            Err(ModelError::Load { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"patterns": {"X": ["("]}}"#).unwrap();
        assert!(matches!(
            load_span_extractor(Some(bad.as_path())),
            Err(ModelError::Format { .. })
        ));
    }
}
