/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Run configuration loaded from YAML.
 */

//! Run configuration.
//!
//! ```yaml
//! workers: 8              # omitted or null: one per CPU
//! language_codes: [en, un]
//! brew:
//!   categories:
//!     WIKI: { labels: [DATE, ITEM] }
//!     DATABASE: { labels: [NAME, DATE, ACC_NUM], upper: [NAME] }
//! ```
//!
//! Every key is optional. Command-line flags override what the file sets.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::brew::BrewConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatcitConfig {
    /// Size of the worker pools.
    pub workers: Option<usize>,
    /// Language codes for which a category is computed.
    pub language_codes: Vec<String>,
    pub brew: BrewConfig,
}

impl Default for PatcitConfig {
    fn default() -> Self {
        Self {
            workers: None,
            language_codes: vec!["en".to_string(), "un".to_string()],
            brew: BrewConfig::default(),
        }
    }
}

impl PatcitConfig {
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PatcitConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// The configuration at `path`, or the defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Worker count: the override, else the configured value, else the
    /// number of CPUs.
    pub fn workers(&self, cli_override: Option<usize>) -> usize {
        cli_override
            .or(self.workers)
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if let Some((name, _)) = self
            .brew
            .categories
            .iter()
            .find(|(_, policy)| policy.labels.is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "brew category '{}' has no labels",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brew::CategoryPolicy;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("patcit.yml")
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = PatcitConfig::from_yaml("{}", &origin()).unwrap();
        assert_eq!(config, PatcitConfig::default());
        let config = PatcitConfig::from_yaml("# nothing\n", &origin()).unwrap();
        assert_eq!(config, PatcitConfig::default());
    }

    #[test]
    fn test_overrides() {
        let yaml = r#"
workers: 4
language_codes: [en, fr]
brew:
  categories:
    PATENT_OFFICE:
      labels: [NAME]
      lower: [NAME]
"#;
        let config = PatcitConfig::from_yaml(yaml, &origin()).unwrap();
        assert_eq!(config.workers(None), 4);
        assert_eq!(config.workers(Some(2)), 2);
        assert_eq!(config.language_codes, vec!["en", "fr"]);
        assert_eq!(
            config.brew.policy("PATENT_OFFICE").unwrap(),
            &CategoryPolicy {
                labels: vec!["NAME".to_string()],
                upper: Vec::new(),
                lower: vec!["NAME".to_string()],
            }
        );
        assert!(config.brew.policy("WIKI").is_err());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            PatcitConfig::from_yaml("workers: 0", &origin()),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PatcitConfig::from_yaml("brew: {categories: {X: {labels: []}}}", &origin()),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PatcitConfig::from_yaml("threads: 2", &origin()),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patcit.yml");
        std::fs::write(&path, "language_codes: [de]\n").unwrap();
        let config = PatcitConfig::load_or_default(Some(path.as_path())).unwrap();
        assert_eq!(config.language_codes, vec!["de"]);

        let missing = dir.path().join("nope.yml");
        assert!(matches!(
            PatcitConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_default_workers_is_positive() {
        assert!(PatcitConfig::default().workers(None) >= 1);
        assert!(PatcitConfig::default().workers(Some(0)) >= 1);
    }
}
