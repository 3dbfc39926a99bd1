//! Curated skill catalog, flattened into the lowercase vocabulary the matcher works with

use crate::config::VocabularyConfig;
use crate::error::{Result, SkillAlignerError};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Catalog shipped with the binary
const BUILTIN_CATALOG: &str = include_str!("../../data/skills.json");

/// Category name -> skill names, as stored on disk
pub type SkillCatalog = BTreeMap<String, Vec<String>>;

/// Immutable set of known skill names.
///
/// Skills are lowercased, trimmed, deduplicated and kept in sorted order, so
/// positions are stable across runs. The embedding index relies on that for
/// deterministic tie-breaking.
#[derive(Debug, Clone)]
pub struct SkillVocabulary {
    skills: Vec<String>,
    categories: BTreeMap<String, Vec<String>>,
}

impl SkillVocabulary {
    pub fn from_catalog(catalog: SkillCatalog) -> Result<Self> {
        let mut all = BTreeSet::new();
        let mut categories = BTreeMap::new();

        for (category, skills) in catalog {
            let cleaned: BTreeSet<String> = skills
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            all.extend(cleaned.iter().cloned());
            categories.insert(category, cleaned.into_iter().collect());
        }

        if all.is_empty() {
            return Err(SkillAlignerError::Vocabulary(
                "skill catalog contains no skills".to_string(),
            ));
        }

        debug!("Vocabulary built: {} skills in {} categories", all.len(), categories.len());

        Ok(Self {
            skills: all.into_iter().collect(),
            categories,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: SkillCatalog = serde_json::from_str(content)
            .map_err(|e| SkillAlignerError::Vocabulary(format!("Invalid JSON skill catalog: {}", e)))?;
        Self::from_catalog(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: SkillCatalog = toml::from_str(content)
            .map_err(|e| SkillAlignerError::Vocabulary(format!("Invalid TOML skill catalog: {}", e)))?;
        Self::from_catalog(catalog)
    }

    /// Load a catalog file; `.toml` is parsed as TOML, everything else as JSON
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SkillAlignerError::Vocabulary(format!("Failed to read skill catalog {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn load(config: &VocabularyConfig) -> Result<Self> {
        let vocabulary = match &config.catalog_path {
            Some(path) => {
                info!("Loading skill catalog from {}", path.display());
                Self::from_path(path)?
            }
            None => Self::builtin()?,
        };
        info!("Skill vocabulary ready with {} skills", vocabulary.len());
        Ok(vocabulary)
    }

    pub fn skills(&self) -> &[String] {
        &self.skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.skills.binary_search_by(|s| s.as_str().cmp(skill)).is_ok()
    }

    /// First category (alphabetically) listing the skill
    pub fn category_of(&self, skill: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, skills)| skills.binary_search_by(|s| s.as_str().cmp(skill)).is_ok())
            .map(|(category, _)| category.as_str())
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(name, skills)| (name.as_str(), skills.as_slice()))
    }
}
