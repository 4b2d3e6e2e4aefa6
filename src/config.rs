//! Engine configuration.
//!
//! Defaults reproduce the crossword lexicon build; a YAML file can override
//! any field, and command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{LexiconError, Result};
use crate::render::TemplateAlias;

pub const DEFAULT_POS: [&str; 5] = ["Noun", "Verb", "Adjective", "Adverb", "Proper noun"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Text of the level-2 heading that opens the target section.
    pub language: String,
    /// Leading template arguments dropped as language codes.
    pub language_codes: Vec<String>,
    /// Part-of-speech headings that open a sense group.
    pub allowed_pos: BTreeSet<String>,
    pub min_len: usize,
    pub max_len: usize,
    pub max_defs_per_pos: usize,
    /// Template expansion pass bound.
    pub max_passes: usize,
    /// Labels kept by label/qualifier templates.
    pub max_labels: usize,
    /// Extra template name -> render policy mappings.
    pub template_aliases: BTreeMap<String, TemplateAlias>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            language: "English".to_string(),
            language_codes: vec!["en".to_string(), "eng".to_string(), "english".to_string()],
            allowed_pos: DEFAULT_POS.iter().map(|p| p.to_string()).collect(),
            min_len: 2,
            max_len: 25,
            max_defs_per_pos: 3,
            max_passes: 4,
            max_labels: 6,
            template_aliases: BTreeMap::new(),
        }
    }
}

impl ExtractConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: ExtractConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(LexiconError::InvalidConfig("language must not be empty".into()));
        }
        if self.allowed_pos.is_empty() {
            return Err(LexiconError::InvalidConfig("allowed_pos must not be empty".into()));
        }
        if self.min_len > self.max_len {
            return Err(LexiconError::InvalidConfig(format!(
                "min_len ({}) is greater than max_len ({})",
                self.min_len, self.max_len
            )));
        }
        if self.max_defs_per_pos == 0 {
            return Err(LexiconError::InvalidConfig("max_defs_per_pos must be at least 1".into()));
        }
        if self.max_passes == 0 {
            return Err(LexiconError::InvalidConfig("max_passes must be at least 1".into()));
        }
        for (name, alias) in &self.template_aliases {
            alias.to_policy(name)?;
        }
        Ok(())
    }
}
