use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::model::{ConfigError, GroupDimension, Metric, TextField};

/// One flavor classification rule. Rules are evaluated in order against the
/// lowercased title, then the description; the first match wins.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorRule {
    pub keyword: String,
    pub flavor: String,
}

/// Everything a run can be tuned with. Stopwords, lemmas and flavor keywords
/// are deliberately external data, not built-in dictionaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// One aggregate table is produced per entry.
    pub groupings: Vec<Vec<GroupDimension>>,
    pub metrics: Vec<Metric>,
    pub stopwords: Vec<String>,
    /// token → lemma. Tokens without an entry map to themselves.
    pub lemmas: HashMap<String, String>,
    pub flavor_rules: Vec<FlavorRule>,
    /// Text fields that feed the term-frequency tables.
    pub term_fields: Vec<TextField>,
    /// Optional dimension to partition term counts by (e.g. per brand).
    pub term_partition: Option<GroupDimension>,
    /// Keep only the N most frequent terms per table.
    pub top_terms: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            groupings: vec![vec![GroupDimension::Brand]],
            metrics: vec![
                Metric::MeanPricePerUnit,
                Metric::MedianPricePerUnit,
                Metric::MeanRating,
                Metric::TotalSalesVelocity,
                Metric::MeanSalesVelocity,
            ],
            stopwords: Vec::new(),
            lemmas: HashMap::new(),
            flavor_rules: Vec::new(),
            term_fields: vec![TextField::Title],
            term_partition: None,
            top_terms: 50,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groupings.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one grouping must be configured".into(),
            ));
        }
        if let Some(idx) = self.groupings.iter().position(|dims| dims.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "grouping #{idx} names no dimensions"
            )));
        }
        if self.top_terms == 0 {
            return Err(ConfigError::Invalid("top_terms must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AnalysisConfig =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
