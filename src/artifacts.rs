//! The JSON files shared between the collector and the dashboard.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::aggregate::CountsAggregate;
use crate::error::Result;
use crate::keywords::KeywordCount;
use crate::paper::Paper;
use crate::utils;

pub const PAPERS_FILE: &str = "papers.json";
pub const SAFETY_PAPERS_FILE: &str = "safety_papers.json";
pub const COUNTS_FILE: &str = "counts.json";
pub const KEYWORDS_FILE: &str = "keywords.json";
pub const TFIDF_KEYWORDS_FILE: &str = "keywords_tfidf.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const HISTORICAL_PAPERS_FILE: &str = "historical_papers.json";
pub const HISTORICAL_SAFETY_PAPERS_FILE: &str = "historical_safety_papers.json";
pub const MONTHLY_KEYWORDS_FILE: &str = "monthly_keywords.json";
pub const SAFETY_TRENDS_FILE: &str = "safety_trends.json";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub last_updated: String,
    pub total_papers: usize,
    pub safety_papers_count: usize,
    /// Categories that were actually fetched this run.
    pub categories: Vec<String>,
    #[serde(default)]
    pub configured_categories: Vec<String>,
    #[serde(default)]
    pub failed_categories: Vec<String>,
    pub safety_terms: Vec<String>,
    #[serde(default)]
    pub window_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SafetyTrends {
    #[serde(default)]
    pub monthly_counts: BTreeMap<String, u64>,
}

/// Accumulated multi-month view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalArtifacts {
    pub papers: Vec<Paper>,
    pub safety_papers: Vec<Paper>,
    pub monthly_keywords: BTreeMap<String, Vec<KeywordCount>>,
    pub safety_trends: SafetyTrends,
}

impl HistoricalArtifacts {
    pub fn write_all(&self, dir: &Path) -> Result<()> {
        write(dir, HISTORICAL_PAPERS_FILE, &self.papers)?;
        write(dir, HISTORICAL_SAFETY_PAPERS_FILE, &self.safety_papers)?;
        write(dir, MONTHLY_KEYWORDS_FILE, &self.monthly_keywords)?;
        write(dir, SAFETY_TRENDS_FILE, &self.safety_trends)?;
        Ok(())
    }
}

/// Everything one collector run publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    /// List view: abstracts replaced by snippets.
    pub papers: Vec<Paper>,
    /// Full records.
    pub safety_papers: Vec<Paper>,
    pub counts: CountsAggregate,
    pub keywords: Vec<KeywordCount>,
    pub tfidf_keywords: Vec<KeywordCount>,
    pub metadata: Metadata,
    pub history: Option<HistoricalArtifacts>,
}

impl ArtifactSet {
    /// Each file is replaced atomically; the historical files go first so
    /// `metadata.json` is the last thing to change.
    pub fn write_all(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|err| crate::error::PipelineError::io(dir, err))?;
        if let Some(history) = &self.history {
            history.write_all(dir)?;
        }
        write(dir, PAPERS_FILE, &self.papers)?;
        write(dir, SAFETY_PAPERS_FILE, &self.safety_papers)?;
        write(dir, COUNTS_FILE, &self.counts)?;
        write(dir, KEYWORDS_FILE, &self.keywords)?;
        write(dir, TFIDF_KEYWORDS_FILE, &self.tfidf_keywords)?;
        write(dir, METADATA_FILE, &self.metadata)?;
        Ok(())
    }
}

fn write<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    utils::write_json_atomic(&path, value)?;
    info!(file = %path.display(), "saved artifact");
    Ok(())
}
