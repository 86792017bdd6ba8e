//! Read side of the artifacts: loading with required/optional handling and
//! the view logic the dashboard renders (chart bars, filters, paging,
//! trend series).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::aggregate::{CountsAggregate, Granularity};
use crate::artifacts::{
    Metadata, SafetyTrends, COUNTS_FILE, HISTORICAL_PAPERS_FILE, HISTORICAL_SAFETY_PAPERS_FILE,
    KEYWORDS_FILE, METADATA_FILE, MONTHLY_KEYWORDS_FILE, PAPERS_FILE, SAFETY_PAPERS_FILE,
    SAFETY_TRENDS_FILE, TFIDF_KEYWORDS_FILE,
};
use crate::error::{PipelineError, Result};
use crate::keywords::KeywordCount;
use crate::paper::Paper;
use crate::utils;

#[derive(Debug, Clone)]
pub struct DashboardData {
    pub papers: Vec<Paper>,
    pub safety_papers: Vec<Paper>,
    pub counts: CountsAggregate,
    pub keywords: Vec<KeywordCount>,
    pub metadata: Metadata,
    pub tfidf_keywords: Option<Vec<KeywordCount>>,
    pub historical_papers: Option<Vec<Paper>>,
    pub historical_safety_papers: Option<Vec<Paper>>,
    pub monthly_keywords: Option<BTreeMap<String, Vec<KeywordCount>>>,
    pub safety_trends: Option<SafetyTrends>,
}

impl DashboardData {
    /// Core artifacts must all load; optional ones degrade to `None`.
    pub fn load(dir: &Path) -> Result<Self> {
        let data = Self {
            papers: load_required(dir, PAPERS_FILE)?,
            counts: load_required(dir, COUNTS_FILE)?,
            keywords: load_required(dir, KEYWORDS_FILE)?,
            safety_papers: load_required(dir, SAFETY_PAPERS_FILE)?,
            metadata: load_required(dir, METADATA_FILE)?,
            tfidf_keywords: load_optional(dir, TFIDF_KEYWORDS_FILE),
            historical_papers: load_optional(dir, HISTORICAL_PAPERS_FILE),
            historical_safety_papers: load_optional(dir, HISTORICAL_SAFETY_PAPERS_FILE),
            monthly_keywords: load_optional(dir, MONTHLY_KEYWORDS_FILE),
            safety_trends: load_optional(dir, SAFETY_TRENDS_FILE),
        };
        info!(
            papers = data.papers.len(),
            missing = ?data.missing_sections(),
            "dashboard data loaded"
        );
        Ok(data)
    }

    /// Optional sections the view should omit.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tfidf_keywords.is_none() {
            missing.push(TFIDF_KEYWORDS_FILE);
        }
        if self.historical_papers.is_none() {
            missing.push(HISTORICAL_PAPERS_FILE);
        }
        if self.historical_safety_papers.is_none() {
            missing.push(HISTORICAL_SAFETY_PAPERS_FILE);
        }
        if self.monthly_keywords.is_none() {
            missing.push(MONTHLY_KEYWORDS_FILE);
        }
        if self.safety_trends.is_none() {
            missing.push(SAFETY_TRENDS_FILE);
        }
        missing
    }

    pub fn safety_trend(&self) -> TrendSeries {
        TrendSeries::from_trends(self.safety_trends.as_ref())
    }
}

fn load_required<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    utils::read_json(&dir.join(name)).map_err(|err| PipelineError::MissingArtifact {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

fn load_optional<T: DeserializeOwned>(dir: &Path, name: &str) -> Option<T> {
    match utils::read_json(&dir.join(name)) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(file = name, error = %err, "optional artifact unavailable");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Bar {
    pub category: String,
    pub count: u64,
}

/// One bar per category for a single bucket, ordered by category code.
pub fn category_bars(counts: &CountsAggregate, granularity: Granularity, bucket: &str) -> Vec<Bar> {
    counts
        .get(granularity)
        .get(bucket)
        .map(|per_category| {
            per_category
                .iter()
                .map(|(category, count)| Bar {
                    category: category.clone(),
                    count: *count,
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn bucket_keys(counts: &CountsAggregate, granularity: Granularity) -> Vec<String> {
    counts.get(granularity).keys().cloned().collect()
}

/// Conjunctive filter over the paper list. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub safety: Option<bool>,
}

impl PaperFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, paper: &Paper) -> bool {
        if let Some(category) = non_empty(&self.category) {
            if !paper.has_category(category) {
                return false;
            }
        }
        if let Some(keyword) = non_empty(&self.keyword) {
            if !paper
                .safety_keywords_found
                .iter()
                .any(|found| found.eq_ignore_ascii_case(keyword))
            {
                return false;
            }
        }
        if self.safety == Some(true) && !paper.is_safety_paper {
            return false;
        }
        if let Some(query) = non_empty(&self.q) {
            let needle = query.to_lowercase();
            let in_text = paper.searchable_text().to_lowercase().contains(&needle);
            let in_authors = paper
                .authors
                .iter()
                .any(|author| author.to_lowercase().contains(&needle));
            if !in_text && !in_authors {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, papers: &'a [Paper]) -> Vec<&'a Paper> {
        papers.iter().filter(|paper| self.matches(paper)).collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// 1-based pages. A page past the end is empty but still reports the real
/// totals.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);
    let slice = if start < total_items {
        &items[start..(start + per_page).min(total_items)]
    } else {
        &[]
    };
    Page {
        items: slice.to_vec(),
        page,
        per_page,
        total_items,
        total_pages,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrendPoint {
    pub month: String,
    pub count: u64,
}

/// Missing trend data stays missing; nothing is interpolated or invented.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "points", rename_all = "snake_case")]
pub enum TrendSeries {
    NoData,
    Monthly(Vec<TrendPoint>),
}

impl TrendSeries {
    pub fn from_trends(trends: Option<&SafetyTrends>) -> Self {
        match trends {
            Some(trends) if !trends.monthly_counts.is_empty() => TrendSeries::Monthly(
                trends
                    .monthly_counts
                    .iter()
                    .map(|(month, count)| TrendPoint {
                        month: month.clone(),
                        count: *count,
                    })
                    .collect(),
            ),
            _ => TrendSeries::NoData,
        }
    }
}
