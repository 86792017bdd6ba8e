use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::utils;

pub const DEFAULT_CATEGORIES: &[&str] = &["cs.AI", "cs.LG", "cs.CV", "cs.CL", "cs.RO", "stat.ML"];

pub const DEFAULT_SAFETY_TERMS: &[&str] = &[
    "alignment",
    "misalignment",
    "value alignment",
    "AI alignment",
    "aligned AI",
    "interpretability",
    "explainability",
    "transparency",
    "existential risk",
    "x-risk",
    "catastrophic risk",
    "safety",
    "AI safety",
    "safe AI",
    "robust AI",
    "control problem",
    "AI control",
    "corrigibility",
    "specification gaming",
    "reward hacking",
    "value learning",
    "outer alignment",
    "inner alignment",
    "adversarial",
    "adversarial attack",
    "adversarial example",
    "ethics",
    "ethical AI",
    "responsible AI",
    "goal misgeneralization",
    "distributional shift",
    "AI governance",
    "AI policy",
    "superintelligence",
    "AGI safety",
];

const DEFAULT_OUTPUT_DIR: &str = "data";
const DEFAULT_FRONTEND_DATA_DIR: &str = "frontend/public/data";
const DEFAULT_API_BASE_URL: &str = "http://export.arxiv.org/api/query";
const DEFAULT_USER_AGENT: &str = "arxiv-safety-trends/0.1";
const DEFAULT_WINDOW_DAYS: i64 = 7;
const DEFAULT_MAX_RESULTS: usize = 1000;
const DEFAULT_RESULTS_PER_PAGE: usize = 100;
const DEFAULT_REQUEST_DELAY_SECS: f64 = 3.0;
const DEFAULT_HISTORY_MONTHS: u32 = 6;
const DEFAULT_BACKFILL_MAX_RESULTS: usize = 2000;
const DEFAULT_MONTH_DELAY_SECS: f64 = 5.0;
const DEFAULT_TOP_K: usize = 100;
const MAX_WINDOW_DAYS: i64 = 3650;

/// Resolved settings for one collector run. Everything the run needs is in
/// here; nothing is read from globals.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    pub categories: Vec<String>,
    pub safety_terms: Vec<String>,
    pub window_days: i64,
    pub max_results: usize,
    pub results_per_page: usize,
    pub request_delay_secs: f64,
    pub history_enabled: bool,
    pub history_months: u32,
    pub backfill_max_results: usize,
    pub month_delay_secs: f64,
    pub top_k: usize,
    pub output_dir: PathBuf,
    pub frontend_data_dir: PathBuf,
    pub api_base_url: String,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            safety_terms: DEFAULT_SAFETY_TERMS.iter().map(|t| t.to_string()).collect(),
            window_days: DEFAULT_WINDOW_DAYS,
            max_results: DEFAULT_MAX_RESULTS,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            request_delay_secs: DEFAULT_REQUEST_DELAY_SECS,
            history_enabled: true,
            history_months: DEFAULT_HISTORY_MONTHS,
            backfill_max_results: DEFAULT_BACKFILL_MAX_RESULTS,
            month_delay_secs: DEFAULT_MONTH_DELAY_SECS,
            top_k: DEFAULT_TOP_K,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            frontend_data_dir: PathBuf::from(DEFAULT_FRONTEND_DATA_DIR),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    safety_terms: Option<Vec<String>>,
    #[serde(default)]
    window_days: Option<i64>,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    results_per_page: Option<usize>,
    #[serde(default)]
    request_delay_secs: Option<f64>,
    #[serde(default)]
    history_enabled: Option<bool>,
    #[serde(default)]
    history_months: Option<u32>,
    #[serde(default)]
    backfill_max_results: Option<usize>,
    #[serde(default)]
    month_delay_secs: Option<f64>,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    frontend_data_dir: Option<PathBuf>,
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
}

impl PipelineConfig {
    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            categories: file.categories.unwrap_or(defaults.categories),
            safety_terms: file.safety_terms.unwrap_or(defaults.safety_terms),
            window_days: file.window_days.unwrap_or(defaults.window_days),
            max_results: file.max_results.unwrap_or(defaults.max_results),
            results_per_page: file.results_per_page.unwrap_or(defaults.results_per_page),
            request_delay_secs: file
                .request_delay_secs
                .unwrap_or(defaults.request_delay_secs),
            history_enabled: file.history_enabled.unwrap_or(defaults.history_enabled),
            history_months: file.history_months.unwrap_or(defaults.history_months),
            backfill_max_results: file
                .backfill_max_results
                .unwrap_or(defaults.backfill_max_results),
            month_delay_secs: file.month_delay_secs.unwrap_or(defaults.month_delay_secs),
            top_k: file.top_k.unwrap_or(defaults.top_k),
            output_dir: file.output_dir.unwrap_or(defaults.output_dir),
            frontend_data_dir: file.frontend_data_dir.unwrap_or(defaults.frontend_data_dir),
            api_base_url: file.api_base_url.unwrap_or(defaults.api_base_url),
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(PipelineError::Config("categories must not be empty".into()));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(PipelineError::Config(format!(
                "window_days must be between 0 and {MAX_WINDOW_DAYS}, got {}",
                self.window_days
            )));
        }
        if self.results_per_page == 0 {
            return Err(PipelineError::Config("results_per_page must be > 0".into()));
        }
        if self.request_delay_secs < 0.0 || self.month_delay_secs < 0.0 {
            return Err(PipelineError::Config("delays must be non-negative".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let config = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|err| PipelineError::io(path, err))?;
        let file = serde_json::from_str::<PipelineConfigFile>(&contents)
            .map_err(|err| PipelineError::json(path, err))?;
        PipelineConfig::from_file(file)
    } else {
        PipelineConfig::default()
    };
    config.validate()?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    utils::write_json_atomic(path, config)
}
