//! One collector run: fetch, merge, classify, aggregate, emit.

use chrono::NaiveDateTime;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;
use tracing::{info, warn};

use crate::aggregate::CountsAggregate;
use crate::artifacts::{ArtifactSet, Metadata, COUNTS_FILE, TIMESTAMP_FORMAT};
use crate::classify::SafetyClassifier;
use crate::config::PipelineConfig;
use crate::dedup::merge_records;
use crate::error::{PipelineError, Result};
use crate::fetch::{fetch_categories, month_windows, DateWindow, FetchOutcome, PaperSource};
use crate::history;
use crate::keywords::{paper_keywords, tfidf_keywords};
use crate::paper::{sort_papers, Paper, UpstreamRecord};
use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total_papers: usize,
    pub safety_papers: usize,
    pub covered: Vec<String>,
    pub failed: Vec<String>,
    pub written: bool,
}

/// Merge duplicates, classify, and keep only papers inside `window`.
pub fn prepare_papers(
    records: Vec<UpstreamRecord>,
    classifier: &SafetyClassifier,
    window: Option<&DateWindow>,
) -> Vec<Paper> {
    let merged = merge_records(records);
    let before = merged.len();
    let mut papers: Vec<Paper> = merged
        .into_iter()
        .filter(|record| window.map_or(true, |w| w.contains(record.published)))
        .map(|record| Paper::from_record(record, classifier))
        .collect();
    if papers.len() < before {
        info!(dropped = before - papers.len(), "dropped papers outside the window");
    }
    sort_papers(&mut papers);
    papers
}

/// Pure part of the run: everything except history, which needs the disk.
pub fn build_artifacts(
    papers: &[Paper],
    covered: &[String],
    failed: &[String],
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> ArtifactSet {
    let safety_papers: Vec<Paper> = papers.iter().filter(|p| p.is_safety_paper).cloned().collect();
    let documents: Vec<String> = papers.iter().map(Paper::searchable_text).collect();
    let metadata = Metadata {
        last_updated: now.format(TIMESTAMP_FORMAT).to_string(),
        total_papers: papers.len(),
        safety_papers_count: safety_papers.len(),
        categories: covered.to_vec(),
        configured_categories: config.categories.clone(),
        failed_categories: failed.to_vec(),
        safety_terms: config.safety_terms.clone(),
        window_days: config.window_days,
    };
    ArtifactSet {
        papers: papers.iter().map(Paper::to_list_entry).collect(),
        counts: CountsAggregate::build(papers, covered),
        keywords: paper_keywords(papers, config.top_k),
        tfidf_keywords: tfidf_keywords(documents.iter().map(String::as_str), config.top_k),
        safety_papers,
        metadata,
        history: None,
    }
}

/// Daily update. Returns without touching the output directory when
/// nothing was fetched, and fails without writing when arXiv was
/// unreachable for every category.
pub fn run_update(
    source: &dyn PaperSource,
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> Result<RunSummary> {
    info!(
        categories = %config.categories.join(", "),
        window_days = config.window_days,
        "starting data update"
    );
    let window = DateWindow::trailing(now.date(), config.window_days);
    let FetchOutcome {
        records,
        covered,
        failed,
    } = fetch_categories(source, &config.categories, &window, config.max_results)?;

    let classifier = SafetyClassifier::new(&config.safety_terms);
    let papers = prepare_papers(records, &classifier, Some(&window));
    let mut summary = RunSummary {
        total_papers: papers.len(),
        safety_papers: papers.iter().filter(|p| p.is_safety_paper).count(),
        covered: covered.clone(),
        failed: failed.clone(),
        written: false,
    };
    if papers.is_empty() {
        warn!("no papers fetched, keeping previous artifacts");
        return Ok(summary);
    }

    let mut artifacts = build_artifacts(&papers, &covered, &failed, config, now);
    if config.history_enabled {
        let accumulated = history::accumulate(
            &config.output_dir,
            &papers,
            &config.categories,
            now.date(),
            config.history_months,
            config.top_k,
        );
        artifacts.counts.monthly = accumulated.monthly_counts;
        artifacts.history = Some(accumulated.artifacts);
    }
    artifacts.write_all(&config.output_dir)?;
    summary.written = true;

    info!(
        total = summary.total_papers,
        safety = summary.safety_papers,
        failed = summary.failed.len(),
        "data update completed"
    );
    Ok(summary)
}

/// Month-by-month fetch over `months` months feeding only the historical
/// artifacts and the monthly section of `counts.json`.
pub fn run_backfill(
    source: &dyn PaperSource,
    config: &PipelineConfig,
    now: NaiveDateTime,
    months: u32,
) -> Result<RunSummary> {
    let windows = month_windows(now.date(), months);
    info!(months = windows.len(), "starting historical backfill");

    let mut records = Vec::new();
    let mut covered: Vec<String> = Vec::new();
    let mut failed: Vec<String> = Vec::new();
    for (idx, (label, window)) in windows.iter().enumerate() {
        match fetch_categories(
            source,
            &config.categories,
            window,
            config.backfill_max_results,
        ) {
            Ok(outcome) => {
                info!(month = %label, count = outcome.records.len(), "fetched month");
                records.extend(outcome.records);
                covered.push(label.clone());
            }
            Err(err) => {
                warn!(month = %label, error = %err, "month fetch failed, skipping");
                failed.push(label.clone());
            }
        }
        if idx + 1 < windows.len() && config.month_delay_secs > 0.0 {
            info!(seconds = config.month_delay_secs, "sleeping before next month");
            sleep(Duration::from_secs_f64(config.month_delay_secs));
        }
    }
    if covered.is_empty() && !windows.is_empty() {
        return Err(PipelineError::UpstreamUnavailable { failed });
    }

    let classifier = SafetyClassifier::new(&config.safety_terms);
    let papers = prepare_papers(records, &classifier, None);
    let accumulated = history::accumulate(
        &config.output_dir,
        &papers,
        &config.categories,
        now.date(),
        months.max(config.history_months),
        config.top_k,
    );
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|err| PipelineError::io(&config.output_dir, err))?;
    accumulated.artifacts.write_all(&config.output_dir)?;
    merge_monthly_counts(&config.output_dir, accumulated.monthly_counts)?;

    let summary = RunSummary {
        total_papers: accumulated.artifacts.papers.len(),
        safety_papers: accumulated.artifacts.safety_papers.len(),
        covered,
        failed,
        written: true,
    };
    info!(
        total = summary.total_papers,
        safety = summary.safety_papers,
        "historical backfill completed"
    );
    Ok(summary)
}

fn merge_monthly_counts(dir: &Path, monthly: crate::aggregate::BucketCounts) -> Result<()> {
    let path = dir.join(COUNTS_FILE);
    let mut counts = if path.exists() {
        utils::read_json::<CountsAggregate>(&path).unwrap_or_else(|err| {
            warn!(error = %err, "existing counts unreadable, rewriting");
            CountsAggregate::default()
        })
    } else {
        CountsAggregate::default()
    };
    counts.monthly = monthly;
    utils::write_json_atomic(&path, &counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, day: u32, category: &str, abstract_text: &str) -> UpstreamRecord {
        let date = NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
        UpstreamRecord {
            id: id.to_string(),
            title: format!("Paper {id}"),
            authors: vec!["A. Author".into()],
            abstract_text: Some(abstract_text.to_string()),
            categories: vec![category.to_string()],
            query_category: category.to_string(),
            published: date,
            updated: date,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 8)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    #[test]
    fn window_edge_is_inclusive() {
        let classifier = SafetyClassifier::new(["alignment"]);
        let window = DateWindow::trailing(now().date(), 7);
        let mut too_old = record("2412.00001v1", 1, "cs.AI", "too old");
        too_old.published = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let papers = prepare_papers(
            vec![
                record("2501.00001v1", 1, "cs.AI", "on the edge"),
                record("2412.99999v1", 1, "cs.AI", "x"),
                too_old,
            ],
            &classifier,
            Some(&window),
        );
        let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2412.99999v1", "2501.00001v1"]);
    }

    #[test]
    fn metadata_totals_match_lists() {
        let config = PipelineConfig {
            safety_terms: vec!["alignment".into()],
            ..PipelineConfig::default()
        };
        let classifier = SafetyClassifier::new(&config.safety_terms);
        let papers = prepare_papers(
            vec![
                record("2501.00001v1", 2, "cs.AI", "a study of alignment techniques"),
                record("2501.00002v1", 3, "cs.LG", "a new optimizer"),
            ],
            &classifier,
            None,
        );
        let covered = vec!["cs.AI".to_string(), "cs.LG".to_string()];
        let set = build_artifacts(&papers, &covered, &[], &config, now());
        assert_eq!(set.metadata.total_papers, set.papers.len());
        assert_eq!(set.metadata.safety_papers_count, set.safety_papers.len());
        assert_eq!(set.safety_papers[0].id, "2501.00001v1");
        assert_eq!(set.safety_papers[0].safety_keywords_found, vec!["alignment"]);
        assert_eq!(set.metadata.last_updated, "2025-01-08 06:00:00");
    }

    #[test]
    fn list_papers_carry_snippets_and_safety_papers_keep_abstracts() {
        let config = PipelineConfig::default();
        let classifier = SafetyClassifier::new(&config.safety_terms);
        let long = format!("safety {}", "x".repeat(300));
        let papers = prepare_papers(vec![record("2501.00001v1", 2, "cs.AI", &long)], &classifier, None);
        let set = build_artifacts(&papers, &config.categories, &[], &config, now());
        assert!(set.papers[0].abstract_text.is_none());
        assert_eq!(
            set.papers[0].abstract_snippet.as_ref().map(|s| s.chars().count()),
            Some(203)
        );
        assert_eq!(set.safety_papers[0].abstract_text.as_deref(), Some(long.as_str()));
    }
}
