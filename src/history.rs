//! Trailing multi-month accumulation on top of the previous snapshot.
//!
//! This is a plain read-modify-write of `historical_papers.json`. Runs must
//! not overlap; the atomic rename only protects readers, not a second writer.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::{bucket_counts, monthly_safety_counts, BucketCounts, Granularity};
use crate::artifacts::{
    HistoricalArtifacts, SafetyTrends, HISTORICAL_PAPERS_FILE, MONTHLY_KEYWORDS_FILE,
};
use crate::keywords::{monthly_keywords, KeywordCount};
use crate::paper::{sort_papers, Paper};
use crate::utils;

/// Previous snapshot, or nothing if it is missing or unreadable.
pub fn load_prior(dir: &Path) -> Vec<Paper> {
    let path = dir.join(HISTORICAL_PAPERS_FILE);
    if !path.exists() {
        info!(file = %path.display(), "no prior historical snapshot");
        return Vec::new();
    }
    match utils::read_json::<Vec<Paper>>(&path) {
        Ok(papers) => {
            info!(file = %path.display(), count = papers.len(), "loaded prior snapshot");
            papers
        }
        Err(err) => {
            warn!(error = %err, "prior historical snapshot unreadable, starting fresh");
            Vec::new()
        }
    }
}

/// Oldest `YYYY-MM` still retained when keeping `months` months including
/// the current one.
pub fn cutoff_month(today: NaiveDate, months: u32) -> String {
    let back = months.saturating_sub(1) as i32;
    let total = today.year() * 12 + today.month0() as i32 - back;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) + 1;
    format!("{year:04}-{month:02}")
}

/// Merge new papers over the prior snapshot by canonical id (new records
/// win) and drop anything older than `cutoff`.
pub fn merge(prior: Vec<Paper>, fresh: &[Paper], cutoff: &str) -> Vec<Paper> {
    let mut by_id: HashMap<String, Paper> = HashMap::with_capacity(prior.len() + fresh.len());
    for paper in prior {
        by_id.insert(paper.canonical_id(), paper);
    }
    for paper in fresh {
        by_id.insert(paper.canonical_id(), paper.to_list_entry());
    }
    let mut merged: Vec<Paper> = by_id
        .into_values()
        .filter(|paper| paper.month_key().as_str() >= cutoff)
        .map(|paper| paper.to_list_entry())
        .collect();
    sort_papers(&mut merged);
    merged
}

/// Prior per-month keyword tables, or nothing if missing or unreadable.
pub fn load_prior_keywords(dir: &Path) -> BTreeMap<String, Vec<KeywordCount>> {
    let path = dir.join(MONTHLY_KEYWORDS_FILE);
    if !path.exists() {
        return BTreeMap::new();
    }
    utils::read_json(&path).unwrap_or_else(|err| {
        warn!(error = %err, "prior monthly keywords unreadable, recomputing");
        BTreeMap::new()
    })
}

pub struct Accumulated {
    pub artifacts: HistoricalArtifacts,
    pub monthly_counts: BucketCounts,
}

pub fn accumulate(
    dir: &Path,
    fresh: &[Paper],
    categories: &[String],
    today: NaiveDate,
    months: u32,
    top_k: usize,
) -> Accumulated {
    let cutoff = cutoff_month(today, months);
    let papers = merge(load_prior(dir), fresh, &cutoff);
    info!(count = papers.len(), cutoff = %cutoff, "historical set after merge");
    build(papers, fresh, load_prior_keywords(dir), categories, top_k)
}

/// `papers` is the merged snapshot; `fresh` are this run's full records.
pub fn build(
    papers: Vec<Paper>,
    fresh: &[Paper],
    prior_keywords: BTreeMap<String, Vec<KeywordCount>>,
    categories: &[String],
    top_k: usize,
) -> Accumulated {
    let safety_papers: Vec<Paper> = papers.iter().filter(|p| p.is_safety_paper).cloned().collect();
    let monthly_counts = bucket_counts(&papers, categories, Granularity::Monthly);
    let artifacts = HistoricalArtifacts {
        monthly_keywords: keyword_tables(&papers, fresh, prior_keywords, top_k),
        safety_trends: SafetyTrends {
            monthly_counts: monthly_safety_counts(&papers),
        },
        safety_papers,
        papers,
    };
    Accumulated {
        artifacts,
        monthly_counts,
    }
}

/// Months touched by this run are retallied, using the full abstract of
/// every fresh paper and the stored snippet of the rest. Other months keep
/// their previous table when one exists.
fn keyword_tables(
    papers: &[Paper],
    fresh: &[Paper],
    mut prior: BTreeMap<String, Vec<KeywordCount>>,
    top_k: usize,
) -> BTreeMap<String, Vec<KeywordCount>> {
    let fresh_by_id: HashMap<String, &Paper> =
        fresh.iter().map(|paper| (paper.canonical_id(), paper)).collect();
    let fresh_months: HashSet<String> = fresh.iter().map(Paper::month_key).collect();

    let mut kept = BTreeMap::new();
    let mut entries = Vec::new();
    for paper in papers {
        let month = paper.month_key();
        if !fresh_months.contains(&month) {
            if let Some(table) = prior.remove(&month) {
                kept.insert(month, table);
                continue;
            }
            if kept.contains_key(&month) {
                continue;
            }
        }
        let text = fresh_by_id
            .get(&paper.canonical_id())
            .map_or_else(|| paper.searchable_text(), |full| full.searchable_text());
        entries.push((month, text));
    }

    let mut tables = monthly_keywords(entries, top_k);
    tables.extend(kept);
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn paper(id: &str, submitted: NaiveDate, safety: bool, title: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec![],
            abstract_text: Some(format!("{title} abstract")),
            abstract_snippet: None,
            categories: vec!["cs.AI".into()],
            primary_category: "cs.AI".into(),
            submitted_date: submitted,
            last_updated: submitted,
            safety_keywords_found: if safety { vec!["safety".into()] } else { vec![] },
            is_safety_paper: safety,
            month: submitted.format("%Y-%m").to_string(),
        }
    }

    #[test]
    fn cutoff_counts_current_month() {
        assert_eq!(cutoff_month(date(2025, 6, 15), 6), "2025-01");
        assert_eq!(cutoff_month(date(2025, 2, 1), 6), "2024-09");
        assert_eq!(cutoff_month(date(2025, 2, 1), 1), "2025-02");
        assert_eq!(cutoff_month(date(2025, 2, 1), 0), "2025-02");
    }

    #[test]
    fn merge_replaces_by_id_and_prunes_old_months() {
        let prior = vec![
            paper("2412.00001v1", date(2024, 12, 3), false, "old title").to_list_entry(),
            paper("2407.00001v1", date(2024, 7, 3), false, "too old").to_list_entry(),
        ];
        let fresh = vec![
            paper("2412.00001v2", date(2024, 12, 3), true, "new title"),
            paper("2501.00001v1", date(2025, 1, 3), false, "january"),
        ];
        let merged = merge(prior, &fresh, "2024-08");
        let ids: Vec<&str> = merged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2501.00001v1", "2412.00001v2"]);
        assert!(merged.iter().all(|p| p.abstract_text.is_none()));
        assert_eq!(merged[1].title, "new title");
    }

    #[test]
    fn merging_the_same_batch_twice_is_stable() {
        let fresh = vec![
            paper("2501.00001v1", date(2025, 1, 3), true, "a"),
            paper("2501.00002v1", date(2025, 1, 4), false, "b"),
        ];
        let once = merge(Vec::new(), &fresh, "2024-08");
        let twice = merge(once.clone(), &fresh, "2024-08");
        assert_eq!(once, twice);
    }

    #[test]
    fn accumulate_reads_back_prior_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let categories = vec!["cs.AI".to_string()];
        let first = accumulate(
            dir.path(),
            &[paper("2501.00001v1", date(2025, 1, 3), true, "alignment")],
            &categories,
            date(2025, 2, 10),
            6,
            10,
        );
        first.artifacts.write_all(dir.path()).expect("write");

        let second = accumulate(
            dir.path(),
            &[paper("2502.00001v1", date(2025, 2, 3), false, "optimizer")],
            &categories,
            date(2025, 2, 10),
            6,
            10,
        );
        assert_eq!(second.artifacts.papers.len(), 2);
        assert_eq!(second.artifacts.safety_papers.len(), 1);
        assert_eq!(second.artifacts.safety_trends.monthly_counts["2025-01"], 1);
        assert_eq!(second.monthly_counts["2025-02"]["cs.AI"], 1);
        assert!(second.artifacts.monthly_keywords.contains_key("2025-01"));
    }

    #[test]
    fn monthly_keywords_see_the_whole_fresh_abstract() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut fresh = paper("2501.00001v1", date(2025, 1, 3), true, "Notes");
        fresh.abstract_text = Some(format!("{}{}", "filler ".repeat(40), "corrigibility ".repeat(3)));
        let accumulated = accumulate(
            dir.path(),
            &[fresh],
            &["cs.AI".to_string()],
            date(2025, 1, 10),
            6,
            10,
        );
        let january = &accumulated.artifacts.monthly_keywords["2025-01"];
        let corrigibility = january.iter().find(|k| k.text == "corrigibility");
        assert_eq!(corrigibility.map(|k| k.value), Some(3));
        assert!(accumulated.artifacts.papers[0].abstract_text.is_none());
    }

    #[test]
    fn months_without_fresh_papers_keep_their_previous_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let december = paper("2412.00001v1", date(2024, 12, 3), false, "robotics");
        std::fs::write(
            dir.path().join(HISTORICAL_PAPERS_FILE),
            serde_json::to_string(&vec![december.to_list_entry()]).unwrap(),
        )
        .unwrap();
        let previous = BTreeMap::from([(
            "2024-12".to_string(),
            vec![KeywordCount { text: "gradient".into(), value: 9 }],
        )]);
        std::fs::write(
            dir.path().join(MONTHLY_KEYWORDS_FILE),
            serde_json::to_string(&previous).unwrap(),
        )
        .unwrap();

        let accumulated = accumulate(
            dir.path(),
            &[paper("2501.00001v1", date(2025, 1, 3), false, "optimizer")],
            &["cs.AI".to_string()],
            date(2025, 1, 10),
            6,
            10,
        );
        let tables = &accumulated.artifacts.monthly_keywords;
        assert_eq!(tables["2024-12"], previous["2024-12"]);
        assert!(tables["2025-01"].iter().any(|k| k.text == "optimizer"));
    }

    #[test]
    fn unreadable_prior_snapshot_is_treated_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(HISTORICAL_PAPERS_FILE), "not json").unwrap();
        assert!(load_prior(dir.path()).is_empty());
    }
}
