//! Time-bucketed category counts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::paper::Paper;

/// bucket key -> category -> papers
pub type BucketCounts = BTreeMap<String, BTreeMap<String, u64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Granularity::Monthly => date.format("%Y-%m").to_string(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(Granularity::Daily),
            "weekly" | "week" => Some(Granularity::Weekly),
            "monthly" | "month" => Some(Granularity::Monthly),
            _ => None,
        }
    }
}

/// Shape of `counts.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CountsAggregate {
    #[serde(default)]
    pub daily: BucketCounts,
    #[serde(default)]
    pub weekly: BucketCounts,
    #[serde(default)]
    pub monthly: BucketCounts,
}

impl CountsAggregate {
    pub fn build(papers: &[Paper], categories: &[String]) -> Self {
        Self {
            daily: bucket_counts(papers, categories, Granularity::Daily),
            weekly: bucket_counts(papers, categories, Granularity::Weekly),
            monthly: bucket_counts(papers, categories, Granularity::Monthly),
        }
    }

    pub fn get(&self, granularity: Granularity) -> &BucketCounts {
        match granularity {
            Granularity::Daily => &self.daily,
            Granularity::Weekly => &self.weekly,
            Granularity::Monthly => &self.monthly,
        }
    }
}

/// Tally each paper once for every tracked category it carries, so a
/// multi-category paper shows up under each of them.
pub fn bucket_counts(papers: &[Paper], categories: &[String], granularity: Granularity) -> BucketCounts {
    let mut counts = BucketCounts::new();
    for paper in papers {
        let mut matched = paper
            .categories
            .iter()
            .filter(|c| categories.iter().any(|tracked| tracked == *c))
            .peekable();
        if matched.peek().is_none() {
            continue;
        }
        let bucket = counts
            .entry(granularity.bucket_key(paper.submitted_date))
            .or_default();
        for category in matched {
            *bucket.entry(category.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// month -> number of safety papers
pub fn monthly_safety_counts(papers: &[Paper]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for paper in papers.iter().filter(|p| p.is_safety_paper) {
        *counts.entry(paper.month_key()).or_insert(0) += 1;
    }
    counts
}
