//! Paper records: the raw shape parsed from the arXiv Atom feed and the
//! classified shape written to the JSON artifacts.

use chrono::NaiveDate;
use feed_rs::model::Entry;
use serde::{Deserialize, Serialize};

use crate::classify::SafetyClassifier;
use crate::error::PipelineError;
use crate::utils;

pub const SNIPPET_CHARS: usize = 200;

/// One entry as returned by a single category query.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRecord {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub categories: Vec<String>,
    /// Category whose query produced this record.
    pub query_category: String,
    pub published: NaiveDate,
    pub updated: NaiveDate,
}

impl UpstreamRecord {
    pub fn canonical_id(&self) -> String {
        utils::strip_version(&self.id)
    }

    /// Convert a feed entry. Entries without an id, title or publication
    /// date are rejected; everything else falls back to empty values.
    pub fn from_entry(entry: Entry, query_category: &str) -> Result<Self, PipelineError> {
        let id = utils::id_from_entry_url(&entry.id);
        if id.is_empty() {
            return Err(PipelineError::MalformedRecord {
                id: entry.id.clone(),
                field: "id",
            });
        }
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::MalformedRecord {
                id: id.clone(),
                field: "title",
            })?;
        let published = entry
            .published
            .map(|dt| dt.date_naive())
            .ok_or_else(|| PipelineError::MalformedRecord {
                id: id.clone(),
                field: "published",
            })?;
        let updated = entry.updated.map(|dt| dt.date_naive()).unwrap_or(published);
        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .filter(|s| !s.is_empty());
        let authors = entry
            .authors
            .iter()
            .map(|author| author.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut categories: Vec<String> = Vec::new();
        for category in &entry.categories {
            push_unique(&mut categories, category.term.trim());
        }
        push_unique(&mut categories, query_category);

        Ok(Self {
            id,
            title,
            authors,
            abstract_text,
            categories,
            query_category: query_category.to_string(),
            published,
            updated,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_snippet: Option<String>,
    pub categories: Vec<String>,
    pub primary_category: String,
    pub submitted_date: NaiveDate,
    pub last_updated: NaiveDate,
    pub safety_keywords_found: Vec<String>,
    pub is_safety_paper: bool,
    #[serde(default)]
    pub month: String,
}

impl Paper {
    pub fn from_record(record: UpstreamRecord, classifier: &SafetyClassifier) -> Self {
        let safety_keywords_found =
            classifier.matches(&record.title, record.abstract_text.as_deref());
        let is_safety_paper = !safety_keywords_found.is_empty();
        Self {
            month: month_key(record.published),
            id: record.id,
            title: record.title,
            authors: record.authors,
            abstract_text: record.abstract_text,
            abstract_snippet: None,
            categories: record.categories,
            primary_category: record.query_category,
            submitted_date: record.published,
            last_updated: record.updated,
            safety_keywords_found,
            is_safety_paper,
        }
    }

    /// List-view copy: the full abstract is replaced by a snippet.
    pub fn to_list_entry(&self) -> Paper {
        let mut entry = self.clone();
        if let Some(text) = entry.abstract_text.take() {
            entry.abstract_snippet = Some(utils::snippet(&text, SNIPPET_CHARS));
        } else if entry.abstract_snippet.is_none() {
            entry.abstract_snippet = Some(String::new());
        }
        entry
    }

    /// Title plus whatever abstract text the record still carries.
    pub fn searchable_text(&self) -> String {
        let body = self
            .abstract_text
            .as_deref()
            .or(self.abstract_snippet.as_deref())
            .unwrap_or("");
        format!("{} {}", self.title, body)
    }

    pub fn canonical_id(&self) -> String {
        utils::strip_version(&self.id)
    }

    pub fn month_key(&self) -> String {
        if self.month.is_empty() {
            month_key(self.submitted_date)
        } else {
            self.month.clone()
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Newest submissions first, id as the tiebreak so output order never
/// depends on fetch order.
pub fn sort_papers(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        b.submitted_date
            .cmp(&a.submitted_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn push_unique(items: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !items.iter().any(|existing| existing == value) {
        items.push(value.to_string());
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2025-01-03T00:00:00Z</updated>
  <entry>
    <id>http://arxiv.org/abs/2501.00001v1</id>
    <updated>2025-01-02T10:00:00Z</updated>
    <published>2025-01-01T09:00:00Z</published>
    <title>Scalable
      Oversight for Alignment</title>
    <summary>  A study of alignment
      techniques. </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2501.00009v1</id>
    <updated>2025-01-02T10:00:00Z</updated>
    <summary>No title here.</summary>
  </entry>
</feed>"#;

    fn entries() -> Vec<Entry> {
        feed_rs::parser::parse(FEED.as_bytes())
            .expect("feed parses")
            .entries
    }

    #[test]
    fn entry_converts_to_record() {
        let entry = entries().remove(0);
        let record = UpstreamRecord::from_entry(entry, "cs.AI").expect("valid entry");
        assert_eq!(record.id, "2501.00001v1");
        assert_eq!(record.canonical_id(), "2501.00001");
        assert_eq!(record.title, "Scalable Oversight for Alignment");
        assert_eq!(
            record.abstract_text.as_deref(),
            Some("A study of alignment techniques.")
        );
        assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(record.categories, vec!["cs.LG", "cs.AI"]);
        assert_eq!(record.query_category, "cs.AI");
        assert_eq!(record.published, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(record.updated, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[test]
    fn entry_without_title_is_malformed() {
        let entry = entries().remove(1);
        let err = UpstreamRecord::from_entry(entry, "cs.AI").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedRecord { field: "title", .. }
        ));
    }

    #[test]
    fn list_entry_swaps_abstract_for_snippet() {
        let classifier = SafetyClassifier::new(["alignment"]);
        let record = UpstreamRecord::from_entry(entries().remove(0), "cs.AI").unwrap();
        let paper = Paper::from_record(record, &classifier);
        assert_eq!(paper.month, "2025-01");
        assert_eq!(paper.primary_category, "cs.AI");

        let listed = paper.to_list_entry();
        assert!(listed.abstract_text.is_none());
        assert_eq!(
            listed.abstract_snippet.as_deref(),
            Some("A study of alignment techniques.")
        );
        let json = serde_json::to_value(&listed).unwrap();
        assert!(json["abstract"].is_null());
        assert_eq!(json["submitted_date"], "2025-01-01");
    }

    #[test]
    fn sort_is_newest_first_then_by_id() {
        let classifier = SafetyClassifier::new(Vec::<String>::new());
        let base = UpstreamRecord::from_entry(entries().remove(0), "cs.AI").unwrap();
        let mut older = base.clone();
        older.id = "2501.00003v1".into();
        older.published = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut sibling = base.clone();
        sibling.id = "2501.00000v1".into();

        let mut papers: Vec<Paper> = [older, base, sibling]
            .into_iter()
            .map(|r| Paper::from_record(r, &classifier))
            .collect();
        sort_papers(&mut papers);
        let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2501.00000v1", "2501.00001v1", "2501.00003v1"]);
    }
}
