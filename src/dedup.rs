//! Merging of records returned by overlapping category queries.

use std::collections::HashMap;

use crate::paper::{push_unique, UpstreamRecord};

/// Merge records sharing a canonical id. The first-seen record keeps its
/// position, fields and primary (query) category; later duplicates only
/// contribute categories, appended in the order they are seen.
pub fn merge_records(records: Vec<UpstreamRecord>) -> Vec<UpstreamRecord> {
    let mut merged: Vec<UpstreamRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        let key = record.canonical_id();
        match index.get(&key) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                for category in &record.categories {
                    push_unique(&mut existing.categories, category);
                }
                push_unique(&mut existing.categories, &record.query_category);
            }
            None => {
                index.insert(key, merged.len());
                merged.push(record);
            }
        }
    }

    merged
}
