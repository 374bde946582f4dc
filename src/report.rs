use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Level, PersistenceTag, TaggedTable};

/// Tag counts of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub level: Level,
    pub origins: usize,
    pub reuses: usize,
}

/// Count (origins, reuses) in one tag column
pub fn summarize_column(column: &[Option<PersistenceTag>]) -> (usize, usize) {
    column
        .iter()
        .flatten()
        .fold((0, 0), |(origins, reuses), tag| {
            if tag.is_origin() {
                (origins + 1, reuses)
            } else {
                (origins, reuses + 1)
            }
        })
}

/// Tag counts for every tagged level of a table
pub fn summarize(tagged: &TaggedTable) -> Vec<LevelSummary> {
    tagged
        .tags
        .iter()
        .map(|(&level, column)| {
            let (origins, reuses) = summarize_column(column);
            LevelSummary {
                level,
                origins,
                reuses,
            }
        })
        .collect()
}

/// A persistent value and how often the target speaker reused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequentValue {
    pub value: String,
    pub count: usize,
    /// Word forms realising a POS pattern, most frequent first
    pub realisations: Vec<(String, usize)>,
}

/// Most frequently reused values at one level
///
/// Lists values reused at least `threshold` times, most frequent first. For
/// POS levels each pattern also lists the word forms realising it more than
/// `threshold` times; patterns with no such realisation are left out.
pub fn inspect(tagged: &TaggedTable, level: Level, threshold: usize) -> Vec<FrequentValue> {
    let Some(column) = tagged.tag_column(level) else {
        return Vec::new();
    };

    // Group reuse positions by value
    let mut by_value: HashMap<&str, Vec<usize>> = HashMap::new();
    for (position, tag) in column.iter().enumerate() {
        if let Some(tag) = tag {
            if tag.is_reuse() {
                by_value.entry(tag.value.as_str()).or_default().push(position);
            }
        }
    }

    let mut frequent: Vec<FrequentValue> = by_value
        .into_iter()
        .filter(|(_, positions)| positions.len() >= threshold)
        .filter_map(|(value, positions)| {
            let realisations = if level.is_pos() {
                let words = positions
                    .iter()
                    .map(|&p| tagged.table.rows[p].word.as_str());
                let realisations: Vec<(String, usize)> = ranked(words)
                    .into_iter()
                    .filter(|(_, count)| *count > threshold)
                    .collect();
                if realisations.is_empty() {
                    return None;
                }
                realisations
            } else {
                Vec::new()
            };
            Some(FrequentValue {
                value: value.to_string(),
                count: positions.len(),
                realisations,
            })
        })
        .collect();

    frequent.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    frequent
}

/// Count values, most frequent first, ties alphabetical
fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
