use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PersistenceError, Result};
use crate::models::{
    CorpusIndex, InteractionSpan, Level, MergedAnnotation, NgramSize, NgramSpan, Position, Row,
    TaggedTable, TurnSpan,
};

use super::build_index;

/// How a tagged n-gram row finds its first unigram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStrategy {
    /// The k-th n-gram of a turn starts at the k-th unigram of that turn
    #[default]
    TurnOffset,
    /// The n-gram's `index` equals its first unigram's `index`
    SharedIndex,
}

impl FromStr for AlignmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "turn_offset" => Ok(AlignmentStrategy::TurnOffset),
            "shared_index" => Ok(AlignmentStrategy::SharedIndex),
            other => Err(format!("unknown alignment strategy: {other}")),
        }
    }
}

/// Configuration for Stage 3 merging
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    pub alignment: AlignmentStrategy,
}

/// One merged column: an n-gram size tagged at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeColumn {
    pub size: NgramSize,
    pub level: Level,
}

impl fmt::Display for MergeColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence_{}_{}", self.size, self.level)
    }
}

/// Unigram table carrying every n-gram table's annotations
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub rows: Vec<Row>,
    /// One cell per unigram row in each column
    pub columns: BTreeMap<MergeColumn, Vec<Vec<MergedAnnotation>>>,
}

impl MergedTable {
    pub fn cell(&self, column: MergeColumn, position: usize) -> Option<&[MergedAnnotation]> {
        self.columns
            .get(&column)
            .and_then(|cells| cells.get(position))
            .map(|cell| cell.as_slice())
    }
}

/// Result of Stage 3 merging
#[derive(Debug)]
pub struct MergeResult {
    pub table: MergedTable,
    /// Tagged n-gram rows written onto the unigram table, per column
    pub merged_rows: BTreeMap<MergeColumn, usize>,
}

/// An n-gram table prepared for merging
struct NgramSource<'a> {
    tagged: &'a TaggedTable,
    index: CorpusIndex,
}

/// Execute Stage 3: align the tagged n-gram tables onto the unigram table
///
/// Walks interactions, then turns, of the unigram table. Every tagged n-gram
/// row is resolved to the unigram positions it covers, its first value is
/// checked against the unigram at the first position, and one annotation is
/// appended to each covered position. Any mismatch aborts the whole merge.
pub fn execute_merge(
    unigrams: &TaggedTable,
    ngrams: &[&TaggedTable],
    config: &MergeConfig,
) -> Result<MergeResult> {
    if unigrams.size() != NgramSize::Unigrams {
        return Err(PersistenceError::data(format!(
            "merge target must be the unigram table, got {}",
            unigrams.size()
        )));
    }
    let uni_index = build_index(&unigrams.table)?;

    // Index and check every n-gram table up front

    let mut sources: Vec<NgramSource<'_>> = Vec::with_capacity(ngrams.len());
    for &tagged in ngrams {
        if tagged.size() == NgramSize::Unigrams
            || sources.iter().any(|s| s.tagged.size() == tagged.size())
        {
            return Err(PersistenceError::data(format!(
                "cannot merge {} table: expected one table per larger n-gram size",
                tagged.size()
            )));
        }
        check_columns(tagged)?;
        let index = build_index(&tagged.table)?;
        check_orphans(tagged, &index, &uni_index)?;
        sources.push(NgramSource { tagged, index });
    }
    check_columns(unigrams)?;

    // Unigram tags become single-position annotations
    let row_count = unigrams.table.rows.len();
    let mut columns: BTreeMap<MergeColumn, Vec<Vec<MergedAnnotation>>> = BTreeMap::new();
    let mut merged_rows: BTreeMap<MergeColumn, usize> = BTreeMap::new();

    for level in unigrams.levels() {
        let column = MergeColumn {
            size: NgramSize::Unigrams,
            level,
        };
        let mut cells = vec![Vec::new(); row_count];
        let mut count = 0;
        for (position, tag) in unigrams.tags[&level].iter().enumerate() {
            if let Some(tag) = tag {
                cells[position].push(MergedAnnotation {
                    kind: tag.kind,
                    position: Position::Single,
                    value: tag.value.clone(),
                });
                count += 1;
            }
        }
        columns.insert(column, cells);
        merged_rows.insert(column, count);
    }
    // Empty columns for every n-gram level
    for source in &sources {
        for level in source.tagged.levels() {
            let column = MergeColumn {
                size: source.tagged.size(),
                level,
            };
            columns.insert(column, vec![Vec::new(); row_count]);
            merged_rows.insert(column, 0);
        }
    }

    // Walk interactions, then turns, of the unigram table
    for interaction in &uni_index.interactions {
        for turn in &interaction.turns {
            for source in &sources {
                let Some(ngram_turn) = source.index.turn(&interaction.interaction_id, &turn.turn_id)
                else {
                    continue;
                };
                merge_turn(
                    unigrams,
                    interaction,
                    turn,
                    source,
                    ngram_turn,
                    config,
                    &mut columns,
                    &mut merged_rows,
                )?;
            }
        }
    }

    for (column, count) in &merged_rows {
        info!("Merged {} tagged rows into {}", count, column);
    }

    Ok(MergeResult {
        table: MergedTable {
            rows: unigrams.table.rows.clone(),
            columns,
        },
        merged_rows,
    })
}

#[allow(clippy::too_many_arguments)]
fn merge_turn(
    unigrams: &TaggedTable,
    interaction: &InteractionSpan,
    turn: &TurnSpan,
    source: &NgramSource<'_>,
    ngram_turn: &TurnSpan,
    config: &MergeConfig,
    columns: &mut BTreeMap<MergeColumn, Vec<Vec<MergedAnnotation>>>,
    merged_rows: &mut BTreeMap<MergeColumn, usize>,
) -> Result<()> {
    let tagged = source.tagged;
    let size = tagged.size();

    for (offset, ngram_pos) in ngram_turn.rows.clone().enumerate() {
        if !tagged.is_tagged(ngram_pos) {
            continue;
        }
        let ngram = &tagged.table.rows[ngram_pos];
        // Find the covered unigrams
        let span = resolve_span(unigrams, interaction, turn, ngram, offset, size, config)?;

        for (&level, tags) in &tagged.tags {
            let Some(tag) = &tags[ngram_pos] else {
                continue;
            };

            // The n-gram must start with the unigram it was aligned to
            let first = &unigrams.table.rows[span.start];
            if ngram.first_surface(level) != first.surface(level) {
                return Err(PersistenceError::alignment(
                    &interaction.interaction_id,
                    &turn.turn_id,
                    first.index,
                    format!(
                        "{} {:?} (index {}) does not start with {} {:?}",
                        size,
                        ngram.surface(level),
                        ngram.index,
                        level,
                        first.surface(level)
                    ),
                ));
            }

            // One annotation per covered unigram
            let column = MergeColumn { size, level };
            let Some(cells) = columns.get_mut(&column) else {
                continue;
            };
            for (k, position) in span.positions().enumerate() {
                cells[position].push(MergedAnnotation {
                    kind: tag.kind,
                    position: Position::at(k, span.len),
                    value: tag.value.clone(),
                });
            }
            *merged_rows.entry(column).or_default() += 1;
        }
    }

    Ok(())
}

/// Resolve the unigram positions an n-gram row covers
///
/// The span must lie inside the unigram turn; n-grams never cross turns.
fn resolve_span(
    unigrams: &TaggedTable,
    interaction: &InteractionSpan,
    turn: &TurnSpan,
    ngram: &Row,
    offset: usize,
    size: NgramSize,
    config: &MergeConfig,
) -> Result<NgramSpan> {
    let start = match config.alignment {
        AlignmentStrategy::TurnOffset => turn.rows.start + offset,
        AlignmentStrategy::SharedIndex => unigrams
            .table
            .rows
            .binary_search_by_key(&ngram.index, |r| r.index)
            .map_err(|_| {
                PersistenceError::alignment(
                    &interaction.interaction_id,
                    &turn.turn_id,
                    ngram.index,
                    format!("no unigram with the index of this {} row", size),
                )
            })?,
    };
    let span = NgramSpan {
        start,
        len: size.n(),
    };

    if span.start < turn.rows.start || span.positions().end > turn.rows.end {
        return Err(PersistenceError::alignment(
            &interaction.interaction_id,
            &turn.turn_id,
            ngram.index,
            format!(
                "{} {:?} covers positions {:?} outside the turn's unigrams {:?}",
                size,
                ngram.surface(Level::Word),
                span.positions(),
                turn.rows
            ),
        ));
    }

    debug!(
        "{} row {} covers unigrams {:?}",
        size,
        ngram.index,
        span.positions()
    );
    Ok(span)
}

/// Every tag column must be exactly as long as its table
fn check_columns(tagged: &TaggedTable) -> Result<()> {
    for (level, column) in &tagged.tags {
        if column.len() != tagged.table.rows.len() {
            return Err(PersistenceError::data(format!(
                "{} tag column of the {} table has {} entries for {} rows",
                level,
                tagged.size(),
                column.len(),
                tagged.table.rows.len()
            )));
        }
    }
    Ok(())
}

/// Tagged n-gram rows whose turn is missing from the unigram table
fn check_orphans(tagged: &TaggedTable, index: &CorpusIndex, uni_index: &CorpusIndex) -> Result<()> {
    for interaction in &index.interactions {
        for turn in &interaction.turns {
            if uni_index
                .turn(&interaction.interaction_id, &turn.turn_id)
                .is_some()
            {
                continue;
            }
            if let Some(pos) = turn.rows.clone().find(|&pos| tagged.is_tagged(pos)) {
                return Err(PersistenceError::alignment(
                    &interaction.interaction_id,
                    &turn.turn_id,
                    tagged.table.rows[pos].index,
                    format!("tagged {} row has no turn in the unigram table", tagged.size()),
                ));
            }
        }
    }
    Ok(())
}
