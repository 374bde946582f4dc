use std::collections::HashSet;

use tracing::debug;

use crate::error::{PersistenceError, Result};
use crate::models::{CorpusIndex, InteractionSpan, NgramTable, Row, TurnSpan};

/// Perform Stage 0: index interaction and turn boundaries
///
/// This stage checks the structural invariants every later stage relies on:
/// 1. Row indices strictly increase through the table
/// 2. Each interaction occupies one contiguous block of rows
/// 3. Each turn occupies one contiguous block within its interaction
pub fn build_index(table: &NgramTable) -> Result<CorpusIndex> {
    check_ordering(&table.rows)?;

    let mut interactions: Vec<InteractionSpan> = Vec::new();
    let mut seen_interactions: HashSet<&str> = HashSet::new();
    let mut start = 0usize;

    while start < table.rows.len() {
        let interaction_id = table.rows[start].interaction_id.as_str();
        if !seen_interactions.insert(interaction_id) {
            return Err(PersistenceError::data(format!(
                "interaction {} is split across the {} table (resumes at index {})",
                interaction_id, table.size, table.rows[start].index
            )));
        }

        let end = start
            + table.rows[start..]
                .iter()
                .take_while(|r| r.interaction_id == interaction_id)
                .count();
        // Split the interaction into turns
        let turns = index_turns(&table.rows, start, end)?;

        interactions.push(InteractionSpan {
            interaction_id: interaction_id.to_string(),
            rows: start..end,
            turns,
        });
        start = end;
    }

    debug!(
        "Indexed {} table: {} rows, {} interactions",
        table.size,
        table.rows.len(),
        interactions.len()
    );

    Ok(CorpusIndex::from_spans(interactions))
}

fn check_ordering(rows: &[Row]) -> Result<()> {
    for pair in rows.windows(2) {
        if pair[1].index <= pair[0].index {
            return Err(PersistenceError::data(format!(
                "row indices must strictly increase, found {} after {}",
                pair[1].index, pair[0].index
            )));
        }
    }
    Ok(())
}

/// Split the rows `start..end` of one interaction into turns
fn index_turns(rows: &[Row], start: usize, end: usize) -> Result<Vec<TurnSpan>> {
    let mut turns: Vec<TurnSpan> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut turn_start = start;

    while turn_start < end {
        let turn_id = rows[turn_start].turn_id.as_str();
        if !seen.insert(turn_id) {
            return Err(PersistenceError::data(format!(
                "turn {} of interaction {} is split (resumes at index {})",
                turn_id, rows[turn_start].interaction_id, rows[turn_start].index
            )));
        }
        let turn_end = turn_start
            + rows[turn_start..end]
                .iter()
                .take_while(|r| r.turn_id == turn_id)
                .count();
        turns.push(TurnSpan {
            turn_id: turn_id.to_string(),
            rows: turn_start..turn_end,
        });
        turn_start = turn_end;
    }

    Ok(turns)
}
