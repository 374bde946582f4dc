use std::collections::HashMap;
use std::ops::Range;

/// Contiguous rows of one speaker turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSpan {
    pub turn_id: String,
    /// Row positions in the table
    pub rows: Range<usize>,
}

impl TurnSpan {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Contiguous rows of one interaction, split into turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionSpan {
    pub interaction_id: String,
    /// Row positions in the table
    pub rows: Range<usize>,
    /// Turns in table order
    pub turns: Vec<TurnSpan>,
}

impl InteractionSpan {
    pub fn turn(&self, turn_id: &str) -> Option<&TurnSpan> {
        self.turns.iter().find(|t| t.turn_id == turn_id)
    }
}

/// Interaction and turn boundaries of one table
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    /// Interactions in table order, together covering every row
    pub interactions: Vec<InteractionSpan>,
    by_id: HashMap<String, usize>,
}

impl CorpusIndex {
    pub(crate) fn from_spans(interactions: Vec<InteractionSpan>) -> Self {
        let by_id = interactions
            .iter()
            .enumerate()
            .map(|(i, span)| (span.interaction_id.clone(), i))
            .collect();
        Self {
            interactions,
            by_id,
        }
    }

    pub fn interaction(&self, interaction_id: &str) -> Option<&InteractionSpan> {
        self.by_id
            .get(interaction_id)
            .and_then(|&i| self.interactions.get(i))
    }

    pub fn turn(&self, interaction_id: &str, turn_id: &str) -> Option<&TurnSpan> {
        self.interaction(interaction_id)?.turn(turn_id)
    }

    /// Number of rows covered by all interactions
    pub fn total_rows(&self) -> usize {
        self.interactions.iter().map(|i| i.rows.len()).sum()
    }
}

/// The unigram positions one n-gram row covers, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramSpan {
    /// Unigram position of the first covered token
    pub start: usize,
    /// Number of covered tokens
    pub len: usize,
}

impl NgramSpan {
    pub fn positions(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}
