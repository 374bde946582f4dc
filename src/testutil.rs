//! Fixture builders shared by the unit tests

use crate::models::{NgramSize, NgramTable, Row};

/// A unigram row whose word, lemma and POS columns all hold `value`
pub fn row(index: u64, interaction: &str, turn: &str, speaker: &str, value: &str) -> Row {
    Row {
        index,
        interaction_id: interaction.to_string(),
        turn_id: turn.to_string(),
        speaker: speaker.to_string(),
        word: value.to_string(),
        lemma: value.to_string(),
        pos_coarse: value.to_string(),
        pos_finegrained: value.to_string(),
        extra: serde_json::Map::new(),
    }
}

/// One interaction, one row per `(turn, speaker, value)`, indices from `first_index`
pub fn interaction(id: &str, first_index: u64, tokens: &[(&str, &str, &str)]) -> Vec<Row> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, (turn, speaker, value))| row(first_index + i as u64, id, turn, speaker, value))
        .collect()
}

/// Build the n-gram table of a unigram table, never spanning a turn boundary
///
/// Rows are numbered densely; each n-gram joins its covered values with spaces.
pub fn ngrams(unigrams: &[Row], size: NgramSize) -> NgramTable {
    let n = size.n();
    let mut rows = Vec::new();
    let mut start = 0;
    while start < unigrams.len() {
        let mut end = start;
        while end < unigrams.len()
            && unigrams[end].interaction_id == unigrams[start].interaction_id
            && unigrams[end].turn_id == unigrams[start].turn_id
        {
            end += 1;
        }
        let turn = &unigrams[start..end];
        for covered in turn.windows(n) {
            let join = |f: fn(&Row) -> &str| covered.iter().map(f).collect::<Vec<_>>().join(" ");
            rows.push(Row {
                index: rows.len() as u64,
                interaction_id: covered[0].interaction_id.clone(),
                turn_id: covered[0].turn_id.clone(),
                speaker: covered[0].speaker.clone(),
                word: join(|r| &r.word),
                lemma: join(|r| &r.lemma),
                pos_coarse: join(|r| &r.pos_coarse),
                pos_finegrained: join(|r| &r.pos_finegrained),
                extra: serde_json::Map::new(),
            });
        }
        start = end;
    }
    NgramTable::new(size, rows)
}
