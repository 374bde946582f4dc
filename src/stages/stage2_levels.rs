use std::collections::BTreeMap;

use tracing::info;

use crate::error::{PersistenceError, Result};
use crate::exclusion::ExclusionResolver;
use crate::models::{Level, NgramSize, NgramTable, TaggedTable};
use crate::report::summarize_column;

use super::{TaggerConfig, build_index, tag_level};

/// Which levels to tag for each n-gram size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPlan {
    pub combinations: BTreeMap<NgramSize, Vec<Level>>,
}

impl Default for LevelPlan {
    /// Lemmas everywhere, POS patterns only from trigrams up
    fn default() -> Self {
        let pos_and_lemma = vec![Level::Lemma, Level::PosCoarse, Level::PosFine];
        Self {
            combinations: BTreeMap::from([
                (NgramSize::Unigrams, vec![Level::Lemma]),
                (NgramSize::Bigrams, vec![Level::Lemma]),
                (NgramSize::Trigrams, pos_and_lemma.clone()),
                (NgramSize::Quadrigrams, pos_and_lemma),
            ]),
        }
    }
}

impl LevelPlan {
    /// The same levels for every size
    pub fn uniform(levels: &[Level]) -> Self {
        Self {
            combinations: NgramSize::ALL
                .into_iter()
                .map(|size| (size, levels.to_vec()))
                .collect(),
        }
    }

    pub fn levels_for(&self, size: NgramSize) -> &[Level] {
        self.combinations
            .get(&size)
            .map(|levels| levels.as_slice())
            .unwrap_or(&[])
    }
}

/// Execute Stage 2 for one table: run the tagger once per requested level
///
/// Every requested level gets a column, even when nothing was tagged.
pub fn tag_table(
    table: NgramTable,
    levels: &[Level],
    config: &TaggerConfig,
    exclusions: &dyn ExclusionResolver,
) -> Result<TaggedTable> {
    config.validate()?;
    let index = build_index(&table)?;

    info!(
        "Tagging {} table: {} rows in {} interactions",
        table.size,
        table.rows.len(),
        index.interactions.len()
    );

    let mut tags = BTreeMap::new();
    for &level in levels {
        let column = tag_level(&table, &index, level, config, exclusions)?;
        let (origins, reuses) = summarize_column(&column);
        info!(
            "Persistent {} on {} level: {} FPP, {} SPP",
            table.size, level, origins, reuses
        );
        tags.insert(level, column);
    }

    Ok(TaggedTable { table, tags })
}

/// Execute Stage 2 across tables: tag each table with the levels the plan
/// gives its size
///
/// Fails on the first table that does not tag; no partial results are returned.
pub fn tag_tables(
    tables: Vec<NgramTable>,
    plan: &LevelPlan,
    config: &TaggerConfig,
    exclusions: &dyn ExclusionResolver,
) -> Result<Vec<TaggedTable>> {
    let mut seen = Vec::with_capacity(tables.len());
    for table in &tables {
        if seen.contains(&table.size) {
            return Err(PersistenceError::data(format!(
                "more than one {} table supplied",
                table.size
            )));
        }
        seen.push(table.size);
    }

    tables
        .into_iter()
        .map(|table| {
            let levels = plan.levels_for(table.size).to_vec();
            tag_table(table, &levels, config, exclusions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::NoExclusions;
    use crate::testutil::{interaction, ngrams};

    #[test]
    fn test_default_plan() {
        let plan = LevelPlan::default();
        assert_eq!(plan.levels_for(NgramSize::Unigrams), &[Level::Lemma]);
        assert_eq!(plan.levels_for(NgramSize::Trigrams).len(), 3);
        assert!(plan.levels_for(NgramSize::Quadrigrams).contains(&Level::PosFine));
    }

    #[test]
    fn test_tag_table_creates_empty_columns() {
        let table = NgramTable::new(
            NgramSize::Unigrams,
            interaction("1", 0, &[("1", "A", "hallo"), ("2", "S", "tschüss")]),
        );

        let tagged = tag_table(
            table,
            &[Level::Lemma, Level::Word],
            &TaggerConfig::default(),
            &NoExclusions,
        )
        .unwrap();

        assert_eq!(tagged.levels().collect::<Vec<_>>(), vec![Level::Word, Level::Lemma]);
        assert!(tagged.tag_column(Level::Lemma).unwrap().iter().all(|t| t.is_none()));
        assert_eq!(tagged.tag_column(Level::Word).unwrap().len(), 2);
    }

    #[test]
    fn test_tag_tables_per_plan() {
        let unigrams = interaction(
            "1",
            0,
            &[
                ("1", "A", "next"),
                ("1", "A", "event"),
                ("2", "S", "next"),
                ("2", "S", "event"),
            ],
        );
        let tables = vec![
            NgramTable::new(NgramSize::Unigrams, unigrams.clone()),
            ngrams(&unigrams, NgramSize::Bigrams),
            ngrams(&unigrams, NgramSize::Trigrams),
        ];

        let tagged =
            tag_tables(tables, &LevelPlan::default(), &TaggerConfig::default(), &NoExclusions)
                .unwrap();

        assert_eq!(tagged.len(), 3);
        let bigrams = &tagged[1];
        assert_eq!(bigrams.levels().collect::<Vec<_>>(), vec![Level::Lemma]);
        let column = bigrams.tag_column(Level::Lemma).unwrap();
        assert_eq!(column.len(), 2);
        assert_eq!(column[0].as_ref().unwrap().to_string(), "PER_FPP: next event");
        assert_eq!(column[1].as_ref().unwrap().to_string(), "PER_SPP: next event");
        assert!(tagged[2].table.is_empty());
        assert_eq!(tagged[2].tags.len(), 3);
    }

    #[test]
    fn test_duplicate_sizes_rejected() {
        let rows = interaction("1", 0, &[("1", "A", "x")]);
        let tables = vec![
            NgramTable::new(NgramSize::Unigrams, rows.clone()),
            NgramTable::new(NgramSize::Unigrams, rows),
        ];

        let err = tag_tables(tables, &LevelPlan::default(), &TaggerConfig::default(), &NoExclusions)
            .unwrap_err();
        assert!(err.is_data_error());
    }
}
