use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{PersistenceError, Result};
use crate::exclusion::{ExclusionResolver, InteractionContext};
use crate::models::{CorpusIndex, Level, NgramTable, PersistenceTag, Row, WindowConfig};

/// Configuration for Stage 1 tagging
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    /// Speaker whose values may prime (by default the voice assistant)
    pub source_speaker: String,
    /// Speaker whose reuse is tagged (by default the human)
    pub target_speaker: String,
    /// Backward and forward search window
    pub window: WindowConfig,
    /// Values never tagged at any level
    pub stopwords: HashSet<String>,
    /// Values containing this marker were not identifiable by the tagger
    pub placeholder_marker: String,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            source_speaker: "A".to_string(),
            target_speaker: "S".to_string(),
            window: WindowConfig::default(),
            stopwords: HashSet::new(),
            placeholder_marker: "non_identifiable".to_string(),
        }
    }
}

impl TaggerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_speaker == self.target_speaker {
            return Err(PersistenceError::config(format!(
                "source and target speaker are both {:?}",
                self.source_speaker
            )));
        }
        Ok(())
    }

    /// Whether a source value may open a persistence instance at all
    fn is_candidate(&self, value: &str, excluded: &HashSet<String>) -> bool {
        !value.is_empty()
            && !self.stopwords.contains(value)
            && !(!self.placeholder_marker.is_empty() && value.contains(&self.placeholder_marker))
            && !excluded.contains(value)
    }
}

/// Execute Stage 1 for one level: tag persistence across a whole table
///
/// Returns one tag slot per row of `table`. Each interaction is tagged
/// independently into its own accumulator; the accumulators are joined in
/// table order. Interactions the resolver marks as non-dialogue stay untagged.
pub fn tag_level(
    table: &NgramTable,
    index: &CorpusIndex,
    level: Level,
    config: &TaggerConfig,
    exclusions: &dyn ExclusionResolver,
) -> Result<Vec<Option<PersistenceTag>>> {
    if index.total_rows() != table.rows.len() {
        return Err(PersistenceError::data(format!(
            "index covers {} rows but the {} table has {}",
            index.total_rows(),
            table.size,
            table.rows.len()
        )));
    }

    let mut column: Vec<Option<PersistenceTag>> = Vec::with_capacity(table.rows.len());

    for interaction in &index.interactions {
        // Accumulators are joined in table order
        if interaction.rows.start != column.len() {
            return Err(PersistenceError::data(format!(
                "interaction {} does not follow the previous one in the {} table",
                interaction.interaction_id, table.size
            )));
        }
        let rows = &table.rows[interaction.rows.clone()];

        // Instruction blocks and other auxiliary interactions stay untagged
        if !exclusions.is_dialogue(&interaction.interaction_id) {
            debug!(
                "Skipping non-dialogue interaction {}",
                interaction.interaction_id
            );
            column.extend(std::iter::repeat_n(None, rows.len()));
            continue;
        }

        let context = InteractionContext {
            interaction,
            rows,
            table,
            index,
            level,
        };
        // Resolve exclusions once for the whole interaction
        let excluded = exclusions.resolve(&context)?;
        column.extend(tag_interaction(rows, level, config, &excluded));
    }

    Ok(column)
}

/// Tag one interaction at one level
///
/// For every candidate row of the source speaker:
/// 1. Walk the chain of earlier occurrences back to its originator and skip
///    the row unless the source speaker introduced the value
/// 2. Collect the target speaker's occurrences in the forward window
/// 3. If there are any, tag the row as origin and each occurrence as reuse
///
/// `rows` must hold exactly one interaction ordered by `index`.
pub fn tag_interaction(
    rows: &[Row],
    level: Level,
    config: &TaggerConfig,
    excluded: &HashSet<String>,
) -> Vec<Option<PersistenceTag>> {
    let mut tags: Vec<Option<PersistenceTag>> = vec![None; rows.len()];
    let occurrences = occurrence_lists(rows, level);

    for (pos, row) in rows.iter().enumerate() {
        if row.speaker != config.source_speaker {
            continue;
        }
        let value = row.surface(level);
        if !config.is_candidate(value, excluded) {
            continue;
        }
        let Some(positions) = occurrences.get(value) else {
            continue;
        };

        // Walk back to whoever introduced the value
        if let Some(originator) = resolve_originator(rows, positions, pos, &config.window) {
            if rows[originator].speaker != config.source_speaker {
                debug!(
                    "{} {:?} at index {} was introduced by {} at index {}",
                    level, value, row.index, rows[originator].speaker, rows[originator].index
                );
                continue;
            }
        }

        // Collect target reuses in the forward window
        let reuses = forward_reuses(rows, positions, pos, config);
        if reuses.is_empty() {
            continue;
        }

        tags[pos] = Some(PersistenceTag::origin(value));
        for reuse in reuses {
            tags[reuse] = Some(PersistenceTag::reuse(value));
        }
    }

    tags
}

/// Positions of every value in the interaction, ascending
fn occurrence_lists(rows: &[Row], level: Level) -> HashMap<&str, Vec<usize>> {
    let mut occurrences: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, row) in rows.iter().enumerate() {
        occurrences.entry(row.surface(level)).or_default().push(pos);
    }
    occurrences
}

/// Earliest occurrence among `positions` inside the window preceding `end`
fn earliest_preceding(
    rows: &[Row],
    positions: &[usize],
    end: usize,
    window: &WindowConfig,
) -> Option<usize> {
    let reach = window.preceding(rows, end);
    let first = positions.partition_point(|&p| p < reach.start);
    positions.get(first).copied().filter(|&p| p < end)
}

/// Resolve who first introduced the value at `pos`
///
/// Each step jumps to the earliest occurrence in the window before the
/// previous one, so the walk strictly moves backward and stays inside the
/// interaction. Returns `None` when the value has no earlier occurrence.
pub(crate) fn resolve_originator(
    rows: &[Row],
    positions: &[usize],
    pos: usize,
    window: &WindowConfig,
) -> Option<usize> {
    let mut earliest = earliest_preceding(rows, positions, pos, window)?;
    while let Some(previous) = earliest_preceding(rows, positions, earliest, window) {
        earliest = previous;
    }
    Some(earliest)
}

/// Target speaker occurrences inside the window following `pos`
fn forward_reuses(
    rows: &[Row],
    positions: &[usize],
    pos: usize,
    config: &TaggerConfig,
) -> Vec<usize> {
    let reach = config.window.following(rows, pos);
    let first = positions.partition_point(|&p| p < reach.start);
    positions[first..]
        .iter()
        .copied()
        .take_while(|&p| p < reach.end)
        .filter(|&p| rows[p].speaker == config.target_speaker)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::exclusion::{
        InstructionExclusions, InstructionMapping, NoExclusions, StaticExclusions,
    };
    use crate::io::{RunMetadata, TableDocument, load_table};
    use crate::models::{NgramSize, TaggedTable, WindowUnit};
    use crate::stages::build_index;
    use crate::testutil::{interaction, row};

    fn tag(rows: Vec<Row>, config: &TaggerConfig) -> Vec<Option<PersistenceTag>> {
        tag_with(rows, config, &NoExclusions)
    }

    fn tag_with(
        rows: Vec<Row>,
        config: &TaggerConfig,
        exclusions: &dyn ExclusionResolver,
    ) -> Vec<Option<PersistenceTag>> {
        let table = NgramTable::new(NgramSize::Unigrams, rows);
        let index = build_index(&table).unwrap();
        tag_level(&table, &index, Level::Lemma, config, exclusions).unwrap()
    }

    fn rendered(tags: &[Option<PersistenceTag>]) -> Vec<String> {
        tags.iter()
            .map(|t| t.as_ref().map(|t| t.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_calendar_scenario() {
        let rows = interaction(
            "I1",
            0,
            &[
                ("T1", "A", "calendar"),
                ("T1", "S", "okay"),
                ("T1", "S", "calendar"),
                ("T1", "A", "event"),
            ],
        );

        let tags = tag(rows, &TaggerConfig::default());

        assert_eq!(
            rendered(&tags),
            vec!["PER_FPP: calendar", "", "PER_SPP: calendar", ""]
        );
    }

    #[test]
    fn test_chain_walks_past_intermediate_reuse() {
        // A introduces x, S reuses it, A says it again: the originator of
        // index 2 is A at index 0, not S at index 1
        let rows = interaction("1", 0, &[("1", "A", "x"), ("2", "S", "x"), ("3", "A", "x")]);
        let positions = vec![0, 1, 2];
        let window = WindowConfig {
            size: 2,
            unit: WindowUnit::Index,
        };

        assert_eq!(resolve_originator(&rows, &positions, 2, &window), Some(0));
        assert_eq!(resolve_originator(&rows, &positions, 0, &window), None);
    }

    #[test]
    fn test_chain_extends_beyond_one_window() {
        // S at 0, A at 3, A at 6, all three apart: with W=3 the chain from
        // 6 reaches 3 and then 0, so S introduced the value
        let rows = vec![
            row(0, "1", "1", "S", "x"),
            row(3, "1", "2", "A", "x"),
            row(6, "1", "2", "A", "x"),
            row(7, "1", "3", "S", "x"),
        ];
        let config = TaggerConfig {
            window: WindowConfig {
                size: 3,
                unit: WindowUnit::Index,
            },
            ..Default::default()
        };

        let tags = tag(rows, &config);

        assert!(tags.iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_chain_breaks_at_window_gap() {
        // S at 0 is out of reach of A at 4 with W=3, so A introduced it
        let rows = vec![
            row(0, "1", "1", "S", "x"),
            row(4, "1", "2", "A", "x"),
            row(5, "1", "3", "S", "x"),
        ];
        let config = TaggerConfig {
            window: WindowConfig {
                size: 3,
                unit: WindowUnit::Index,
            },
            ..Default::default()
        };

        let tags = tag(rows, &config);

        assert_eq!(rendered(&tags), vec!["", "PER_FPP: x", "PER_SPP: x"]);
    }

    #[test]
    fn test_row_unit_changes_chain_reach() {
        // Index distance puts S at 0 out of reach of A at 40; one row back does not
        let rows = vec![
            row(0, "1", "1", "S", "x"),
            row(40, "1", "2", "A", "x"),
            row(45, "1", "3", "S", "x"),
        ];
        let by_index = TaggerConfig {
            window: WindowConfig {
                size: 10,
                unit: WindowUnit::Index,
            },
            ..Default::default()
        };
        let by_row = TaggerConfig {
            window: WindowConfig {
                size: 1,
                unit: WindowUnit::Row,
            },
            ..Default::default()
        };

        assert_eq!(
            rendered(&tag(rows.clone(), &by_index)),
            vec!["", "PER_FPP: x", "PER_SPP: x"]
        );
        assert!(tag(rows, &by_row).iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_row_unit_forward_window() {
        let rows = vec![
            row(0, "1", "1", "A", "x"),
            row(1, "1", "2", "S", "y"),
            row(50, "1", "2", "S", "x"),
        ];
        let by_row = TaggerConfig {
            window: WindowConfig {
                size: 2,
                unit: WindowUnit::Row,
            },
            ..Default::default()
        };
        let by_index = TaggerConfig {
            window: WindowConfig {
                size: 2,
                unit: WindowUnit::Index,
            },
            ..Default::default()
        };

        assert_eq!(
            rendered(&tag(rows.clone(), &by_row)),
            vec!["PER_FPP: x", "", "PER_SPP: x"]
        );
        assert!(tag(rows, &by_index).iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_instruction_blocks_skipped_and_excluded() {
        // The block would tag itself if it were a dialogue
        let mut rows = interaction(
            "Instructions 1 - 3",
            0,
            &[("1", "A", "Wecker"), ("2", "S", "Wecker")],
        );
        rows.extend(interaction(
            "1",
            2,
            &[
                ("1", "A", "Wecker"),
                ("1", "A", "Uhr"),
                ("2", "S", "Wecker"),
                ("2", "S", "Uhr"),
            ],
        ));
        let exclusions = InstructionExclusions::new(
            "Instructions",
            InstructionMapping::grouped(3, "Instructions {first} - {last}").unwrap(),
        );

        let tags = tag_with(rows, &TaggerConfig::default(), &exclusions);

        assert_eq!(
            rendered(&tags),
            vec!["", "", "", "PER_FPP: Uhr", "", "PER_SPP: Uhr"]
        );
    }

    #[test]
    fn test_target_introduced_value_is_not_origin() {
        let rows = interaction(
            "1",
            0,
            &[("1", "S", "weather"), ("2", "A", "weather"), ("3", "S", "weather")],
        );

        let tags = tag(rows, &TaggerConfig::default());

        assert!(tags.iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_reuse_outside_window_is_ignored() {
        let rows = vec![row(0, "1", "1", "A", "alarm"), row(10, "1", "2", "S", "alarm")];
        let config = TaggerConfig {
            window: WindowConfig {
                size: 5,
                unit: WindowUnit::Index,
            },
            ..Default::default()
        };

        assert!(tag(rows, &config).iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_multiple_reuses_and_other_speakers() {
        let rows = interaction(
            "1",
            0,
            &[
                ("1", "A", "quiz"),
                ("2", "J", "quiz"),
                ("3", "S", "quiz"),
                ("3", "S", "quiz"),
            ],
        );

        let tags = tag(rows, &TaggerConfig::default());

        assert_eq!(
            rendered(&tags),
            vec!["PER_FPP: quiz", "", "PER_SPP: quiz", "PER_SPP: quiz"]
        );
    }

    #[test]
    fn test_no_cross_interaction_leakage() {
        let mut rows = interaction("1", 0, &[("1", "S", "song"), ("1", "A", "play")]);
        rows.extend(interaction("2", 2, &[("1", "A", "song"), ("2", "S", "play")]));

        let tags = tag(rows, &TaggerConfig::default());

        // "song" by S in interaction 1 does not disqualify A in interaction 2,
        // and "play" by A in interaction 1 is not reused across the boundary
        assert!(tags[1].is_none());
        assert!(tags[3].is_none());
        assert!(tags[2].is_none());
    }

    #[test]
    fn test_stopwords_placeholders_and_exclusions() {
        let rows = interaction(
            "1",
            0,
            &[
                ("1", "A", "the"),
                ("1", "A", "non_identifiable_lemma"),
                ("1", "A", "Termin"),
                ("1", "A", "Uhr"),
                ("2", "S", "the"),
                ("2", "S", "non_identifiable_lemma"),
                ("2", "S", "Termin"),
                ("2", "S", "Uhr"),
            ],
        );
        let config = TaggerConfig {
            stopwords: HashSet::from(["the".to_string()]),
            ..Default::default()
        };
        let exclusions = StaticExclusions::new(vec!["Termin".to_string()]);

        let tags = tag_with(rows, &config, &exclusions);

        assert_eq!(
            rendered(&tags),
            vec!["", "", "", "PER_FPP: Uhr", "", "", "", "PER_SPP: Uhr"]
        );
    }

    #[test]
    fn test_boundary_rows_have_empty_windows() {
        let rows = interaction("1", 0, &[("1", "A", "solo")]);
        let tags = tag(rows, &TaggerConfig::default());
        assert_eq!(tags, vec![None]);
    }

    #[test]
    fn test_every_origin_pairs_with_a_reuse() {
        let rows = interaction(
            "1",
            0,
            &[
                ("1", "A", "set"),
                ("1", "A", "alarm"),
                ("2", "S", "set"),
                ("2", "S", "timer"),
                ("3", "A", "timer"),
                ("3", "A", "alarm"),
                ("4", "S", "alarm"),
            ],
        );
        let tags = tag(rows, &TaggerConfig::default());

        for tag in tags.iter().flatten() {
            let partner = tags.iter().flatten().any(|other| {
                other.value == tag.value && other.kind != tag.kind
            });
            assert!(partner, "unpaired {tag}");
        }
        assert_eq!(tags.iter().flatten().count(), 5);
    }

    #[test]
    fn test_retagging_is_idempotent() {
        let rows = interaction(
            "1",
            0,
            &[("1", "A", "x"), ("2", "S", "x"), ("3", "A", "x"), ("4", "S", "x")],
        );
        let config = TaggerConfig::default();
        let first = tag(rows.clone(), &config);

        // Write the tagged table and read it back without its tag columns
        let tagged = TaggedTable {
            table: NgramTable::new(NgramSize::Unigrams, rows.clone()),
            tags: BTreeMap::from([(Level::Lemma, first.clone())]),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistence_unigrams.json");
        let metadata = RunMetadata::for_tagged(&tagged, &config);
        TableDocument::from_tagged(&tagged, metadata)
            .unwrap()
            .write_json(&path)
            .unwrap();
        let reloaded = load_table(&path, NgramSize::Unigrams).unwrap();
        assert_eq!(reloaded.rows, rows);

        let second = tag(reloaded.rows, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_speakers_rejected() {
        let config = TaggerConfig {
            target_speaker: "A".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mismatched_index_is_data_error() {
        let table = NgramTable::new(NgramSize::Unigrams, interaction("1", 0, &[("1", "A", "x")]));
        let other = NgramTable::new(
            NgramSize::Unigrams,
            interaction("1", 0, &[("1", "A", "x"), ("1", "A", "y")]),
        );
        let index = build_index(&other).unwrap();

        let err = tag_level(&table, &index, Level::Lemma, &TaggerConfig::default(), &NoExclusions)
            .unwrap_err();
        assert!(err.is_data_error());
    }
}
