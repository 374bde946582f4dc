use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PersistenceError, Result};
use crate::models::{NgramSize, Row, TaggedTable, WindowConfig, render_cell};
use crate::report::{LevelSummary, summarize};
use crate::stages::{MergeResult, TaggerConfig};

/// Metadata about the run that produced an output table
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub generated_at: String,
    /// Granularity of the table's rows
    pub ngram: NgramSize,
    pub total_rows: usize,
    /// Tagger settings, absent when the table was only merged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagger: Option<TaggerSettings>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<LevelSummary>,
    /// Tagged n-gram rows written into each merged column
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub merged_rows: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaggerSettings {
    pub window: WindowConfig,
    pub source_speaker: String,
    pub target_speaker: String,
}

impl From<&TaggerConfig> for TaggerSettings {
    fn from(config: &TaggerConfig) -> Self {
        Self {
            window: config.window,
            source_speaker: config.source_speaker.clone(),
            target_speaker: config.target_speaker.clone(),
        }
    }
}

impl RunMetadata {
    fn new(ngram: NgramSize, total_rows: usize, tagger: Option<&TaggerConfig>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            ngram,
            total_rows,
            tagger: tagger.map(TaggerSettings::from),
            levels: Vec::new(),
            merged_rows: BTreeMap::new(),
        }
    }

    /// Metadata for a freshly tagged table
    pub fn for_tagged(tagged: &TaggedTable, config: &TaggerConfig) -> Self {
        let mut metadata = Self::new(tagged.size(), tagged.table.len(), Some(config));
        metadata.levels = summarize(tagged);
        metadata
    }

    /// Metadata for a merged unigram table
    pub fn for_merged(result: &MergeResult, config: Option<&TaggerConfig>) -> Self {
        let mut metadata = Self::new(NgramSize::Unigrams, result.table.rows.len(), config);
        metadata.merged_rows = result
            .merged_rows
            .iter()
            .map(|(column, count)| (column.to_string(), *count))
            .collect();
        metadata
    }
}

/// A table as written to disk: run metadata plus flat row objects
#[derive(Debug, Clone, Serialize)]
pub struct TableDocument {
    pub metadata: RunMetadata,
    pub rows: Vec<Map<String, Value>>,
}

impl TableDocument {
    /// Rows with one `persistence_<level>` column per tagged level
    ///
    /// Untagged rows hold an empty string.
    pub fn from_tagged(tagged: &TaggedTable, metadata: RunMetadata) -> Result<Self> {
        let mut rows = Vec::with_capacity(tagged.table.len());
        for (position, row) in tagged.table.rows.iter().enumerate() {
            let mut fields = row_fields(row)?;
            for (level, column) in &tagged.tags {
                let cell = column
                    .get(position)
                    .and_then(|tag| tag.as_ref())
                    .map(|tag| tag.to_string())
                    .unwrap_or_default();
                fields.insert(level.tag_column(), Value::String(cell));
            }
            rows.push(fields);
        }
        Ok(Self { metadata, rows })
    }

    /// Unigram rows with one `persistence_<ngram>_<level>` column per merged column
    pub fn from_merged(result: &MergeResult, metadata: RunMetadata) -> Result<Self> {
        let merged = &result.table;
        let mut rows = Vec::with_capacity(merged.rows.len());
        for (position, row) in merged.rows.iter().enumerate() {
            let mut fields = row_fields(row)?;
            for (column, cells) in &merged.columns {
                let cell = cells
                    .get(position)
                    .map(|cell| render_cell(cell))
                    .unwrap_or_default();
                fields.insert(column.to_string(), Value::String(cell));
            }
            rows.push(fields);
        }
        Ok(Self { metadata, rows })
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

fn row_fields(row: &Row) -> Result<Map<String, Value>> {
    match serde_json::to_value(row) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(PersistenceError::data(format!(
            "row {} did not serialize to an object",
            row.index
        ))),
        Err(e) => Err(PersistenceError::json(format!("serializing row {}", row.index), e)),
    }
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| PersistenceError::io(format!("creating {:?}", path), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| PersistenceError::json(format!("writing {:?}", path), e))?;
    // Drop discards flush errors
    writer
        .flush()
        .map_err(|e| PersistenceError::io(format!("writing {:?}", path), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::NoExclusions;
    use crate::io::parse_tagged_table_json;
    use crate::models::{Level, NgramTable};
    use crate::stages::{MergeConfig, execute_merge, tag_table};
    use crate::testutil::{interaction, ngrams};

    fn tagged_pair() -> (TaggedTable, TaggedTable) {
        let rows = interaction(
            "1",
            0,
            &[
                ("1", "A", "next"),
                ("1", "A", "event"),
                ("2", "S", "next"),
                ("2", "S", "event"),
            ],
        );
        let config = TaggerConfig::default();
        let unigrams = tag_table(
            NgramTable::new(NgramSize::Unigrams, rows.clone()),
            &[Level::Lemma],
            &config,
            &NoExclusions,
        )
        .unwrap();
        let bigrams = tag_table(
            ngrams(&rows, NgramSize::Bigrams),
            &[Level::Lemma],
            &config,
            &NoExclusions,
        )
        .unwrap();
        (unigrams, bigrams)
    }

    #[test]
    fn test_tagged_document_columns() {
        let (unigrams, _) = tagged_pair();
        let metadata = RunMetadata::for_tagged(&unigrams, &TaggerConfig::default());
        let document = TableDocument::from_tagged(&unigrams, metadata).unwrap();

        assert_eq!(document.rows.len(), 4);
        assert_eq!(document.rows[0]["persistence_lemma"], "PER_FPP: next");
        assert_eq!(document.rows[2]["persistence_lemma"], "PER_SPP: next");
        assert_eq!(document.rows[0]["id"], 0);
        assert_eq!(document.metadata.levels[0].origins, 2);
        assert_eq!(document.metadata.levels[0].reuses, 2);
        assert!(uuid::Uuid::parse_str(&document.metadata.run_id).is_ok());
    }

    #[test]
    fn test_merged_document_cells() {
        let (unigrams, bigrams) = tagged_pair();
        let result = execute_merge(&unigrams, &[&bigrams], &MergeConfig::default()).unwrap();
        let metadata = RunMetadata::for_merged(&result, None);
        let document = TableDocument::from_merged(&result, metadata).unwrap();

        assert_eq!(document.rows[0]["persistence_unigrams_lemma"], "FPP_next");
        assert_eq!(
            document.rows[0]["persistence_bigrams_lemma"],
            "FPP_start_next event"
        );
        assert_eq!(
            document.rows[3]["persistence_bigrams_lemma"],
            "SPP_end_next event"
        );
        assert_eq!(document.metadata.merged_rows["persistence_bigrams_lemma"], 2);
        assert!(document.metadata.tagger.is_none());
    }

    #[test]
    fn test_written_table_reads_back() {
        let (unigrams, _) = tagged_pair();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistence_unigrams.json");

        let metadata = RunMetadata::for_tagged(&unigrams, &TaggerConfig::default());
        TableDocument::from_tagged(&unigrams, metadata)
            .unwrap()
            .write_json(&path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let read = parse_tagged_table_json(&content, NgramSize::Unigrams).unwrap();
        assert_eq!(read.table.rows, unigrams.table.rows);
        assert_eq!(read.tags, unigrams.tags);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_json_reports_full_disk() {
        let value = serde_json::json!({"rows": [1, 2, 3]});
        let result = write_json(Path::new("/dev/full"), &value);
        assert!(result.is_err());
    }
}
