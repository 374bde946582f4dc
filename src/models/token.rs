use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::PersistenceTag;

/// Surface representation a row can be tagged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "word")]
    Word,
    #[serde(rename = "lemma")]
    Lemma,
    #[serde(rename = "pos_coarse")]
    PosCoarse,
    #[serde(rename = "pos_finegrained")]
    PosFine,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Word, Level::Lemma, Level::PosCoarse, Level::PosFine];

    /// Column holding this level's surface value
    pub fn column(&self) -> &'static str {
        match self {
            Level::Word => "word",
            Level::Lemma => "lemma",
            Level::PosCoarse => "pos_coarse",
            Level::PosFine => "pos_finegrained",
        }
    }

    /// Column holding this level's persistence tag in a tagged table
    pub fn tag_column(&self) -> String {
        format!("persistence_{}", self.column())
    }

    pub fn is_pos(&self) -> bool {
        matches!(self, Level::PosCoarse | Level::PosFine)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "word" => Ok(Level::Word),
            "lemma" => Ok(Level::Lemma),
            "pos_coarse" | "pos-coarse" => Ok(Level::PosCoarse),
            "pos_finegrained" | "pos_fine" | "pos-fine" => Ok(Level::PosFine),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// Number of contiguous tokens an n-gram row covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NgramSize {
    Unigrams,
    Bigrams,
    Trigrams,
    Quadrigrams,
}

impl NgramSize {
    pub const ALL: [NgramSize; 4] = [
        NgramSize::Unigrams,
        NgramSize::Bigrams,
        NgramSize::Trigrams,
        NgramSize::Quadrigrams,
    ];

    pub fn n(&self) -> usize {
        match self {
            NgramSize::Unigrams => 1,
            NgramSize::Bigrams => 2,
            NgramSize::Trigrams => 3,
            NgramSize::Quadrigrams => 4,
        }
    }

    pub fn from_n(n: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.n() == n)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NgramSize::Unigrams => "unigrams",
            NgramSize::Bigrams => "bigrams",
            NgramSize::Trigrams => "trigrams",
            NgramSize::Quadrigrams => "quadrigrams",
        }
    }
}

impl fmt::Display for NgramSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NgramSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Ok(n) = s.parse::<usize>() {
            return Self::from_n(n).ok_or_else(|| format!("unsupported n-gram size: {n}"));
        }
        Self::ALL
            .into_iter()
            .find(|size| size.name() == s || size.name().trim_end_matches('s') == s)
            .ok_or_else(|| format!("unknown n-gram size: {s}"))
    }
}

/// One row of a granularity table: a unigram, bigram, trigram or quadrigram
///
/// N-gram rows carry the covered values joined by single spaces in every
/// surface column. Columns the pipeline does not know are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Strictly increasing position within the whole table
    #[serde(rename = "id")]
    pub index: u64,
    #[serde(deserialize_with = "string_or_number")]
    pub interaction_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub turn_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub speaker: String,
    pub word: String,
    pub lemma: String,
    pub pos_coarse: String,
    pub pos_finegrained: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Row {
    /// Surface value at the given level
    pub fn surface(&self, level: Level) -> &str {
        match level {
            Level::Word => &self.word,
            Level::Lemma => &self.lemma,
            Level::PosCoarse => &self.pos_coarse,
            Level::PosFine => &self.pos_finegrained,
        }
    }

    /// First covered value of an n-gram surface (the value itself for unigrams)
    pub fn first_surface(&self, level: Level) -> &str {
        self.surface(level).split_whitespace().next().unwrap_or("")
    }

    /// Look up any column by name, including pass-through columns
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.index.to_string()),
            "interaction_id" => Some(self.interaction_id.clone()),
            "turn_id" => Some(self.turn_id.clone()),
            "speaker" => Some(self.speaker.clone()),
            _ => {
                if let Ok(level) = name.parse::<Level>() {
                    return Some(self.surface(level).to_string());
                }
                match self.extra.get(name)? {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                }
            }
        }
    }
}

/// Corpora number their interactions and turns; accept both forms
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// One granularity table, rows ordered by `index`
#[derive(Debug, Clone)]
pub struct NgramTable {
    pub size: NgramSize,
    pub rows: Vec<Row>,
}

impl NgramTable {
    pub fn new(size: NgramSize, rows: Vec<Row>) -> Self {
        Self { size, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A granularity table together with one tag column per tagged level
#[derive(Debug, Clone)]
pub struct TaggedTable {
    pub table: NgramTable,
    /// Tag columns, each exactly as long as `table.rows`
    pub tags: BTreeMap<Level, Vec<Option<PersistenceTag>>>,
}

impl TaggedTable {
    /// A table with no tag columns yet
    pub fn untagged(table: NgramTable) -> Self {
        Self {
            table,
            tags: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> NgramSize {
        self.table.size
    }

    pub fn tag_column(&self, level: Level) -> Option<&[Option<PersistenceTag>]> {
        self.tags.get(&level).map(|column| column.as_slice())
    }

    /// Tagged levels in column order
    pub fn levels(&self) -> impl Iterator<Item = Level> + '_ {
        self.tags.keys().copied()
    }

    /// Whether the row at `position` carries a tag at any level
    pub fn is_tagged(&self, position: usize) -> bool {
        self.tags
            .values()
            .any(|column| column.get(position).is_some_and(|tag| tag.is_some()))
    }
}
