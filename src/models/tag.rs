use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a row within a persistence instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// First pair part: the source speaker introduced the value
    Origin,
    /// Second pair part: the target speaker reused the value
    Reuse,
}

impl TagKind {
    pub fn code(&self) -> &'static str {
        match self {
            TagKind::Origin => "FPP",
            TagKind::Reuse => "SPP",
        }
    }
}

/// Persistence tag written by the tagger for one row at one level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersistenceTag {
    pub kind: TagKind,
    pub value: String,
}

impl PersistenceTag {
    pub fn origin(value: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Origin,
            value: value.into(),
        }
    }

    pub fn reuse(value: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Reuse,
            value: value.into(),
        }
    }

    pub fn is_origin(&self) -> bool {
        self.kind == TagKind::Origin
    }

    pub fn is_reuse(&self) -> bool {
        self.kind == TagKind::Reuse
    }
}

/// Table form: `PER_FPP: <value>` / `PER_SPP: <value>`
impl fmt::Display for PersistenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PER_{}: {}", self.kind.code(), self.value)
    }
}

impl FromStr for PersistenceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, value) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed persistence tag: {s:?}"))?;
        let kind = match head.trim() {
            "PER_FPP" => TagKind::Origin,
            "PER_SPP" => TagKind::Reuse,
            other => return Err(format!("unknown persistence tag kind: {other:?}")),
        };
        Ok(Self {
            kind,
            value: value.trim().to_string(),
        })
    }
}

/// Where a unigram sits inside the n-gram that covers it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// The n-gram is the unigram itself
    Single,
    Start,
    Inside,
    End,
}

impl Position {
    /// Position of the `offset`-th covered unigram of an `n`-gram
    pub fn at(offset: usize, n: usize) -> Self {
        if n <= 1 {
            Position::Single
        } else if offset == 0 {
            Position::Start
        } else if offset + 1 >= n {
            Position::End
        } else {
            Position::Inside
        }
    }

    fn label(&self) -> Option<&'static str> {
        match self {
            Position::Single => None,
            Position::Start => Some("start"),
            Position::Inside => Some("inside"),
            Position::End => Some("end"),
        }
    }
}

/// One annotation item in a merged unigram cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedAnnotation {
    pub kind: TagKind,
    pub position: Position,
    pub value: String,
}

impl fmt::Display for MergedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position.label() {
            Some(label) => write!(f, "{}_{}_{}", self.kind.code(), label, self.value),
            None => write!(f, "{}_{}", self.kind.code(), self.value),
        }
    }
}

/// Render a merged cell: items joined by `"; "`, empty when there are none
pub fn render_cell(cell: &[MergedAnnotation]) -> String {
    cell.iter()
        .map(|annotation| annotation.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
