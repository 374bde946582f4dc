use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Row;

/// How the window distance between two rows is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
    /// Difference of the rows' `index` values. Gaps in the index shrink the
    /// window; n-gram tables keyed by their first token's unigram index are
    /// measured in unigram tokens.
    Index,
    /// Number of rows of the table being tagged (n-gram units for n-gram tables)
    Row,
}

impl fmt::Display for WindowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowUnit::Index => f.write_str("index"),
            WindowUnit::Row => f.write_str("row"),
        }
    }
}

impl FromStr for WindowUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "index" => Ok(WindowUnit::Index),
            "row" | "rows" => Ok(WindowUnit::Row),
            other => Err(format!("unknown window unit: {other}")),
        }
    }
}

/// Configuration for the backward and forward search windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum distance from the current row
    pub size: u64,
    pub unit: WindowUnit,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: 150,
            unit: WindowUnit::Index,
        }
    }
}

impl WindowConfig {
    /// Positions of the rows strictly preceding `pos` and within reach of it
    ///
    /// `rows` must be a single interaction ordered by `index`; the window is
    /// clipped to its first row.
    pub fn preceding(&self, rows: &[Row], pos: usize) -> Range<usize> {
        let pos = pos.min(rows.len());
        let start = match self.unit {
            WindowUnit::Row => pos.saturating_sub(self.size as usize),
            WindowUnit::Index => match rows.get(pos) {
                Some(current) => {
                    let lowest = current.index.saturating_sub(self.size);
                    rows[..pos].partition_point(|r| r.index < lowest)
                }
                None => pos,
            },
        };
        start..pos
    }

    /// Positions of the rows strictly following `pos` and within reach of it
    ///
    /// Clipped to the last row of the interaction.
    pub fn following(&self, rows: &[Row], pos: usize) -> Range<usize> {
        let first = (pos + 1).min(rows.len());
        let end = match self.unit {
            WindowUnit::Row => first.saturating_add(self.size as usize).min(rows.len()),
            WindowUnit::Index => match rows.get(pos) {
                Some(current) => {
                    let highest = current.index.saturating_add(self.size);
                    first + rows[first..].partition_point(|r| r.index <= highest)
                }
                None => first,
            },
        };
        first..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::row;

    fn rows_at(indices: &[u64]) -> Vec<Row> {
        indices
            .iter()
            .map(|&i| row(i, "1", "1", "A", "x"))
            .collect()
    }

    #[test]
    fn test_index_windows_clip_to_interaction() {
        let rows = rows_at(&[10, 11, 12, 13, 14]);
        let window = WindowConfig {
            size: 2,
            unit: WindowUnit::Index,
        };

        assert_eq!(window.preceding(&rows, 0), 0..0);
        assert_eq!(window.preceding(&rows, 3), 1..3);
        assert_eq!(window.following(&rows, 4), 5..5);
        assert_eq!(window.following(&rows, 1), 2..4);
    }

    #[test]
    fn test_index_window_respects_gaps() {
        // 20 is more than 3 away from 15
        let rows = rows_at(&[10, 14, 15, 20]);
        let window = WindowConfig {
            size: 3,
            unit: WindowUnit::Index,
        };

        assert_eq!(window.preceding(&rows, 2), 1..2);
        assert_eq!(window.following(&rows, 2), 3..3);
    }

    #[test]
    fn test_row_windows() {
        let rows = rows_at(&[10, 14, 15, 20]);
        let window = WindowConfig {
            size: 2,
            unit: WindowUnit::Row,
        };

        assert_eq!(window.preceding(&rows, 3), 1..3);
        assert_eq!(window.following(&rows, 0), 1..3);
        assert_eq!(window.following(&rows, 2), 3..4);
    }

    #[test]
    fn test_zero_window_is_empty() {
        let rows = rows_at(&[0, 1, 2]);
        let window = WindowConfig {
            size: 0,
            unit: WindowUnit::Index,
        };

        assert!(window.preceding(&rows, 1).is_empty());
        assert!(window.following(&rows, 1).is_empty());
    }
}
