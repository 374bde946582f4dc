use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{PersistenceError, Result};
use crate::io::{RunMetadata, TableDocument};
use crate::models::TaggedTable;

use super::{MergeResult, TaggerConfig};

/// File name of the merged unigram table
pub const MERGED_FILE_NAME: &str = "persistence_all.json";

/// Configuration for Stage 4 rendering
#[derive(Debug, Clone)]
pub struct Stage4Config {
    /// Whether to write one tagged file per n-gram table
    pub write_tagged: bool,
    /// Whether to write the merged unigram table
    pub write_merged: bool,
}

impl Default for Stage4Config {
    fn default() -> Self {
        Self {
            write_tagged: true,
            write_merged: true,
        }
    }
}

/// Result of Stage 4 rendering
#[derive(Debug, Default)]
pub struct RenderResult {
    pub tagged_paths: Vec<PathBuf>,
    pub merged_path: Option<PathBuf>,
}

/// File name of a tagged n-gram table
pub fn tagged_file_name(tagged: &TaggedTable) -> String {
    format!("persistence_{}.json", tagged.size())
}

/// Execute Stage 4: Rendering
///
/// Produces two kinds of output in `output_dir`:
/// 1. `persistence_<ngram>.json` for every tagged table
/// 2. `persistence_all.json` with every annotation merged onto the unigrams
///
/// All documents are built before the first file is written. Each is written
/// to a staging file next to its target and moved into place only after every
/// write succeeded; on failure no output of this run is left behind.
pub fn execute_render(
    output_dir: &Path,
    tagged: &[TaggedTable],
    merged: Option<&MergeResult>,
    tagger: Option<&TaggerConfig>,
    config: &Stage4Config,
) -> Result<RenderResult> {
    let mut documents: Vec<(PathBuf, TableDocument)> = Vec::new();

    if config.write_tagged {
        for table in tagged {
            let metadata = match tagger {
                Some(tagger) => RunMetadata::for_tagged(table, tagger),
                None => {
                    return Err(PersistenceError::config(
                        "tagged tables are rendered with the tagger settings that produced them",
                    ));
                }
            };
            documents.push((
                output_dir.join(tagged_file_name(table)),
                TableDocument::from_tagged(table, metadata)?,
            ));
        }
    }

    let mut merged_path = None;
    if config.write_merged {
        if let Some(result) = merged {
            let path = output_dir.join(MERGED_FILE_NAME);
            let metadata = RunMetadata::for_merged(result, tagger);
            documents.push((path.clone(), TableDocument::from_merged(result, metadata)?));
            merged_path = Some(path);
        }
    }

    std::fs::create_dir_all(output_dir)
        .map_err(|e| PersistenceError::io(format!("creating {:?}", output_dir), e))?;

    // Stage every document next to its target
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(documents.len());
    for (path, document) in &documents {
        let temp = staging_path(path);
        info!("Writing {} rows to {:?}", document.rows.len(), path);
        if let Err(e) = document.write_json(&temp) {
            discard(staged.iter().map(|(temp, _)| temp).chain([&temp]));
            return Err(e);
        }
        staged.push((temp, path.clone()));
    }

    // Move them into place
    for (done, (temp, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(temp, path) {
            let moved = staged[..done].iter().map(|(_, path)| path);
            let pending = staged[done..].iter().map(|(temp, _)| temp);
            discard(moved.chain(pending));
            return Err(PersistenceError::io(format!("moving {:?} into place", path), e));
        }
    }

    let mut result = RenderResult {
        tagged_paths: Vec::new(),
        merged_path,
    };
    for (_, path) in staged {
        if result.merged_path.as_ref() != Some(&path) {
            result.tagged_paths.push(path);
        }
    }

    Ok(result)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove files of a failed render
fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}
