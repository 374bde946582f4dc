use tracing::info;

use crate::error::{PersistenceError, Result};
use crate::exclusion::ExclusionResolver;
use crate::models::{NgramSize, NgramTable, TaggedTable};
use crate::stages::{LevelPlan, MergeConfig, MergeResult, TaggerConfig, execute_merge, tag_tables};

/// Everything one tagging and merging run needs
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub tagger: TaggerConfig,
    pub plan: LevelPlan,
    pub merge: MergeConfig,
}

/// All outputs of a run, kept in memory until the caller writes them
#[derive(Debug)]
pub struct PipelineOutput {
    /// Tagged tables in ascending n-gram size
    pub tagged: Vec<TaggedTable>,
    pub merged: MergeResult,
}

impl PipelineOutput {
    pub fn table(&self, size: NgramSize) -> Option<&TaggedTable> {
        self.tagged.iter().find(|tagged| tagged.size() == size)
    }
}

/// Tag every table with the plan, then merge all of them onto the unigrams
///
/// The unigram table is required; any larger size may be left out. Nothing is
/// returned unless every stage succeeded.
pub fn run_pipeline(
    tables: Vec<NgramTable>,
    config: &PipelineConfig,
    exclusions: &dyn ExclusionResolver,
) -> Result<PipelineOutput> {
    if !tables.iter().any(|table| table.size == NgramSize::Unigrams) {
        return Err(PersistenceError::data("a unigram table is required"));
    }

    let mut tagged = tag_tables(tables, &config.plan, &config.tagger, exclusions)?;
    tagged.sort_by_key(|table| table.size());

    let (unigrams, ngrams) = tagged
        .split_first()
        .ok_or_else(|| PersistenceError::data("a unigram table is required"))?;
    let ngrams: Vec<&TaggedTable> = ngrams.iter().collect();
    let merged = execute_merge(unigrams, &ngrams, &config.merge)?;

    info!(
        "Pipeline complete: {} tables tagged, {} merged columns",
        tagged.len(),
        merged.table.columns.len()
    );

    Ok(PipelineOutput { tagged, merged })
}
