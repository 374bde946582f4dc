pub mod error;
pub mod exclusion;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod stages;

#[cfg(test)]
mod testutil;

pub use error::{PersistenceError, Result};
pub use exclusion::{ExclusionPolicy, ExclusionResolver, NoExclusions};
pub use io::{
    RunMetadata, TableDocument, load_exclusion_policy, load_stopwords, load_table,
    load_tagged_table, parse_table_json, parse_tagged_table_json,
};
pub use models::{
    Level, MergedAnnotation, NgramSize, NgramTable, PersistenceTag, Position, Row, TagKind,
    TaggedTable, WindowConfig, WindowUnit,
};
pub use pipeline::{PipelineConfig, PipelineOutput, run_pipeline};
pub use report::{FrequentValue, LevelSummary, inspect, summarize};
pub use stages::{
    AlignmentStrategy, LevelPlan, MergeConfig, MergeResult, MergedTable, Stage4Config,
    TaggerConfig, execute_merge, execute_render, tag_level, tag_table, tag_tables,
};
