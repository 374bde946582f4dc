pub mod instructions;
pub mod setting;
pub mod static_list;

pub use instructions::*;
pub use setting::*;
pub use static_list::*;

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result};
use crate::models::{CorpusIndex, InteractionSpan, Level, NgramTable, Row};

/// Everything a resolver may look at when resolving one interaction
#[derive(Debug, Clone, Copy)]
pub struct InteractionContext<'a> {
    pub interaction: &'a InteractionSpan,
    /// Rows of the interaction
    pub rows: &'a [Row],
    /// The whole table being tagged, including any instruction interactions
    pub table: &'a NgramTable,
    pub index: &'a CorpusIndex,
    pub level: Level,
}

/// Decides which surface values of an interaction must never be tagged
///
/// Resolvers are consulted once per interaction and level, never per row.
pub trait ExclusionResolver {
    /// Whether the interaction is a dialogue to tag, as opposed to an
    /// auxiliary block (such as printed instructions) sharing the table
    fn is_dialogue(&self, _interaction_id: &str) -> bool {
        true
    }

    /// Surface values excluded from tagging in this interaction
    fn resolve<'s>(&'s self, context: &InteractionContext<'_>) -> Result<Cow<'s, HashSet<String>>>;
}

/// Resolver that never excludes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl ExclusionResolver for NoExclusions {
    fn resolve<'s>(&'s self, _context: &InteractionContext<'_>) -> Result<Cow<'s, HashSet<String>>> {
        Ok(Cow::Owned(HashSet::new()))
    }
}

/// Serializable description of an exclusion policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Nothing is excluded
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// One global list for every interaction
    Static { values: Vec<String> },
    /// Values of an instruction block stored in the same table
    Instructions {
        /// Interaction id prefix marking instruction blocks
        #[serde(default = "default_instructions_prefix")]
        prefix: String,
        /// Explicit dialogue interaction -> instruction block id
        #[serde(default)]
        mapping: HashMap<String, String>,
        /// Consecutive numeric interactions sharing one block
        #[serde(default)]
        group_size: Option<u64>,
        /// Block id template for grouped mapping
        #[serde(default = "default_instructions_template")]
        template: String,
    },
    /// A list chosen by a marker column of the interaction
    Setting {
        #[serde(default = "default_setting_field")]
        field: String,
        rules: Vec<SettingRule>,
    },
}

fn default_instructions_prefix() -> String {
    "Instructions".to_string()
}

fn default_instructions_template() -> String {
    "Instructions {first} - {last}".to_string()
}

fn default_setting_field() -> String {
    "setting".to_string()
}

impl ExclusionPolicy {
    /// Build the resolver this policy describes
    pub fn build(self) -> Result<Box<dyn ExclusionResolver>> {
        match self {
            ExclusionPolicy::Disabled => Ok(Box::new(NoExclusions)),
            ExclusionPolicy::Static { values } => Ok(Box::new(StaticExclusions::new(values))),
            ExclusionPolicy::Instructions {
                prefix,
                mapping,
                group_size,
                template,
            } => {
                let mapping = match (mapping.is_empty(), group_size) {
                    (false, None) => InstructionMapping::Explicit(mapping),
                    (true, Some(group_size)) => InstructionMapping::grouped(group_size, template)?,
                    (false, Some(_)) => {
                        return Err(PersistenceError::config(
                            "instructions policy takes either a mapping or a group_size, not both",
                        ));
                    }
                    (true, None) => {
                        return Err(PersistenceError::config(
                            "instructions policy needs a mapping or a group_size",
                        ));
                    }
                };
                Ok(Box::new(InstructionExclusions::new(prefix, mapping)))
            }
            ExclusionPolicy::Setting { field, rules } => {
                if rules.is_empty() {
                    return Err(PersistenceError::config("setting policy has no rules"));
                }
                Ok(Box::new(SettingExclusions::new(field, rules)))
            }
        }
    }
}
