use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

use tracing::debug;

use crate::error::{PersistenceError, Result};

use super::{ExclusionResolver, InteractionContext};

/// How a dialogue interaction finds its instruction block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionMapping {
    /// Dialogue interaction id -> instruction block id
    Explicit(HashMap<String, String>),
    /// Numeric interactions `1..=g` share a block, then `g+1..=2g`, and so on.
    /// `{first}` and `{last}` in the template expand to the group bounds.
    Grouped {
        group_size: NonZeroU64,
        template: String,
    },
}

impl InstructionMapping {
    /// Grouped mapping, rejecting an empty group
    pub fn grouped(group_size: u64, template: impl Into<String>) -> Result<Self> {
        let group_size = NonZeroU64::new(group_size)
            .ok_or_else(|| PersistenceError::config("instructions group_size must be at least 1"))?;
        Ok(InstructionMapping::Grouped {
            group_size,
            template: template.into(),
        })
    }

    /// Instruction block id for an interaction, if it has one
    pub fn block_for(&self, interaction_id: &str) -> Result<Option<String>> {
        match self {
            InstructionMapping::Explicit(mapping) => Ok(mapping.get(interaction_id).cloned()),
            InstructionMapping::Grouped {
                group_size,
                template,
            } => {
                let number: u64 = interaction_id.trim().parse().map_err(|_| {
                    PersistenceError::data(format!(
                        "interaction {interaction_id} is not numbered, cannot group it with an instruction block"
                    ))
                })?;
                if number == 0 {
                    return Err(PersistenceError::data(
                        "grouped instruction mapping numbers interactions from 1",
                    ));
                }
                let group_size = group_size.get();
                let first = (number - 1) / group_size * group_size + 1;
                let last = first + group_size - 1;
                Ok(Some(
                    template
                        .replace("{first}", &first.to_string())
                        .replace("{last}", &last.to_string()),
                ))
            }
        }
    }
}

/// Excludes the values of the instruction block a participant read
///
/// Instruction blocks live in the same table as the dialogues, as
/// interactions whose id starts with `prefix`. They are never tagged.
#[derive(Debug, Clone)]
pub struct InstructionExclusions {
    prefix: String,
    mapping: InstructionMapping,
}

impl InstructionExclusions {
    pub fn new(prefix: impl Into<String>, mapping: InstructionMapping) -> Self {
        Self {
            prefix: prefix.into(),
            mapping,
        }
    }
}

impl ExclusionResolver for InstructionExclusions {
    fn is_dialogue(&self, interaction_id: &str) -> bool {
        !interaction_id.starts_with(&self.prefix)
    }

    fn resolve<'s>(&'s self, context: &InteractionContext<'_>) -> Result<Cow<'s, HashSet<String>>> {
        let interaction_id = context.interaction.interaction_id.as_str();
        if !self.is_dialogue(interaction_id) {
            return Ok(Cow::Owned(HashSet::new()));
        }

        let Some(block_id) = self.mapping.block_for(interaction_id)? else {
            debug!("Interaction {} has no instruction block", interaction_id);
            return Ok(Cow::Owned(HashSet::new()));
        };

        let block = context.index.interaction(&block_id).ok_or_else(|| {
            PersistenceError::data(format!(
                "instruction block {block_id:?} for interaction {interaction_id} not found in the {} table",
                context.table.size
            ))
        })?;

        let values: HashSet<String> = context.table.rows[block.rows.clone()]
            .iter()
            .map(|r| r.surface(context.level).to_string())
            .collect();

        debug!(
            "Interaction {}: excluding {} {} values from {:?}",
            interaction_id,
            values.len(),
            context.level,
            block_id
        );

        Ok(Cow::Owned(values))
    }
}
