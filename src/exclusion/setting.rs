use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result};

use super::{ExclusionResolver, InteractionContext};

/// One setting-dependent exclusion list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRule {
    /// Marker value this rule applies to
    pub setting: String,
    /// Only applies when this speaker takes part in the interaction
    #[serde(default)]
    pub requires_speaker: Option<String>,
    /// Only applies when this speaker does not take part in the interaction
    #[serde(default)]
    pub forbids_speaker: Option<String>,
    /// Values to exclude
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: SettingRule,
    values: HashSet<String>,
}

/// Picks an exclusion list from a marker column of the interaction
///
/// The marker is read from the interaction's first row. Rules are tried in
/// order and the first one whose setting and speaker conditions hold wins;
/// interactions no rule matches exclude nothing.
#[derive(Debug, Clone)]
pub struct SettingExclusions {
    field: String,
    rules: Vec<CompiledRule>,
    empty: HashSet<String>,
}

impl SettingExclusions {
    pub fn new(field: impl Into<String>, rules: Vec<SettingRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CompiledRule {
                values: rule.exclude.iter().cloned().collect(),
                rule,
            })
            .collect();
        Self {
            field: field.into(),
            rules,
            empty: HashSet::new(),
        }
    }
}

impl ExclusionResolver for SettingExclusions {
    fn resolve<'s>(&'s self, context: &InteractionContext<'_>) -> Result<Cow<'s, HashSet<String>>> {
        let Some(first) = context.rows.first() else {
            return Ok(Cow::Borrowed(&self.empty));
        };
        let marker = first.field(&self.field).ok_or_else(|| {
            PersistenceError::data(format!(
                "interaction {} has no {:?} value to choose an exclusion list by",
                context.interaction.interaction_id, self.field
            ))
        })?;

        let has_speaker = |speaker: &str| context.rows.iter().any(|r| r.speaker == speaker);

        let matched = self.rules.iter().find(|compiled| {
            let rule = &compiled.rule;
            rule.setting == marker
                && rule.requires_speaker.as_deref().is_none_or(|s| has_speaker(s))
                && rule.forbids_speaker.as_deref().is_none_or(|s| !has_speaker(s))
        });

        Ok(match matched {
            Some(compiled) => Cow::Borrowed(&compiled.values),
            None => Cow::Borrowed(&self.empty),
        })
    }
}
