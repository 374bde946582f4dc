use std::borrow::Cow;
use std::collections::HashSet;

use crate::error::Result;

use super::{ExclusionResolver, InteractionContext};

/// The same exclusion list for every interaction
///
/// Suits corpora where every participant saw one shared prompt.
#[derive(Debug, Clone, Default)]
pub struct StaticExclusions {
    values: HashSet<String>,
}

impl StaticExclusions {
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ExclusionResolver for StaticExclusions {
    fn resolve<'s>(&'s self, _context: &InteractionContext<'_>) -> Result<Cow<'s, HashSet<String>>> {
        Ok(Cow::Borrowed(&self.values))
    }
}
