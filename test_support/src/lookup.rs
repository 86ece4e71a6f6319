//! A dependency lookup over a fixed set of targets.

use std::collections::HashMap;

use tsugite::config::Platform;
use tsugite::layout::TargetLayout;
use tsugite::model::{Target, TargetInfo, TargetLookup};

/// Answers lookups for the targets it was built from.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    infos: HashMap<String, TargetInfo>,
}

impl StaticLookup {
    /// Lookup over `targets` as laid out for `platform`.
    #[must_use]
    pub fn new<'a, I>(targets: I, platform: Platform) -> Self
    where
        I: IntoIterator<Item = &'a Target>,
    {
        let infos = targets
            .into_iter()
            .map(|t| (t.name.clone(), TargetLayout::new(t, platform).target_info()))
            .collect();
        Self { infos }
    }
}

impl TargetLookup for StaticLookup {
    fn target_info(&self, name: &str) -> Option<TargetInfo> {
        self.infos.get(name).cloned()
    }
}
