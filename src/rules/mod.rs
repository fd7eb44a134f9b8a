//! Filter rules
//!
//! [`RuleSet`] is the user-facing, serialisable snapshot of every toggle for one
//! run. It is compiled once into a [`RuleEngine`] which evaluates entry text
//! against the [`catalog`] tables.

pub mod catalog;
pub mod engine;
pub mod matcher;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::ConfigResult;
use crate::run::throttle::ThrottleSettings;

pub use catalog::{CategoryId, MatchKind};
pub use engine::RuleEngine;

/// Toggle state of one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySelection {
    /// Master toggle; supersedes `items` when set
    pub remove_all: bool,
    /// Catalog item keys enabled individually
    pub items: BTreeSet<String>,
}

impl CategorySelection {
    pub fn all() -> Self {
        Self {
            remove_all: true,
            items: BTreeSet::new(),
        }
    }

    pub fn with_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remove_all: false,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.remove_all && self.items.is_empty()
    }
}

/// Immutable snapshot of all filter toggles for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Reject entries containing anything outside printable ASCII
    pub remove_non_english: bool,
    /// Reject entries containing non-Latin scripts
    pub remove_non_latin: bool,
    /// Free-text keywords, matched case-insensitively as substrings
    pub exclude_keywords: Vec<String>,
    pub hide_radio: bool,
    pub hide_encrypted: bool,
    /// Drop later occurrences of an already seen channel identifier
    pub remove_duplicates: bool,
    pub regions: CategorySelection,
    pub news: CategorySelection,
    pub sports: CategorySelection,
    pub sport_types: CategorySelection,
    pub music: CategorySelection,
    pub kids: CategorySelection,
    pub reality: CategorySelection,
    pub throttle: ThrottleSettings,
}

impl RuleSet {
    pub fn selection(&self, category: CategoryId) -> &CategorySelection {
        match category {
            CategoryId::Regions => &self.regions,
            CategoryId::News => &self.news,
            CategoryId::Sports => &self.sports,
            CategoryId::SportTypes => &self.sport_types,
            CategoryId::Music => &self.music,
            CategoryId::Kids => &self.kids,
            CategoryId::Reality => &self.reality,
        }
    }

    pub fn selection_mut(&mut self, category: CategoryId) -> &mut CategorySelection {
        match category {
            CategoryId::Regions => &mut self.regions,
            CategoryId::News => &mut self.news,
            CategoryId::Sports => &mut self.sports,
            CategoryId::SportTypes => &mut self.sport_types,
            CategoryId::Music => &mut self.music,
            CategoryId::Kids => &mut self.kids,
            CategoryId::Reality => &mut self.reality,
        }
    }

    /// Compile into an evaluator, rejecting unknown item keys
    pub fn compile(&self) -> ConfigResult<RuleEngine> {
        RuleEngine::new(self)
    }

    /// Number of enabled toggles, counting a master as one
    pub fn active_toggle_count(&self) -> usize {
        let flags = [
            self.remove_non_english,
            self.remove_non_latin,
            self.hide_radio,
            self.hide_encrypted,
            self.remove_duplicates,
        ]
        .iter()
        .filter(|f| **f)
        .count();

        let categories: usize = std::iter::once(CategoryId::Regions)
            .chain(CategoryId::CONTENT_ORDER)
            .map(|id| {
                let selection = self.selection(id);
                if selection.remove_all {
                    1
                } else {
                    selection.items.len()
                }
            })
            .sum();

        flags + categories + self.exclude_keywords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_from_toml() {
        let toml = r#"
remove_duplicates = true
exclude_keywords = ["adult", "XXX"]

[news]
items = ["fox_news", "cnn"]

[sports]
remove_all = true
"#;
        let rules: RuleSet = toml::from_str(toml).unwrap();
        assert!(rules.remove_duplicates);
        assert_eq!(rules.exclude_keywords.len(), 2);
        assert!(rules.news.items.contains("fox_news"));
        assert!(!rules.news.remove_all);
        assert!(rules.sports.remove_all);
        assert!(rules.music.is_empty());
    }

    #[test]
    fn test_active_toggle_count() {
        let mut rules = RuleSet::default();
        assert_eq!(rules.active_toggle_count(), 0);
        rules.hide_radio = true;
        rules.sports = CategorySelection::all();
        rules.news = CategorySelection::with_items(["cnn", "msnbc"]);
        assert_eq!(rules.active_toggle_count(), 4);
    }

    #[test]
    fn test_selection_mut_round_trip() {
        let mut rules = RuleSet::default();
        rules
            .selection_mut(CategoryId::Kids)
            .items
            .insert("nick_jr".to_string());
        assert!(rules.kids.items.contains("nick_jr"));
    }
}
