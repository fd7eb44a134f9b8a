//! Compiled rule evaluation
//!
//! A [`RuleEngine`] is built once per run from a [`RuleSet`]. Category masters are
//! resolved at compile time: an enabled master expands to the category's generic
//! terms plus every item, otherwise only the individually enabled items are kept.
//! Whole-word keywords of each item are compiled into a single regex up front.
//! Evaluation is then a walk over per-item matchers, in a fixed order where the
//! first rejecting check wins.

use std::fmt;
use std::time::Duration;

use regex::Regex;

use super::catalog::{CategoryId, MatchKind, ENCRYPTED_KEYWORDS, RADIO_KEYWORDS};
use super::matcher::{
    contains_lowered, is_latin_only, is_printable_ascii_only, whole_word_regex,
};
use super::RuleSet;
use crate::errors::{ConfigError, ConfigResult};
use crate::run::{RunMode, ThrottleSettings};

/// Why an entry was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NonEnglish,
    NonLatin,
    ExcludedKeyword(String),
    Radio,
    Encrypted,
    Category {
        category: CategoryId,
        item: &'static str,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NonEnglish => write!(f, "non-english"),
            Rejection::NonLatin => write!(f, "non-latin"),
            Rejection::ExcludedKeyword(keyword) => write!(f, "keyword '{keyword}'"),
            Rejection::Radio => write!(f, "radio"),
            Rejection::Encrypted => write!(f, "encrypted"),
            Rejection::Category { category, item } => write!(f, "{category}/{item}"),
        }
    }
}

/// Keywords of one catalog item, split by match kind
#[derive(Debug, Clone)]
struct ItemMatcher {
    item: &'static str,
    substrings: Vec<&'static str>,
    words: Option<Regex>,
}

impl ItemMatcher {
    fn compile(
        item: &'static str,
        keywords: &'static [&'static str],
        kind: MatchKind,
    ) -> ConfigResult<Self> {
        let (substrings, words) = match kind {
            MatchKind::Substring => (keywords.to_vec(), None),
            MatchKind::WholeWord => (Vec::new(), whole_word_regex(keywords.iter().copied())?),
        };
        Ok(Self {
            item,
            substrings,
            words,
        })
    }

    fn hits(&self, lowered: &str) -> bool {
        self.substrings.iter().any(|k| contains_lowered(lowered, k))
            || self.words.as_ref().is_some_and(|regex| regex.is_match(lowered))
    }
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    id: CategoryId,
    matchers: Vec<ItemMatcher>,
}

impl CompiledCategory {
    fn compile(rules: &RuleSet, id: CategoryId) -> ConfigResult<Self> {
        let spec = id.spec();
        let selection = rules.selection(id);
        let mut matchers = Vec::new();

        if selection.remove_all {
            matchers.push(ItemMatcher::compile(
                "*",
                spec.generic_terms,
                spec.generic_kind,
            )?);
            for item in spec.items {
                matchers.push(ItemMatcher::compile(item.key, item.keywords, item.kind)?);
            }
        } else {
            for key in &selection.items {
                let item = spec.item(key).ok_or_else(|| ConfigError::UnknownRuleItem {
                    category: id.to_string(),
                    item: key.clone(),
                })?;
                matchers.push(ItemMatcher::compile(item.key, item.keywords, item.kind)?);
            }
        }

        Ok(Self { id, matchers })
    }

    fn reject(&self, lowered: &str) -> Option<Rejection> {
        self.matchers
            .iter()
            .find(|matcher| matcher.hits(lowered))
            .map(|matcher| Rejection::Category {
                category: self.id,
                item: matcher.item,
            })
    }
}

/// Compiled, read-only evaluator for one run
#[derive(Debug, Clone)]
pub struct RuleEngine {
    remove_non_english: bool,
    remove_non_latin: bool,
    exclude_keywords: Vec<String>,
    regions: CompiledCategory,
    hide_radio: bool,
    hide_encrypted: bool,
    content: Vec<CompiledCategory>,
    remove_duplicates: bool,
    throttle: ThrottleSettings,
}

impl RuleEngine {
    pub fn new(rules: &RuleSet) -> ConfigResult<Self> {
        let content = CategoryId::CONTENT_ORDER
            .iter()
            .map(|id| CompiledCategory::compile(rules, *id))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            remove_non_english: rules.remove_non_english,
            remove_non_latin: rules.remove_non_latin,
            exclude_keywords: rules
                .exclude_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            regions: CompiledCategory::compile(rules, CategoryId::Regions)?,
            hide_radio: rules.hide_radio,
            hide_encrypted: rules.hide_encrypted,
            content,
            remove_duplicates: rules.remove_duplicates,
            throttle: rules.throttle,
        })
    }

    pub fn remove_duplicates(&self) -> bool {
        self.remove_duplicates
    }

    /// Delay inserted after each finalized unit for the given run mode
    pub fn throttle_delay(&self, mode: RunMode) -> Duration {
        self.throttle.delay_for(mode)
    }

    /// True when no check rejects the entry text
    pub fn should_keep(&self, text: &str) -> bool {
        self.evaluate(text).is_none()
    }

    /// First rejecting check for the entry text, if any
    pub fn evaluate(&self, text: &str) -> Option<Rejection> {
        if self.remove_non_english && !is_printable_ascii_only(text) {
            return Some(Rejection::NonEnglish);
        }
        if self.remove_non_latin && !is_latin_only(text) {
            return Some(Rejection::NonLatin);
        }

        let lowered = text.to_lowercase();

        if let Some(keyword) = self
            .exclude_keywords
            .iter()
            .find(|k| contains_lowered(&lowered, k))
        {
            return Some(Rejection::ExcludedKeyword(keyword.clone()));
        }

        if let Some(rejection) = self.regions.reject(&lowered) {
            return Some(rejection);
        }

        if self.hide_radio && RADIO_KEYWORDS.iter().any(|k| contains_lowered(&lowered, k)) {
            return Some(Rejection::Radio);
        }
        if self.hide_encrypted
            && ENCRYPTED_KEYWORDS
                .iter()
                .any(|k| contains_lowered(&lowered, k))
        {
            return Some(Rejection::Encrypted);
        }

        self.content
            .iter()
            .find_map(|category| category.reject(&lowered))
    }
}
