//! Text matching primitives used by rule evaluation
//!
//! Substring checks expect both arguments to be lower-cased already. Whole-word
//! checks go through a compiled case-insensitive [`Regex`] built by
//! [`whole_word_regex`], one per catalog item.

use regex::{Regex, RegexBuilder};

/// Case-insensitive substring containment
pub fn matches(text: &str, keyword: &str) -> bool {
    contains_lowered(&text.to_lowercase(), &keyword.to_lowercase())
}

/// Case-insensitive match of `word` bounded by word boundaries on both sides
pub fn matches_whole_word(text: &str, word: &str) -> bool {
    matches!(whole_word_regex([word]), Ok(Some(regex)) if regex.is_match(text))
}

pub(crate) fn contains_lowered(text: &str, keyword: &str) -> bool {
    !keyword.is_empty() && text.contains(keyword)
}

/// Compile `\b(?:w1|w2|...)\b` over the escaped non-empty words
///
/// Returns `None` when there is nothing to match.
pub fn whole_word_regex<'a, I>(words: I) -> Result<Option<Regex>, regex::Error>
where
    I: IntoIterator<Item = &'a str>,
{
    let alternation = words
        .into_iter()
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>();
    if alternation.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&format!(r"\b(?:{})\b", alternation.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
}

/// True when every character is Basic Latin or falls inside the Latin,
/// punctuation and symbol bands used by channel naming conventions
pub fn is_latin_only(text: &str) -> bool {
    text.chars().all(is_latin_char)
}

/// Stricter variant: printable ASCII plus the general punctuation band
pub fn is_printable_ascii_only(text: &str) -> bool {
    text.chars().all(is_printable_ascii_char)
}

fn is_latin_char(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{024F}'     // Basic Latin, Latin-1 Supplement, Latin Extended-A/B
        | '\u{1E00}'..='\u{1EFF}'   // Latin Extended Additional
        | '\u{2000}'..='\u{206F}'   // General Punctuation
        | '\u{2070}'..='\u{209F}'   // Superscripts and Subscripts
        | '\u{20A0}'..='\u{20CF}'   // Currency Symbols
        | '\u{2100}'..='\u{214F}'   // Letterlike Symbols
    )
}

fn is_printable_ascii_char(c: char) -> bool {
    matches!(c, ' '..='~' | '\t' | '\u{2000}'..='\u{206F}')
}
