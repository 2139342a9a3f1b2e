//! Operator registry view and operator-name normalization.
//!
//! Planners tend to emit operator names in whatever convention they saw last
//! (`DocumentMinHashDeduplicator`, `Text-Length-Filter`, `minhash_dedup`).
//! [`resolve_operator_name`] maps those onto the engine's canonical
//! snake_case keys by trying each [`NormalizationRule`] in [`RULES`] order and
//! stopping at the first hit:
//!
//! 1. [`NormalizationRule::Exact`]: the trimmed name is already canonical.
//! 2. [`NormalizationRule::Alias`]: a fixed shorthand from [`ALIASES`].
//! 3. [`NormalizationRule::CaseInsensitive`]: same name, different case.
//! 4. [`NormalizationRule::Alnum`]: same letters and digits once case,
//!    separators and punctuation are dropped.
//!
//! A name no rule resolves is returned trimmed but otherwise untouched, so the
//! validator can reject it under the name the planner used.

use std::collections::BTreeSet;

/// Resolution strategies in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationRule {
    Exact,
    Alias,
    CaseInsensitive,
    Alnum,
}

/// The order in which rules are tried.
pub const RULES: [NormalizationRule; 4] = [
    NormalizationRule::Exact,
    NormalizationRule::Alias,
    NormalizationRule::CaseInsensitive,
    NormalizationRule::Alnum,
];

/// Shorthands that no mechanical rule recovers.
pub const ALIASES: &[(&str, &str)] = &[
    ("minhash_dedup", "document_minhash_deduplicator"),
    ("simhash_dedup", "document_simhash_deduplicator"),
    ("exact_dedup", "document_deduplicator"),
    ("dedup", "document_deduplicator"),
    ("image_dedup", "image_deduplicator"),
    ("length_filter", "text_length_filter"),
    ("language_filter", "language_id_score_filter"),
    ("html_cleaner", "clean_html_mapper"),
    ("strip_html", "clean_html_mapper"),
    ("unicode_fix", "fix_unicode_mapper"),
];

/// Lowercase letters and digits only.
pub fn alnum_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Resolve `raw` against the canonical names in `known`.
///
/// Returns the matched canonical name together with the rule that matched, or
/// `None` if nothing in `known` corresponds to `raw`.
pub fn resolve_with_rule(
    raw: &str,
    known: &BTreeSet<String>,
) -> Option<(String, NormalizationRule)> {
    let name = raw.trim();
    if name.is_empty() {
        return None;
    }

    RULES.iter().find_map(|rule| {
        let hit = match rule {
            NormalizationRule::Exact => known.get(name).cloned(),
            NormalizationRule::Alias => ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|(_, canonical)| (*canonical).to_string())
                .filter(|canonical| known.contains(canonical)),
            NormalizationRule::CaseInsensitive => {
                known.iter().find(|k| k.eq_ignore_ascii_case(name)).cloned()
            }
            NormalizationRule::Alnum => {
                let key = alnum_key(name);
                if key.is_empty() {
                    None
                } else {
                    known.iter().find(|k| alnum_key(k) == key).cloned()
                }
            }
        };
        hit.map(|canonical| (canonical, *rule))
    })
}

/// Resolve `raw` to a canonical name, falling back to the trimmed input.
pub fn resolve_operator_name(raw: &str, known: &BTreeSet<String>) -> String {
    resolve_with_rule(raw, known)
        .map(|(canonical, _)| canonical)
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Read-only view of the operators the external engine provides.
pub trait OperatorRegistry: Send + Sync {
    /// Map an operator name onto the registry's canonical key.
    fn normalize(&self, name: &str) -> String;

    /// Whether `canonical_name` exists in the registry.
    fn is_known(&self, canonical_name: &str) -> bool;
}

/// Registry backed by a fixed set of operator names.
///
/// An empty registry stands for "metadata unavailable": names pass through
/// unchanged and every name is accepted.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    names: BTreeSet<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(|n| Into::<String>::into(n).trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl OperatorRegistry for StaticRegistry {
    fn normalize(&self, name: &str) -> String {
        resolve_operator_name(name, &self.names)
    }

    fn is_known(&self, canonical_name: &str) -> bool {
        self.names.is_empty() || self.names.contains(canonical_name)
    }
}

/// Operators shipped with the processing engine that the built-in templates
/// and common plans draw on.
pub const BUILTIN_OPERATORS: &[&str] = &[
    // mappers
    "clean_copyright_mapper",
    "clean_email_mapper",
    "clean_html_mapper",
    "clean_ip_mapper",
    "clean_links_mapper",
    "chinese_convert_mapper",
    "fix_unicode_mapper",
    "punctuation_normalization_mapper",
    "remove_header_mapper",
    "sentence_split_mapper",
    "whitespace_normalization_mapper",
    // filters
    "alphanumeric_filter",
    "character_repetition_filter",
    "image_aspect_ratio_filter",
    "image_size_filter",
    "image_text_similarity_filter",
    "language_id_score_filter",
    "perplexity_filter",
    "special_characters_filter",
    "text_length_filter",
    "word_repetition_filter",
    "words_num_filter",
    // deduplicators
    "document_deduplicator",
    "document_minhash_deduplicator",
    "document_simhash_deduplicator",
    "image_deduplicator",
];

/// A registry populated with [`BUILTIN_OPERATORS`].
pub fn builtin_registry() -> StaticRegistry {
    StaticRegistry::new(BUILTIN_OPERATORS.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BTreeSet<String> {
        ["document_minhash_deduplicator", "text_length_filter"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_exact_match_wins() {
        assert_eq!(
            resolve_with_rule("text_length_filter", &known()),
            Some(("text_length_filter".to_string(), NormalizationRule::Exact))
        );
    }

    #[test]
    fn test_camel_case_resolves_through_alnum() {
        assert_eq!(
            resolve_with_rule("DocumentMinHashDeduplicator", &known()),
            Some((
                "document_minhash_deduplicator".to_string(),
                NormalizationRule::Alnum
            ))
        );
    }

    #[test]
    fn test_case_insensitive_before_alnum() {
        let (_, rule) = resolve_with_rule("TEXT_LENGTH_FILTER", &known()).unwrap();
        assert_eq!(rule, NormalizationRule::CaseInsensitive);
    }

    #[test]
    fn test_alias_resolves_only_when_target_known() {
        assert_eq!(
            resolve_with_rule("minhash_dedup", &known()).map(|(_, r)| r),
            Some(NormalizationRule::Alias)
        );
        assert_eq!(resolve_with_rule("image_dedup", &known()), None);
    }

    #[test]
    fn test_unknown_name_kept_trimmed() {
        assert_eq!(
            resolve_operator_name("  non_existing_operator  ", &known()),
            "non_existing_operator"
        );
        assert_eq!(resolve_operator_name("", &known()), "");
    }

    #[test]
    fn test_static_registry_normalize_and_lookup() {
        let registry = builtin_registry();
        assert_eq!(
            registry.normalize("Text-Length-Filter"),
            "text_length_filter"
        );
        assert!(registry.is_known("image_deduplicator"));
        assert!(!registry.is_known("teleport_mapper"));
    }

    #[test]
    fn test_empty_registry_accepts_everything() {
        let registry = StaticRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.normalize(" AnyOp "), "AnyOp");
        assert!(registry.is_known("AnyOp"));
    }
}
