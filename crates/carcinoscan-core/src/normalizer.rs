//! Ingredient list normalization and canonical cache keys.
//!
//! Two requests that differ only in ordering, casing or surrounding
//! whitespace collide to the same [`CanonicalKey`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;

use crate::request::IngredientSpec;

/// Token a caller sometimes echoes back as a value. Never an ingredient.
pub const FIELD_NAME_TOKEN: &str = "ingredients";

/// Order- and case-normalized representation of an ingredient list.
///
/// Sorted, lower-cased, deduplicated names joined with commas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized ingredient query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientQuery {
    /// The caller's input, as received (used for audit records)
    pub raw: String,

    /// Cleaned names in original order, first spelling wins on duplicates
    pub names: Vec<String>,

    /// Cache key for this set of names
    pub key: CanonicalKey,
}

impl IngredientQuery {
    /// Normalize a comma-separated ingredient string.
    pub fn parse(raw: &str) -> Self {
        Self::from_tokens(raw.to_string(), raw.split(','))
    }

    /// Normalize either request form.
    pub fn from_spec(spec: &IngredientSpec) -> Self {
        match spec {
            IngredientSpec::Text(raw) => Self::parse(raw),
            IngredientSpec::List(items) => Self::from_tokens(
                items.join(", "),
                items.iter().flat_map(|item| item.split(',')),
            ),
        }
    }

    fn from_tokens<'a>(raw: String, tokens: impl Iterator<Item = &'a str>) -> Self {
        let mut seen = HashSet::new();
        let names: Vec<String> = tokens
            .filter_map(clean_token)
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect();
        let key = canonical_key(&names);
        Self { raw, names, key }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Trim a token and drop it when empty or the field-name echo.
fn clean_token(token: &str) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(FIELD_NAME_TOKEN) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the canonical key for a list of names.
pub fn canonical_key<S: AsRef<str>>(names: &[S]) -> CanonicalKey {
    let set: BTreeSet<String> = names
        .iter()
        .filter_map(|n| clean_token(n.as_ref()))
        .map(|n| n.to_lowercase())
        .collect();
    CanonicalKey(set.into_iter().collect::<Vec<_>>().join(","))
}
