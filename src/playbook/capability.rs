//! Shared capabilities of playbook entities
//!
//! Includes, blocks, roles and tasks all carry variables, conditionals
//! and tags. Each concern is a small trait so the scope and conditional
//! resolvers can treat every entity kind the same way.

use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Variable mapping carried by entities and resolved along a scope chain
pub type Vars = BTreeMap<String, Value>;

/// An entity that declares its own variables
pub trait Scoped {
    fn own_vars(&self) -> &Vars;
}

/// An entity guarded by `when` expressions (all must hold)
pub trait Conditional {
    fn when(&self) -> &[String];
}

/// An entity carrying tags
pub trait Taggable {
    fn tags(&self) -> &[String];

    /// Whether this entity is selected by its own tags alone
    fn evaluate_tags(&self, only_tags: &[String], skip_tags: &[String]) -> bool {
        let tags: BTreeSet<&str> = self.tags().iter().map(String::as_str).collect();
        tags_selected(&tags, only_tags, skip_tags)
    }
}

/// Split comma separated entries (`tags: "a, b"`) and drop blanks
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        for part in tag.split(',') {
            let part = part.trim();
            if !part.is_empty() && !out.iter().any(|t: &String| t == part) {
                out.push(part.to_string());
            }
        }
    }
    out
}

/// Tag selection against `--tags` / `--skip-tags` style filters.
///
/// `all` in `only_tags` selects everything, `always` is selected unless
/// skipped explicitly, `tagged` and `untagged` match on tag presence.
pub fn tags_selected(tags: &BTreeSet<&str>, only_tags: &[String], skip_tags: &[String]) -> bool {
    let contains = |list: &[String], tag: &str| list.iter().any(|t| t == tag);
    let intersects = |list: &[String]| list.iter().any(|t| tags.contains(t.as_str()));

    let mut should_run = true;

    if !only_tags.is_empty() {
        should_run = tags.contains("always")
            || contains(only_tags, "all")
            || intersects(only_tags)
            || (contains(only_tags, "tagged") && !tags.is_empty())
            || (contains(only_tags, "untagged") && tags.is_empty());
    }

    if should_run && !skip_tags.is_empty() {
        if contains(skip_tags, "all") {
            if !tags.contains("always") || contains(skip_tags, "always") {
                should_run = false;
            }
        } else if intersects(skip_tags) || (contains(skip_tags, "tagged") && !tags.is_empty()) {
            should_run = false;
        }
    }

    should_run
}
