//! Custom filters for conditional expressions

use minijinja::{Environment, Value as JinjaValue};

/// Strings treated as true by the `bool` filter
const TRUTHY_STRINGS: &[&str] = &["yes", "on", "1", "true", "y", "t"];

/// Add all custom filters to the minijinja environment
pub fn add_filters(env: &mut Environment) {
    env.add_filter("bool", to_bool);

    env.add_filter("length", |value: JinjaValue| {
        value.len().unwrap_or(0) as i64
    });

    env.add_filter("upper", |value: JinjaValue| {
        value.as_str().unwrap_or("").to_uppercase()
    });

    env.add_filter("lower", |value: JinjaValue| {
        value.as_str().unwrap_or("").to_lowercase()
    });
}

/// `"yes"`, `"on"` and friends are true; other values use jinja truthiness
fn to_bool(value: JinjaValue) -> bool {
    match value.as_str() {
        Some(s) => TRUTHY_STRINGS.contains(&s.trim().to_lowercase().as_str()),
        None => value.is_true(),
    }
}
