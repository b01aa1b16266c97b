//! Directive normalization
//!
//! Rewrites a raw `include:` mapping into its canonical attribute set.
//! Two legacy forms are folded in here:
//!
//! - the one-line form `include: "path k1=v1 k2=v2"`, whose trailing
//!   parameters become `vars`
//! - the `with_<lookup>: args` loop shorthand, which becomes
//!   `loop` + `loop_args`
//!
//! # Examples
//!
//! **YAML Format:**
//! ```yaml
//! - include: tasks/deploy.yml env=prod ver=2
//!   with_items: [a, b]
//!   tags: deploy
//! ```

use super::lookup::LookupRegistry;
use super::splitter::{parse_kv_tokens, split_args};
use crate::error::{PlaybookError, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

const VARS_CONFLICT: &str =
    "include parameters cannot be mixed with 'vars' entries for include statements";

/// Normalize a raw include directive into canonical form
pub fn normalize(raw: &Mapping, lookups: &dyn LookupRegistry) -> Result<Mapping> {
    let mut canonical = Mapping::new();

    for (key, value) in raw {
        let key = key_str(key)?;
        if key == "include" {
            munge_include(&mut canonical, value)?;
        } else if let Some(loop_name) = loop_name_for(key, lookups) {
            munge_loop(&mut canonical, loop_name, value)?;
        } else {
            if key == "vars" {
                if canonical.contains_key("vars") {
                    return Err(PlaybookError::directive(VARS_CONFLICT));
                }
                if !value.is_mapping() {
                    return Err(PlaybookError::directive(
                        "vars for include statements must be specified as a dictionary",
                    ));
                }
            }
            canonical.insert(Value::String(key.to_string()), value.clone());
        }
    }

    debug!(keys = canonical.len(), "normalized include directive");
    Ok(canonical)
}

/// Returns the lookup name selected by `key`, if it names a registered loop
pub fn loop_name_for<'k>(key: &'k str, lookups: &dyn LookupRegistry) -> Option<&'k str> {
    let name = key.strip_prefix("with_").unwrap_or(key);
    lookups.contains(name).then_some(name)
}

/// Record a loop selection, failing if one was already recorded
pub fn munge_loop(canonical: &mut Mapping, loop_name: &str, args: &Value) -> Result<()> {
    if canonical.get("loop").is_some_and(|v| !v.is_null()) {
        return Err(PlaybookError::directive(format!(
            "duplicate loop in task: {}",
            loop_name
        )));
    }
    canonical.insert(
        Value::String("loop".to_string()),
        Value::String(loop_name.to_string()),
    );
    canonical.insert(Value::String("loop_args".to_string()), args.clone());
    Ok(())
}

/// Split the include line into its target and inline parameters
fn munge_include(canonical: &mut Mapping, value: &Value) -> Result<()> {
    let line = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(PlaybookError::directive(
                "include statements must specify the file name as a string",
            ))
        }
    };

    let items = split_args(&line)?;
    let Some((target, params)) = items.split_first() else {
        return Err(PlaybookError::directive(
            "include statements must specify the file name to include",
        ));
    };

    canonical.insert(
        Value::String("include".to_string()),
        Value::String(target.clone()),
    );

    if !params.is_empty() {
        let vars = parse_kv_tokens(params)?;
        if canonical.contains_key("vars") {
            return Err(PlaybookError::directive(VARS_CONFLICT));
        }
        canonical.insert(Value::String("vars".to_string()), Value::Mapping(vars));
    }
    Ok(())
}

pub(crate) fn key_str(key: &Value) -> Result<&str> {
    key.as_str().ok_or_else(|| {
        PlaybookError::directive(format!("directive keys must be strings, got {:?}", key))
    })
}
