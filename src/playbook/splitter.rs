//! Shell-style argument splitting for one-line directive parameters
//!
//! Handles strings such as `tasks/deploy.yml env=prod msg="hello world"`.

use crate::error::{PlaybookError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

/// Key under which free-form tokens (no `=`) are collected
pub const RAW_PARAMS: &str = "_raw_params";

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key pattern"));

/// Split a line into tokens using shell quoting rules
pub fn split_args(line: &str) -> Result<Vec<String>> {
    shlex::split(line)
        .ok_or_else(|| PlaybookError::directive(format!("unbalanced quotes in '{}'", line)))
}

/// Parse `key=value` pairs out of a parameter string
pub fn parse_kv(args: &str) -> Result<Mapping> {
    let tokens = split_args(args)?;
    parse_kv_tokens(&tokens)
}

/// Parse already split tokens into a mapping.
///
/// Values stay strings. Tokens without `=` are joined under `_raw_params`.
pub fn parse_kv_tokens(tokens: &[String]) -> Result<Mapping> {
    let mut params = Mapping::new();
    let mut raw = Vec::new();

    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => {
                if !KEY_PATTERN.is_match(key) {
                    return Err(PlaybookError::directive(format!(
                        "invalid parameter name '{}' in '{}'",
                        key, token
                    )));
                }
                params.insert(
                    Value::String(key.to_string()),
                    Value::String(value.to_string()),
                );
            }
            None => raw.push(token.as_str()),
        }
    }

    if !raw.is_empty() {
        params.insert(
            Value::String(RAW_PARAMS.to_string()),
            Value::String(raw.join(" ")),
        );
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_quotes() {
        let items = split_args(r#"tasks/a.yml msg="hello world" x=1"#).unwrap();
        assert_eq!(items, vec!["tasks/a.yml", "msg=hello world", "x=1"]);
    }

    #[test]
    fn test_split_args_empty() {
        assert!(split_args("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_args_unbalanced() {
        assert!(split_args(r#"a "b"#).is_err());
    }

    #[test]
    fn test_parse_kv() {
        let params = parse_kv("env=prod ver=2 url=http://x/?a=b").unwrap();
        assert_eq!(params.get("env"), Some(&Value::String("prod".to_string())));
        assert_eq!(params.get("ver"), Some(&Value::String("2".to_string())));
        assert_eq!(
            params.get("url"),
            Some(&Value::String("http://x/?a=b".to_string()))
        );
    }

    #[test]
    fn test_parse_kv_raw_params() {
        let params = parse_kv("echo hi creates=/tmp/x").unwrap();
        assert_eq!(
            params.get(RAW_PARAMS),
            Some(&Value::String("echo hi".to_string()))
        );
        assert_eq!(
            params.get("creates"),
            Some(&Value::String("/tmp/x".to_string()))
        );
    }

    #[test]
    fn test_parse_kv_rejects_bad_key() {
        let err = parse_kv("9lives=yes").unwrap_err();
        assert!(err.to_string().contains("invalid parameter name"));
    }
}
