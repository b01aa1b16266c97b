//! Leaf tasks produced by compiling a task file
//!
//! A task has keyword attributes (`name`, `when`, `tags`, `vars`, loop)
//! and exactly one action key naming the module it runs.

use super::arena::{BlockId, IncludeId, ParentLinks, RoleId};
use super::attribute::TASK_SCHEMA;
use super::capability::{normalize_tags, Conditional, Scoped, Taggable, Vars};
use super::directive::{key_str, loop_name_for, munge_loop};
use super::lookup::LookupRegistry;
use super::splitter::parse_kv;
use crate::error::{PlaybookError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Task keywords kept verbatim for the execution layer
pub const PASSTHROUGH_KEYWORDS: &[&str] = &[
    "register",
    "notify",
    "ignore_errors",
    "become",
    "become_user",
    "delegate_to",
    "changed_when",
    "failed_when",
    "environment",
    "run_once",
    "no_log",
];

const ATTRIBUTE_KEYS: &[&str] = &["name", "tags", "vars", "when", "loop", "loop_args"];

/// Keyword attributes of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_args: Option<Vec<Value>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub when: Vec<String>,
}

/// A task placed in the arena
#[derive(Debug, Clone)]
pub struct Task {
    pub attrs: TaskAttributes,
    /// Module the task runs
    pub action: String,
    pub args: Mapping,
    /// Keywords interpreted by the execution layer
    pub keywords: Mapping,
    links: ParentLinks,
}

impl Task {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            attrs: TaskAttributes::default(),
            action: action.into(),
            args: Mapping::new(),
            keywords: Mapping::new(),
            links: ParentLinks::default(),
        }
    }

    /// Parse a task mapping
    pub fn load(data: &Mapping, lookups: &dyn LookupRegistry, links: ParentLinks) -> Result<Self> {
        let mut attributes = Mapping::new();
        let mut keywords = Mapping::new();
        let mut action: Option<(String, Mapping)> = None;

        for (key, value) in data {
            let name = key_str(key)?;
            if ATTRIBUTE_KEYS.contains(&name) {
                attributes.insert(key.clone(), value.clone());
            } else if PASSTHROUGH_KEYWORDS.contains(&name) {
                keywords.insert(key.clone(), value.clone());
            } else if let Some(loop_name) = task_loop_name(name, lookups) {
                munge_loop(&mut attributes, loop_name, value)?;
            } else if let Some((existing, _)) = &action {
                return Err(PlaybookError::directive(format!(
                    "conflicting action statements: {}, {}",
                    existing, name
                )));
            } else {
                action = Some((name.to_string(), action_args(name, value)?));
            }
        }

        let Some((action, args)) = action else {
            return Err(PlaybookError::directive(format!(
                "no action detected in task{}",
                data.get("name")
                    .and_then(Value::as_str)
                    .map(|n| format!(" '{}'", n))
                    .unwrap_or_default()
            )));
        };

        let mut attrs: TaskAttributes = TASK_SCHEMA.load(&attributes)?;
        attrs.tags = normalize_tags(attrs.tags);

        Ok(Self {
            attrs,
            action,
            args,
            keywords,
            links,
        })
    }

    pub(crate) fn with_links(mut self, links: ParentLinks) -> Self {
        self.links = links;
        self
    }

    /// Display name, falling back to the action
    pub fn display_name(&self) -> &str {
        self.attrs.name.as_deref().unwrap_or(&self.action)
    }

    pub fn links(&self) -> ParentLinks {
        self.links
    }

    pub fn block(&self) -> Option<BlockId> {
        self.links.block
    }

    pub fn role(&self) -> Option<RoleId> {
        self.links.role
    }

    pub fn task_include(&self) -> Option<IncludeId> {
        self.links.task_include
    }

    pub fn is_handler(&self) -> bool {
        self.links.use_handlers
    }
}

/// Only `with_<lookup>` keys are loops in a task; a bare lookup name such
/// as `file` or `template` is the module being run
fn task_loop_name<'k>(key: &'k str, lookups: &dyn LookupRegistry) -> Option<&'k str> {
    if key.starts_with("with_") {
        loop_name_for(key, lookups)
    } else {
        None
    }
}

/// Module arguments may be a mapping or a free-form `k=v` string
fn action_args(action: &str, value: &Value) -> Result<Mapping> {
    match value {
        Value::Mapping(map) => Ok(map.clone()),
        Value::String(s) => parse_kv(s),
        Value::Null => Ok(Mapping::new()),
        _ => Err(PlaybookError::directive(format!(
            "arguments for '{}' must be a mapping or a string",
            action
        ))),
    }
}

impl Scoped for Task {
    fn own_vars(&self) -> &Vars {
        &self.attrs.vars
    }
}

impl Conditional for Task {
    fn when(&self) -> &[String] {
        &self.attrs.when
    }
}

impl Taggable for Task {
    fn tags(&self) -> &[String] {
        &self.attrs.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::lookup::StaticLookupRegistry;

    fn load(yaml: &str) -> Result<Task> {
        let data: Mapping = serde_yaml::from_str(yaml).unwrap();
        Task::load(&data, &StaticLookupRegistry::default(), ParentLinks::default())
    }

    #[test]
    fn test_load_task_with_mapping_args() {
        let task = load(
            r#"
name: install nginx
apt:
  name: nginx
  state: present
when: web_enabled
register: result
"#,
        )
        .unwrap();
        assert_eq!(task.action, "apt");
        assert_eq!(task.display_name(), "install nginx");
        assert_eq!(task.args.get("name"), Some(&Value::String("nginx".to_string())));
        assert_eq!(task.attrs.when, vec!["web_enabled"]);
        assert!(task.keywords.contains_key("register"));
    }

    #[test]
    fn test_load_task_with_free_form_args() {
        let task = load("shell: echo hi creates=/tmp/marker").unwrap();
        assert_eq!(task.action, "shell");
        assert_eq!(task.display_name(), "shell");
        assert_eq!(
            task.args.get("_raw_params"),
            Some(&Value::String("echo hi".to_string()))
        );
    }

    #[test]
    fn test_task_loop() {
        let task = load("debug: msg=x\nwith_items: [1, 2, 3]").unwrap();
        assert_eq!(task.attrs.loop_name.as_deref(), Some("items"));
        assert_eq!(task.attrs.loop_args.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_lookup_named_modules_are_actions() {
        let task = load("file: path=/tmp/x state=directory").unwrap();
        assert_eq!(task.action, "file");
        assert_eq!(task.args.get("state"), Some(&Value::String("directory".to_string())));
        assert!(task.attrs.loop_name.is_none());

        let task = load("template: src=a.j2 dest=/etc/a\nwith_items: [1]").unwrap();
        assert_eq!(task.action, "template");
        assert_eq!(task.args.get("dest"), Some(&Value::String("/etc/a".to_string())));
        assert_eq!(task.attrs.loop_name.as_deref(), Some("items"));
    }

    #[test]
    fn test_with_file_is_still_a_loop() {
        let task = load("debug: msg=x\nwith_file: [a.txt]").unwrap();
        assert_eq!(task.action, "debug");
        assert_eq!(task.attrs.loop_name.as_deref(), Some("file"));
    }

    #[test]
    fn test_conflicting_actions() {
        let err = load("shell: echo\ncommand: ls").unwrap_err();
        assert!(err.to_string().contains("conflicting action statements"));
    }

    #[test]
    fn test_no_action() {
        let err = load("name: empty\nwhen: x").unwrap_err();
        assert!(err.to_string().contains("no action detected in task 'empty'"));
    }
}
