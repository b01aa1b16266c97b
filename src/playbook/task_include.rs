//! Include directive entity
//!
//! A `TaskInclude` wraps one `include: some/other/file.yml` statement in a
//! task list. Compiling it yields the tasks of the referenced file, each
//! scoped to the include's variables and conditionals.
//!
//! # Examples
//!
//! **YAML Format:**
//! ```yaml
//! - include: common/setup.yml
//!   when: setup_required
//!   vars:
//!     app_name: myapp
//! ```

use super::arena::{BlockId, IncludeId, ParentLinks, RoleId};
use super::attribute::TASK_INCLUDE_SCHEMA;
use super::capability::{normalize_tags, Conditional, Scoped, Taggable, Vars};
use super::directive::normalize;
use super::lookup::LookupRegistry;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Canonical attributes of an include directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeAttributes {
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path of the included task file
    pub include: String,

    /// Lookup selected through `with_<name>`
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_name: Option<String>,

    /// Arguments handed to the loop lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_args: Option<Vec<Value>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub when: Vec<String>,
}

impl IncludeAttributes {
    pub fn new(include: impl Into<String>) -> Self {
        Self {
            name: None,
            include: include.into(),
            loop_name: None,
            loop_args: None,
            tags: Vec::new(),
            vars: Vars::new(),
            when: Vec::new(),
        }
    }
}

/// An include directive placed in the arena
#[derive(Debug, Clone)]
pub struct TaskInclude {
    pub attrs: IncludeAttributes,
    links: ParentLinks,
    /// Child blocks of the included file, set on first compile
    task_blocks: Option<Vec<BlockId>>,
}

impl TaskInclude {
    /// Parse a raw directive mapping: normalize, then bind to the schema
    pub fn load(data: &Mapping, lookups: &dyn LookupRegistry, links: ParentLinks) -> Result<Self> {
        let canonical = normalize(data, lookups)?;
        let mut attrs: IncludeAttributes = TASK_INCLUDE_SCHEMA.load(&canonical)?;
        attrs.tags = normalize_tags(attrs.tags);
        Ok(Self::from_attributes(attrs, links))
    }

    pub fn from_attributes(attrs: IncludeAttributes, links: ParentLinks) -> Self {
        Self {
            attrs,
            links,
            task_blocks: None,
        }
    }

    /// The included file path
    pub fn target(&self) -> &str {
        &self.attrs.include
    }

    /// Display name, falling back to the target
    pub fn display_name(&self) -> &str {
        self.attrs.name.as_deref().unwrap_or(&self.attrs.include)
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

    /// The include this one was produced by, if nested
    pub fn parent(&self) -> Option<IncludeId> {
        self.links.task_include
    }

    pub fn use_handlers(&self) -> bool {
        self.links.use_handlers
    }

    pub fn task_blocks(&self) -> Option<&[BlockId]> {
        self.task_blocks.as_deref()
    }

    pub fn is_compiled(&self) -> bool {
        self.task_blocks.is_some()
    }

    pub(crate) fn set_task_blocks(&mut self, blocks: Vec<BlockId>) {
        self.task_blocks = Some(blocks);
    }

    /// Attribute map; private fields are left out unless requested
    pub fn dump_attrs(&self, include_private: bool) -> Mapping {
        let mut out = Mapping::new();
        let full = match serde_yaml::to_value(&self.attrs) {
            Ok(Value::Mapping(map)) => map,
            _ => return out,
        };
        for field in TASK_INCLUDE_SCHEMA.fields {
            if field.private && !include_private {
                continue;
            }
            if let Some(value) = full.get(field.name) {
                out.insert(Value::String(field.name.to_string()), value.clone());
            }
        }
        out
    }
}

impl Scoped for TaskInclude {
    fn own_vars(&self) -> &Vars {
        &self.attrs.vars
    }
}

impl Conditional for TaskInclude {
    fn when(&self) -> &[String] {
        &self.attrs.when
    }
}

impl Taggable for TaskInclude {
    fn tags(&self) -> &[String] {
        &self.attrs.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybookError;
    use crate::playbook::lookup::StaticLookupRegistry;

    fn load(yaml: &str) -> Result<TaskInclude> {
        let data: Mapping = serde_yaml::from_str(yaml).unwrap();
        TaskInclude::load(&data, &StaticLookupRegistry::default(), ParentLinks::default())
    }

    #[test]
    fn test_load_canonical() {
        let ti = load(
            r#"
name: setup
include: common/setup.yml
tags: [setup]
vars:
  app_name: myapp
when: setup_required
"#,
        )
        .unwrap();
        assert_eq!(ti.target(), "common/setup.yml");
        assert_eq!(ti.display_name(), "setup");
        assert_eq!(ti.attrs.tags, vec!["setup"]);
        assert_eq!(
            ti.attrs.vars.get("app_name"),
            Some(&Value::String("myapp".to_string()))
        );
        assert_eq!(ti.attrs.when, vec!["setup_required"]);
        assert!(!ti.is_compiled());
    }

    #[test]
    fn test_load_legacy_with_loop() {
        let ti = load(
            r#"
include: "tasks/deploy.yml env=prod ver=2"
with_items: [a, b]
tags: "deploy, web"
"#,
        )
        .unwrap();
        assert_eq!(ti.target(), "tasks/deploy.yml");
        assert_eq!(ti.attrs.vars.len(), 2);
        assert_eq!(ti.attrs.loop_name.as_deref(), Some("items"));
        assert_eq!(ti.attrs.loop_args.as_ref().map(Vec::len), Some(2));
        assert_eq!(ti.attrs.tags, vec!["deploy", "web"]);
    }

    #[test]
    fn test_loop_args_scalar_wrapped() {
        let ti = load("include: a.yml\nwith_items: \"{{ packages }}\"").unwrap();
        assert_eq!(
            ti.attrs.loop_args,
            Some(vec![Value::String("{{ packages }}".to_string())])
        );
    }

    #[test]
    fn test_missing_include_is_error() {
        let err = load("name: nothing to include").unwrap_err();
        assert!(matches!(err, PlaybookError::Directive(_)));
    }

    #[test]
    fn test_dump_attrs_hides_private() {
        let ti = load("include: a.yml\nwith_items: [1]").unwrap();

        let public = ti.dump_attrs(false);
        assert!(public.contains_key("include"));
        assert!(!public.contains_key("loop"));
        assert!(!public.contains_key("loop_args"));

        let full = ti.dump_attrs(true);
        assert_eq!(full.get("loop"), Some(&Value::String("items".to_string())));
        assert!(full.contains_key("loop_args"));
    }
}
