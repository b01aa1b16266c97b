//! Roles, as far as include resolution needs them
//!
//! Only the scope-bearing attributes are modelled: a role contributes
//! variables, a conditional and tags to the entities it owns.

use super::attribute::ROLE_SCHEMA;
use super::capability::{normalize_tags, Conditional, Scoped, Taggable, Vars};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// Attributes of a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAttributes {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub when: Vec<String>,
}

/// A role placed in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub attrs: RoleAttributes,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            attrs: RoleAttributes {
                name: name.into(),
                tags: Vec::new(),
                vars: Vars::new(),
                when: Vec::new(),
            },
        }
    }

    /// Load a role from its mapping form (`name`, `vars`, `when`, `tags`)
    pub fn load(data: &Mapping) -> Result<Self> {
        let mut attrs: RoleAttributes = ROLE_SCHEMA.load(data)?;
        attrs.tags = normalize_tags(attrs.tags);
        Ok(Self { attrs })
    }

    pub fn name(&self) -> &str {
        &self.attrs.name
    }
}

impl Scoped for Role {
    fn own_vars(&self) -> &Vars {
        &self.attrs.vars
    }
}

impl Conditional for Role {
    fn when(&self) -> &[String] {
        &self.attrs.when
    }
}

impl Taggable for Role {
    fn tags(&self) -> &[String] {
        &self.attrs.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_role() {
        let data: Mapping =
            serde_yaml::from_str("name: webserver\nvars: {port: 80}\nwhen: web_enabled").unwrap();
        let role = Role::load(&data).unwrap();
        assert_eq!(role.name(), "webserver");
        assert_eq!(role.own_vars().len(), 1);
        assert_eq!(role.when(), ["web_enabled".to_string()]);
    }

    #[test]
    fn test_role_requires_name() {
        let data: Mapping = serde_yaml::from_str("vars: {port: 80}").unwrap();
        assert!(Role::load(&data).is_err());
    }
}
