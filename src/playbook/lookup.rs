//! Registry of lookup plugin names
//!
//! Only the names matter here: they decide whether a `with_<name>` key
//! on a directive selects a loop. The plugins themselves run elsewhere.

use std::collections::BTreeSet;

/// Lookups shipped with the controller
pub const BUILTIN_LOOKUPS: &[&str] = &[
    "items",
    "dict",
    "file",
    "fileglob",
    "first_found",
    "indexed_items",
    "inventory_hostnames",
    "lines",
    "nested",
    "random_choice",
    "sequence",
    "subelements",
    "together",
    "flattened",
    "env",
    "pipe",
    "template",
    "password",
    "url",
    "cartesian",
    "csvfile",
    "dnstxt",
    "redis_kv",
    "etcd",
];

/// Answers whether a name is a registered loop strategy
pub trait LookupRegistry: Send + Sync {
    fn contains(&self, name: &str) -> bool;
}

/// Fixed set of lookup names
#[derive(Debug, Clone)]
pub struct StaticLookupRegistry {
    names: BTreeSet<String>,
}

impl StaticLookupRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Registry holding the built-in lookups plus `extra`
    pub fn with_builtins<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::empty();
        for name in BUILTIN_LOOKUPS {
            registry.register(*name);
        }
        for name in extra {
            registry.register(name);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for StaticLookupRegistry {
    fn default() -> Self {
        Self::with_builtins(Vec::<String>::new())
    }
}

impl LookupRegistry for StaticLookupRegistry {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
