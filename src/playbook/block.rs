//! Blocks: groups of tasks sharing vars, conditionals and tags
//!
//! A task file is a list of block definitions. Entries with a `block` key
//! are explicit blocks with `block`, `rescue` and `always` sections; any
//! other entry is wrapped in an implicit single-entry block.

use super::arena::{BlockId, IncludeId, ParentLinks, RoleId, TaskId};
use super::attribute::BLOCK_SCHEMA;
use super::capability::{normalize_tags, Conditional, Scoped, Taggable, Vars};
use super::directive::key_str;
use crate::error::{PlaybookError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Keyword attributes of a block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub when: Vec<String>,
}

/// One entry inside a block section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEntry {
    Task(TaskId),
    Block(BlockId),
    Include(IncludeId),
}

/// Raw definition of a block before its entries are loaded
#[derive(Debug, Clone, Default)]
pub struct BlockDefinition {
    pub attrs: BlockAttributes,
    pub block: Vec<Value>,
    pub rescue: Vec<Value>,
    pub always: Vec<Value>,
    pub implicit: bool,
}

impl BlockDefinition {
    /// Split a block mapping into its keyword attributes and sections.
    ///
    /// A mapping without a `block` key becomes an implicit block
    /// holding just that entry.
    pub fn parse(data: &Mapping) -> Result<Self> {
        if !Block::is_block(data) {
            return Ok(Self {
                block: vec![Value::Mapping(data.clone())],
                implicit: true,
                ..Self::default()
            });
        }

        let mut keywords = Mapping::new();
        let mut definition = Self::default();
        for (key, value) in data {
            let name = key_str(key)?;
            let section = match name {
                "block" => &mut definition.block,
                "rescue" => &mut definition.rescue,
                "always" => &mut definition.always,
                _ => {
                    keywords.insert(key.clone(), value.clone());
                    continue;
                }
            };
            *section = match value {
                Value::Sequence(seq) => seq.clone(),
                Value::Null => Vec::new(),
                _ => {
                    return Err(PlaybookError::structure(format!(
                        "'{}' section of a block must be a list of tasks",
                        name
                    )))
                }
            };
        }

        let mut attrs: BlockAttributes = BLOCK_SCHEMA.load(&keywords)?;
        attrs.tags = normalize_tags(attrs.tags);
        definition.attrs = attrs;
        Ok(definition)
    }
}

/// A block placed in the arena
#[derive(Debug, Clone)]
pub struct Block {
    pub attrs: BlockAttributes,
    links: ParentLinks,
    implicit: bool,
    block: Vec<BlockEntry>,
    rescue: Vec<BlockEntry>,
    always: Vec<BlockEntry>,
}

impl Block {
    /// Whether a mapping is an explicit block definition
    pub fn is_block(data: &Mapping) -> bool {
        data.contains_key("block")
    }

    pub fn new(attrs: BlockAttributes, links: ParentLinks, implicit: bool) -> Self {
        Self {
            attrs,
            links,
            implicit,
            block: Vec::new(),
            rescue: Vec::new(),
            always: Vec::new(),
        }
    }

    pub fn links(&self) -> ParentLinks {
        self.links
    }

    pub fn parent_block(&self) -> Option<BlockId> {
        self.links.block
    }

    pub fn role(&self) -> Option<RoleId> {
        self.links.role
    }

    pub fn task_include(&self) -> Option<IncludeId> {
        self.links.task_include
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub(crate) fn set_sections(
        &mut self,
        block: Vec<BlockEntry>,
        rescue: Vec<BlockEntry>,
        always: Vec<BlockEntry>,
    ) {
        self.block = block;
        self.rescue = rescue;
        self.always = always;
    }

    /// Entries in flattening order: block, then rescue, then always
    pub fn entries(&self) -> impl Iterator<Item = &BlockEntry> {
        self.block.iter().chain(&self.rescue).chain(&self.always)
    }
}

impl Scoped for Block {
    fn own_vars(&self) -> &Vars {
        &self.attrs.vars
    }
}

impl Conditional for Block {
    fn when(&self) -> &[String] {
        &self.attrs.when
    }
}

impl Taggable for Block {
    fn tags(&self) -> &[String] {
        &self.attrs.tags
    }
}
