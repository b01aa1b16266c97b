//! Transfer records for compiled entities
//!
//! A record is plain data: an include (or task) with its attributes and,
//! when present, nested records for its owning block, owning role and
//! parent include under the reserved keys `block`, `role` and
//! `task_include`. Every record carries a `__kind` tag so a worker can
//! rebuild the right entity without knowing the shape in advance.
//!
//! Ancestors shared along several paths (a nested include is reachable
//! both as `task_include` and through its owning block) are written in
//! full only once. Later occurrences are `{"__kind": "ref", "index": n}`,
//! where `n` counts owner records in the order they were completed.
//!
//! # Examples
//!
//! ```json
//! {
//!   "__kind": "task_include",
//!   "include": "tasks/deploy.yml",
//!   "tags": ["deploy"],
//!   "vars": {"env": "prod"},
//!   "when": [],
//!   "use_handlers": false,
//!   "task_include": {"__kind": "task_include", "include": "site.yml"}
//! }
//! ```

use super::arena::{BlockId, IncludeId, NodeRef, ParentLinks, PlaybookArena, TaskId};
use super::block::{Block, BlockAttributes};
use super::role::{Role, RoleAttributes};
use super::task::{Task, TaskAttributes};
use super::task_include::{IncludeAttributes, TaskInclude};
use crate::error::{PlaybookError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::HashMap;
use tracing::debug;

/// Transferable form of any playbook entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__kind", rename_all = "snake_case")]
pub enum Record {
    TaskInclude(IncludeRecord),
    Block(BlockRecord),
    Role(RoleRecord),
    Task(TaskRecord),
    /// An owner already written earlier in the same record
    Ref(RefRecord),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::TaskInclude(_) => "task_include",
            Record::Block(_) => "block",
            Record::Role(_) => "role",
            Record::Task(_) => "task",
            Record::Ref(_) => "ref",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeRecord {
    #[serde(flatten)]
    pub attrs: IncludeAttributes,

    #[serde(default)]
    pub use_handlers: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_include: Option<Box<Record>>,
}

/// A block without its sections; `block` is the parent block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(flatten)]
    pub attrs: BlockAttributes,

    #[serde(default)]
    pub implicit: bool,

    #[serde(default)]
    pub use_handlers: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_include: Option<Box<Record>>,
}

/// Position of an owner in the order owners were written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRecord {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(flatten)]
    pub attrs: RoleAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub attrs: TaskAttributes,

    pub action: String,

    #[serde(default)]
    pub args: Mapping,

    #[serde(default)]
    pub keywords: Mapping,

    #[serde(default)]
    pub use_handlers: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Box<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_include: Option<Box<Record>>,
}

/// Nested owner records shared by includes, blocks and tasks
struct Owners {
    block: Option<Box<Record>>,
    role: Option<Box<Record>>,
    task_include: Option<Box<Record>>,
}

/// Writes each ancestor once. Ancestors are numbered in the order their
/// records are completed (owners before the entity owning them); a later
/// occurrence of the same ancestor becomes a `ref` to that number.
struct Encoder<'a> {
    arena: &'a PlaybookArena,
    written: HashMap<NodeRef, usize>,
}

impl<'a> Encoder<'a> {
    fn new(arena: &'a PlaybookArena) -> Self {
        Self {
            arena,
            written: HashMap::new(),
        }
    }

    fn owners(&mut self, links: ParentLinks) -> Owners {
        Owners {
            block: links.block.map(|id| self.owner(NodeRef::Block(id))),
            role: links.role.map(|id| self.owner(NodeRef::Role(id))),
            task_include: links
                .task_include
                .map(|id| self.owner(NodeRef::Include(id))),
        }
    }

    fn owner(&mut self, node: NodeRef) -> Box<Record> {
        if let Some(&index) = self.written.get(&node) {
            return Box::new(Record::Ref(RefRecord { index }));
        }
        let record = match node {
            NodeRef::Include(id) => Record::TaskInclude(self.include_record(id)),
            NodeRef::Block(id) => Record::Block(self.block_record(id)),
            NodeRef::Role(id) => Record::Role(RoleRecord {
                attrs: self.arena.role(id).attrs.clone(),
            }),
            NodeRef::Task(id) => Record::Task(self.task_record(id)),
        };
        let index = self.written.len();
        self.written.insert(node, index);
        Box::new(record)
    }

    fn include_record(&mut self, id: IncludeId) -> IncludeRecord {
        let arena = self.arena;
        let include = arena.include(id);
        let owners = self.owners(include.links());
        IncludeRecord {
            attrs: include.attrs.clone(),
            use_handlers: include.use_handlers(),
            block: owners.block,
            role: owners.role,
            task_include: owners.task_include,
        }
    }

    fn block_record(&mut self, id: BlockId) -> BlockRecord {
        let arena = self.arena;
        let block = arena.block(id);
        let links = block.links();
        let owners = self.owners(links);
        BlockRecord {
            attrs: block.attrs.clone(),
            implicit: block.is_implicit(),
            use_handlers: links.use_handlers,
            block: owners.block,
            role: owners.role,
            task_include: owners.task_include,
        }
    }

    fn task_record(&mut self, id: TaskId) -> TaskRecord {
        let arena = self.arena;
        let task = arena.task(id);
        let links = task.links();
        let owners = self.owners(links);
        TaskRecord {
            attrs: task.attrs.clone(),
            action: task.action.clone(),
            args: task.args.clone(),
            keywords: task.keywords.clone(),
            use_handlers: links.use_handlers,
            block: owners.block,
            role: owners.role,
            task_include: owners.task_include,
        }
    }
}

/// Serialize an include together with its ancestry
pub fn serialize_include(arena: &PlaybookArena, id: IncludeId) -> Record {
    Record::TaskInclude(Encoder::new(arena).include_record(id))
}

/// Serialize a compiled task together with its ancestry
pub fn serialize_task(arena: &PlaybookArena, id: TaskId) -> Record {
    Record::Task(Encoder::new(arena).task_record(id))
}

/// Rebuild an include and its ancestry in `arena`.
///
/// On error nothing from the record stays in the arena.
pub fn deserialize_include(arena: &mut PlaybookArena, record: Record) -> Result<IncludeId> {
    let checkpoint = arena.checkpoint();
    let result = match record {
        Record::TaskInclude(record) => Decoder::new(arena).include(record),
        other => Err(unexpected_kind("task_include", &other)),
    };
    if result.is_err() {
        arena.rollback(checkpoint);
    }
    result
}

/// Rebuild a task and its ancestry in `arena`
pub fn deserialize_task(arena: &mut PlaybookArena, record: Record) -> Result<TaskId> {
    let checkpoint = arena.checkpoint();
    let result = match record {
        Record::Task(record) => Decoder::new(arena).task(record),
        other => Err(unexpected_kind("task", &other)),
    };
    if result.is_err() {
        arena.rollback(checkpoint);
    }
    result
}

/// Rebuilds owners in the same order the encoder numbered them, so a
/// `ref` always points at an entity rebuilt earlier in the same record
struct Decoder<'a> {
    arena: &'a mut PlaybookArena,
    rebuilt: Vec<NodeRef>,
}

impl<'a> Decoder<'a> {
    fn new(arena: &'a mut PlaybookArena) -> Self {
        Self {
            arena,
            rebuilt: Vec::new(),
        }
    }

    fn task(&mut self, record: TaskRecord) -> Result<TaskId> {
        let links = self.links(
            record.block,
            record.role,
            record.task_include,
            record.use_handlers,
        )?;
        if record.action.is_empty() {
            return Err(PlaybookError::deserialization("task record has an empty action"));
        }
        let mut task = Task::new(record.action);
        task.attrs = record.attrs;
        task.args = record.args;
        task.keywords = record.keywords;
        Ok(self.arena.add_task(task.with_links(links)))
    }

    fn include(&mut self, record: IncludeRecord) -> Result<IncludeId> {
        let links = self.links(
            record.block,
            record.role,
            record.task_include,
            record.use_handlers,
        )?;
        if record.attrs.include.trim().is_empty() {
            return Err(PlaybookError::deserialization(
                "task_include record has an empty 'include'",
            ));
        }
        let id = self
            .arena
            .add_include(TaskInclude::from_attributes(record.attrs, links));
        debug!("rebuilt {}", id);
        Ok(id)
    }

    /// Nested records are rebuilt before the entity that refers to them
    fn links(
        &mut self,
        block: Option<Box<Record>>,
        role: Option<Box<Record>>,
        task_include: Option<Box<Record>>,
        use_handlers: bool,
    ) -> Result<ParentLinks> {
        let block = match self.owner(block, "block")? {
            Some(NodeRef::Block(id)) => Some(id),
            _ => None,
        };
        let role = match self.owner(role, "role")? {
            Some(NodeRef::Role(id)) => Some(id),
            _ => None,
        };
        let task_include = match self.owner(task_include, "task_include")? {
            Some(NodeRef::Include(id)) => Some(id),
            _ => None,
        };
        Ok(ParentLinks {
            block,
            role,
            task_include,
            use_handlers,
        })
    }

    /// Rebuild (or resolve a reference to) an owner of the expected kind
    fn owner(&mut self, record: Option<Box<Record>>, expected: &str) -> Result<Option<NodeRef>> {
        let Some(record) = record else {
            return Ok(None);
        };
        let node = match *record {
            Record::Ref(reference) => {
                let node = self.rebuilt.get(reference.index).copied().ok_or_else(|| {
                    PlaybookError::deserialization(format!(
                        "reference to unknown record {}",
                        reference.index
                    ))
                })?;
                if node.kind() != expected {
                    return Err(PlaybookError::deserialization(format!(
                        "expected a {} record, found a reference to a {}",
                        expected,
                        node.kind()
                    )));
                }
                return Ok(Some(node));
            }
            Record::Block(record) if expected == "block" => {
                let links = self.links(
                    record.block,
                    record.role,
                    record.task_include,
                    record.use_handlers,
                )?;
                NodeRef::Block(
                    self.arena
                        .add_block(Block::new(record.attrs, links, record.implicit)),
                )
            }
            Record::Role(record) if expected == "role" => NodeRef::Role(self.arena.add_role(Role {
                attrs: record.attrs,
            })),
            Record::TaskInclude(record) if expected == "task_include" => {
                NodeRef::Include(self.include(record)?)
            }
            other => return Err(unexpected_kind(expected, &other)),
        };
        self.rebuilt.push(node);
        Ok(Some(node))
    }
}

fn unexpected_kind(expected: &str, found: &Record) -> PlaybookError {
    PlaybookError::deserialization(format!(
        "expected a {} record, found {}",
        expected,
        found.kind()
    ))
}

/// Decode a record from a JSON value, checking its shape
pub fn decode(value: serde_json::Value) -> Result<Record> {
    serde_json::from_value(value).map_err(|e| PlaybookError::deserialization(e.to_string()))
}

pub fn to_json(record: &Record) -> Result<String> {
    serde_json::to_string(record).map_err(|e| PlaybookError::Serialization(e.to_string()))
}

pub fn from_json(json: &str) -> Result<Record> {
    serde_json::from_str(json).map_err(|e| PlaybookError::deserialization(e.to_string()))
}
