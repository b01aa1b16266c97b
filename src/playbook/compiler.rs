//! Inclusion compiler
//!
//! Loads the file an include directive points at, builds child blocks
//! scoped to the include, and flattens everything into a linear task
//! list. Nested includes are loaded eagerly so that a failure anywhere
//! in the tree is reported before any tasks are handed out.

use super::arena::{BlockId, IncludeId, ParentLinks, PlaybookArena, TaskId};
use super::block::{Block, BlockDefinition, BlockEntry};
use super::loader::DataLoader;
use super::lookup::LookupRegistry;
use super::task::Task;
use super::task_include::TaskInclude;
use crate::error::{value_kind, PlaybookError, Result};
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

/// Default limit on nested include depth
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Compiles include directives into flattened task lists
pub struct InclusionCompiler<'a> {
    loader: &'a dyn DataLoader,
    lookups: &'a dyn LookupRegistry,
    max_include_depth: usize,
}

impl<'a> InclusionCompiler<'a> {
    pub fn new(loader: &'a dyn DataLoader, lookups: &'a dyn LookupRegistry) -> Self {
        Self {
            loader,
            lookups,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Parse a raw include directive and place it in the arena
    pub fn load_include(
        &self,
        arena: &mut PlaybookArena,
        data: &Mapping,
        links: ParentLinks,
    ) -> Result<IncludeId> {
        let include = TaskInclude::load(data, self.lookups, links)?;
        Ok(arena.add_include(include))
    }

    /// Treat `path` as a top-level include and compile it
    pub fn compile_file(
        &self,
        arena: &mut PlaybookArena,
        path: &str,
    ) -> Result<(IncludeId, Vec<TaskId>)> {
        let mut data = Mapping::new();
        data.insert(
            Value::String("include".to_string()),
            Value::String(path.to_string()),
        );
        let id = self.load_include(arena, &data, ParentLinks::default())?;
        let tasks = self.compile(arena, id)?;
        Ok((id, tasks))
    }

    /// Return the task list for an include.
    ///
    /// The include's file (and every nested include) is loaded on the
    /// first call and cached; later calls only flatten. On error the
    /// arena is restored to its state before the call.
    #[instrument(skip_all, fields(include = %id))]
    pub fn compile(&self, arena: &mut PlaybookArena, id: IncludeId) -> Result<Vec<TaskId>> {
        let checkpoint = arena.checkpoint();
        if let Err(e) = self.ensure_loaded(arena, id) {
            arena.rollback(checkpoint);
            return Err(e);
        }

        let tasks = flatten_include(arena, id);
        debug!(tasks = tasks.len(), "compiled include '{}'", arena.include(id).target());
        Ok(tasks)
    }

    fn ensure_loaded(&self, arena: &mut PlaybookArena, id: IncludeId) -> Result<()> {
        if arena.include(id).is_compiled() {
            return Ok(());
        }

        let include = arena.include(id);
        let target = include.target().to_string();
        let links = ParentLinks {
            block: include.block(),
            role: include.role(),
            task_include: Some(id),
            use_handlers: include.use_handlers(),
        };

        let depth = arena.include_chain_depth(id);
        if depth > self.max_include_depth {
            return Err(PlaybookError::structure(format!(
                "include depth limit of {} exceeded while including '{}'",
                self.max_include_depth, target
            )));
        }
        if arena
            .include_ancestors(id)
            .any(|ancestor| arena.include(ancestor).target() == target)
        {
            return Err(PlaybookError::structure(format!(
                "recursive include of '{}'",
                target
            )));
        }

        let data = self.loader.load_from_file(&target)?;
        let entries = match data {
            Value::Sequence(entries) => entries,
            other => {
                return Err(PlaybookError::structure(format!(
                    "included task files must contain a list of tasks: '{}' holds a {}",
                    target,
                    value_kind(&other)
                )))
            }
        };

        let blocks = self.load_list_of_blocks(arena, &entries, links)?;
        debug!(blocks = blocks.len(), depth, "loaded '{}'", target);
        arena.include_mut(id).set_task_blocks(blocks);
        Ok(())
    }

    /// Every top-level entry of a task file becomes one block
    fn load_list_of_blocks(
        &self,
        arena: &mut PlaybookArena,
        entries: &[Value],
        links: ParentLinks,
    ) -> Result<Vec<BlockId>> {
        entries
            .iter()
            .map(|entry| {
                let data = as_mapping(entry)?;
                let definition = BlockDefinition::parse(data)?;
                self.load_block(arena, definition, links)
            })
            .collect()
    }

    fn load_block(
        &self,
        arena: &mut PlaybookArena,
        definition: BlockDefinition,
        links: ParentLinks,
    ) -> Result<BlockId> {
        let id = arena.add_block(Block::new(definition.attrs, links, definition.implicit));
        let child_links = ParentLinks {
            block: Some(id),
            ..links
        };

        let block = self.load_entries(arena, &definition.block, child_links)?;
        let rescue = self.load_entries(arena, &definition.rescue, child_links)?;
        let always = self.load_entries(arena, &definition.always, child_links)?;
        arena.block_mut(id).set_sections(block, rescue, always);
        Ok(id)
    }

    fn load_entries(
        &self,
        arena: &mut PlaybookArena,
        entries: &[Value],
        links: ParentLinks,
    ) -> Result<Vec<BlockEntry>> {
        let mut loaded = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = as_mapping(entry)?;
            let loaded_entry = if Block::is_block(data) {
                let definition = BlockDefinition::parse(data)?;
                BlockEntry::Block(self.load_block(arena, definition, links)?)
            } else if data.contains_key("include") {
                let include = self.load_include(arena, data, links)?;
                self.ensure_loaded(arena, include)?;
                BlockEntry::Include(include)
            } else {
                BlockEntry::Task(arena.add_task(Task::load(data, self.lookups, links)?))
            };
            loaded.push(loaded_entry);
        }
        Ok(loaded)
    }
}

/// Flatten an already loaded include into its tasks, depth first
pub fn flatten_include(arena: &PlaybookArena, id: IncludeId) -> Vec<TaskId> {
    let mut tasks = Vec::new();
    for block in arena.include(id).task_blocks().unwrap_or_default() {
        flatten_block_into(arena, *block, &mut tasks);
    }
    tasks
}

/// Block, rescue, then always sections
fn flatten_block_into(arena: &PlaybookArena, id: BlockId, tasks: &mut Vec<TaskId>) {
    for entry in arena.block(id).entries() {
        match *entry {
            BlockEntry::Task(task) => tasks.push(task),
            BlockEntry::Block(block) => flatten_block_into(arena, block, tasks),
            BlockEntry::Include(include) => tasks.extend(flatten_include(arena, include)),
        }
    }
}

fn as_mapping(entry: &Value) -> Result<&Mapping> {
    entry.as_mapping().ok_or_else(|| {
        PlaybookError::structure(format!(
            "task list entries must be mappings, got a {}",
            value_kind(entry)
        ))
    })
}
