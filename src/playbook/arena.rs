//! Arena holding compiled playbook entities
//!
//! Back-references between entities (owning block, owning role, parent
//! include) are ids into this arena rather than pointers, so a compiled
//! graph has no ownership cycles and can be rebuilt piece by piece.
//! Ids are only meaningful for the arena that issued them.

use super::block::Block;
use super::role::Role;
use super::task::Task;
use super::task_include::TaskInclude;
use std::fmt;

macro_rules! arena_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

arena_id!(BlockId, "block");
arena_id!(RoleId, "role");
arena_id!(IncludeId, "include");
arena_id!(TaskId, "task");

/// Any entity in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Include(IncludeId),
    Block(BlockId),
    Role(RoleId),
    Task(TaskId),
}

impl NodeRef {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Include(_) => "task_include",
            NodeRef::Block(_) => "block",
            NodeRef::Role(_) => "role",
            NodeRef::Task(_) => "task",
        }
    }
}

/// Non-owning references from an entity to its owners.
///
/// For a block, `block` is the parent block it is nested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentLinks {
    pub block: Option<BlockId>,
    pub role: Option<RoleId>,
    pub task_include: Option<IncludeId>,
    pub use_handlers: bool,
}

/// Arena sizes at a point in time, used to undo a failed compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    blocks: usize,
    roles: usize,
    includes: usize,
    tasks: usize,
}

/// Storage for every entity produced while compiling or reconstructing
#[derive(Debug, Clone, Default)]
pub struct PlaybookArena {
    blocks: Vec<Block>,
    roles: Vec<Role>,
    includes: Vec<TaskInclude>,
    tasks: Vec<Task>,
}

impl PlaybookArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        BlockId(self.blocks.len() - 1)
    }

    pub fn add_role(&mut self, role: Role) -> RoleId {
        self.roles.push(role);
        RoleId(self.roles.len() - 1)
    }

    pub fn add_include(&mut self, include: TaskInclude) -> IncludeId {
        self.includes.push(include);
        IncludeId(self.includes.len() - 1)
    }

    pub fn add_task(&mut self, task: Task) -> TaskId {
        self.tasks.push(task);
        TaskId(self.tasks.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.0]
    }

    pub fn include(&self, id: IncludeId) -> &TaskInclude {
        &self.includes[id.0]
    }

    pub(crate) fn include_mut(&mut self, id: IncludeId) -> &mut TaskInclude {
        &mut self.includes[id.0]
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Every include in insertion order
    pub fn include_ids(&self) -> impl Iterator<Item = IncludeId> {
        (0..self.includes.len()).map(IncludeId)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            blocks: self.blocks.len(),
            roles: self.roles.len(),
            includes: self.includes.len(),
            tasks: self.tasks.len(),
        }
    }

    /// Drop every entity added after `checkpoint`
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.blocks.truncate(checkpoint.blocks);
        self.roles.truncate(checkpoint.roles);
        self.includes.truncate(checkpoint.includes);
        self.tasks.truncate(checkpoint.tasks);
    }

    /// Parent includes of `id`, nearest first
    pub fn include_ancestors(&self, id: IncludeId) -> IncludeAncestors<'_> {
        IncludeAncestors {
            arena: self,
            next: self.include(id).parent(),
        }
    }

    /// Number of includes in the chain ending at `id`, counting `id` itself
    pub fn include_chain_depth(&self, id: IncludeId) -> usize {
        1 + self.include_ancestors(id).count()
    }
}

/// Iterator over the `task_include` parent chain
pub struct IncludeAncestors<'a> {
    arena: &'a PlaybookArena,
    next: Option<IncludeId>,
}

impl Iterator for IncludeAncestors<'_> {
    type Item = IncludeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.arena.include(current).parent();
        Some(current)
    }
}
