//! Include directive resolution
//!
//! Raw `include:` directives are normalized, bound to their attribute
//! schema, compiled into flattened task lists over a [`PlaybookArena`],
//! and resolved for variables, conditionals and tags. Compiled entities
//! can be turned into [`Record`]s for transfer to workers.

pub mod arena;
pub mod attribute;
pub mod block;
pub mod capability;
pub mod compiler;
pub mod conditional;
pub mod directive;
pub mod loader;
pub mod lookup;
pub mod record;
pub mod role;
mod scope;
pub mod splitter;
pub mod task;
pub mod task_include;

pub use arena::{BlockId, IncludeId, NodeRef, ParentLinks, PlaybookArena, RoleId, TaskId};
pub use block::{Block, BlockAttributes, BlockEntry};
pub use capability::{Conditional, Scoped, Taggable, Vars};
pub use compiler::{InclusionCompiler, DEFAULT_MAX_INCLUDE_DEPTH};
pub use conditional::ConditionalEvaluator;
pub use directive::normalize;
pub use loader::{DataLoader, FileLoader, MemoryLoader};
pub use lookup::{LookupRegistry, StaticLookupRegistry};
pub use record::{
    decode, deserialize_include, deserialize_task, from_json, serialize_include, serialize_task,
    to_json, Record,
};
pub use role::Role;
pub use task::Task;
pub use task_include::{IncludeAttributes, TaskInclude};
