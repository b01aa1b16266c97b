//! Conditional chain evaluation
//!
//! An entity runs only when every `when` guard along its ancestry holds.
//! Links are checked root first and evaluation stops at the first false
//! one, so guards further down the chain may reference variables that
//! only exist when their ancestors are enabled.

use super::arena::{BlockId, IncludeId, NodeRef, PlaybookArena, RoleId, TaskId};
use super::capability::{Conditional, Vars};
use crate::error::{PlaybookError, Result};
use crate::templating::expression_env;
use minijinja::{Environment, Value as JinjaValue};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Evaluates `when` expressions and conditional chains
pub struct ConditionalEvaluator {
    env: Environment<'static>,
}

impl Default for ConditionalEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionalEvaluator {
    pub fn new() -> Self {
        Self {
            env: expression_env(),
        }
    }

    /// Evaluate a single expression against `vars`
    pub fn evaluate_expression(&self, expression: &str, vars: &Vars) -> Result<bool> {
        self.evaluate_in(expression, &JinjaValue::from_serialize(vars))
    }

    /// Whether an include is enabled: parent include, then owning block
    /// (or the role when no block owns it), then its own guards
    pub fn evaluate_include(&self, arena: &PlaybookArena, id: IncludeId, vars: &Vars) -> Result<bool> {
        self.walk(arena, vars).include_chain(id)
    }

    /// Whether a block is enabled: owning include, then parent block (else
    /// role), then its own guards
    pub fn evaluate_block(&self, arena: &PlaybookArena, id: BlockId, vars: &Vars) -> Result<bool> {
        self.walk(arena, vars).block_chain(id)
    }

    /// Whether a task is enabled: owning include, then block (else role),
    /// then its own guards
    pub fn evaluate_task(&self, arena: &PlaybookArena, id: TaskId, vars: &Vars) -> Result<bool> {
        self.walk(arena, vars).task_chain(id)
    }

    pub fn evaluate_role(&self, arena: &PlaybookArena, id: RoleId, vars: &Vars) -> Result<bool> {
        self.walk(arena, vars).role_guards(id)
    }

    pub fn evaluate(&self, arena: &PlaybookArena, node: NodeRef, vars: &Vars) -> Result<bool> {
        match node {
            NodeRef::Include(id) => self.evaluate_include(arena, id, vars),
            NodeRef::Block(id) => self.evaluate_block(arena, id, vars),
            NodeRef::Role(id) => self.evaluate_role(arena, id, vars),
            NodeRef::Task(id) => self.evaluate_task(arena, id, vars),
        }
    }

    fn walk<'a>(&'a self, arena: &'a PlaybookArena, vars: &Vars) -> ChainWalk<'a> {
        ChainWalk {
            evaluator: self,
            arena,
            ctx: JinjaValue::from_serialize(vars),
            checked: HashSet::new(),
        }
    }

    fn own_guards(&self, entity: &impl Conditional, ctx: &JinjaValue) -> Result<bool> {
        for expression in entity.when() {
            if !self.evaluate_in(expression, ctx)? {
                debug!("conditional '{}' is false", expression);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_in(&self, expression: &str, ctx: &JinjaValue) -> Result<bool> {
        let mut source = expression.trim();
        if let Some(inner) = source
            .strip_prefix("{{")
            .and_then(|rest| rest.strip_suffix("}}"))
        {
            warn!("conditional statements should not include jinja2 delimiters: {}", expression);
            source = inner.trim();
        }
        if source.is_empty() {
            return Ok(true);
        }

        let failed = |message: String| PlaybookError::ConditionalEvaluation {
            expression: expression.to_string(),
            message,
        };

        let compiled = self
            .env
            .compile_expression_owned(source.to_string())
            .map_err(|e| failed(e.to_string()))?;
        let value = compiled.eval(ctx).map_err(|e| failed(e.to_string()))?;
        if value.is_undefined() {
            return Err(failed("expression is undefined".to_string()));
        }
        Ok(value.is_true())
    }
}

/// One evaluation of a conditional chain.
///
/// Includes and blocks are reachable along more than one path (a nested
/// include's parent is also its block's include), so every entity is
/// checked at most once per walk. An entity seen again already passed,
/// since a false guard or an error ends the walk.
struct ChainWalk<'a> {
    evaluator: &'a ConditionalEvaluator,
    arena: &'a PlaybookArena,
    ctx: JinjaValue,
    checked: HashSet<NodeRef>,
}

impl ChainWalk<'_> {
    fn include_chain(&mut self, id: IncludeId) -> Result<bool> {
        if !self.checked.insert(NodeRef::Include(id)) {
            return Ok(true);
        }
        let arena = self.arena;
        let include = arena.include(id);
        if let Some(parent) = include.parent() {
            if !self.include_chain(parent)? {
                return Ok(false);
            }
        }
        // block or role, never both
        if let Some(block) = include.block() {
            if !self.block_chain(block)? {
                return Ok(false);
            }
        } else if let Some(role) = include.role() {
            if !self.role_guards(role)? {
                return Ok(false);
            }
        }
        self.evaluator.own_guards(include, &self.ctx)
    }

    fn block_chain(&mut self, id: BlockId) -> Result<bool> {
        if !self.checked.insert(NodeRef::Block(id)) {
            return Ok(true);
        }
        let arena = self.arena;
        let block = arena.block(id);
        if let Some(include) = block.task_include() {
            if !self.include_chain(include)? {
                return Ok(false);
            }
        }
        if let Some(parent) = block.parent_block() {
            if !self.block_chain(parent)? {
                return Ok(false);
            }
        } else if let Some(role) = block.role() {
            if !self.role_guards(role)? {
                return Ok(false);
            }
        }
        self.evaluator.own_guards(block, &self.ctx)
    }

    fn task_chain(&mut self, id: TaskId) -> Result<bool> {
        let arena = self.arena;
        let task = arena.task(id);
        if let Some(include) = task.task_include() {
            if !self.include_chain(include)? {
                return Ok(false);
            }
        }
        if let Some(block) = task.block() {
            if !self.block_chain(block)? {
                return Ok(false);
            }
        } else if let Some(role) = task.role() {
            if !self.role_guards(role)? {
                return Ok(false);
            }
        }
        self.evaluator.own_guards(task, &self.ctx)
    }

    fn role_guards(&mut self, id: RoleId) -> Result<bool> {
        if !self.checked.insert(NodeRef::Role(id)) {
            return Ok(true);
        }
        self.evaluator.own_guards(self.arena.role(id), &self.ctx)
    }
}
