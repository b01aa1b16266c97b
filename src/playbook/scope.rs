//! Scope resolution over the arena
//!
//! Variables are merged root to leaf along the ownership chain, with the
//! nearest entity winning on key collisions. Tags are inherited the same
//! way but accumulate instead of overriding.

use super::arena::{BlockId, IncludeId, NodeRef, PlaybookArena, RoleId, TaskId};
use super::capability::{tags_selected, Scoped, Taggable, Vars};
use std::collections::{BTreeSet, HashSet};

impl PlaybookArena {
    /// Vars of an include: the parent include's resolved vars, then its own
    pub fn include_vars(&self, id: IncludeId) -> Vars {
        let include = self.include(id);
        let mut all_vars = match include.parent() {
            Some(parent) => self.include_vars(parent),
            None => Vars::new(),
        };
        overlay(&mut all_vars, include);
        all_vars
    }

    /// Vars of a block: parent block (else role), owning include, then its own
    pub fn block_vars(&self, id: BlockId) -> Vars {
        let block = self.block(id);
        let mut all_vars = match (block.parent_block(), block.role()) {
            (Some(parent), _) => self.block_vars(parent),
            (None, Some(role)) => self.role_vars(role),
            (None, None) => Vars::new(),
        };
        if let Some(include) = block.task_include() {
            all_vars.extend(self.include_vars(include));
        }
        overlay(&mut all_vars, block);
        all_vars
    }

    pub fn role_vars(&self, id: RoleId) -> Vars {
        self.role(id).own_vars().clone()
    }

    /// Vars of a task: its block (else role), owning include, then its own
    pub fn task_vars(&self, id: TaskId) -> Vars {
        let task = self.task(id);
        let mut all_vars = match (task.block(), task.role()) {
            (Some(block), _) => self.block_vars(block),
            (None, Some(role)) => self.role_vars(role),
            (None, None) => Vars::new(),
        };
        if let Some(include) = task.task_include() {
            all_vars.extend(self.include_vars(include));
        }
        overlay(&mut all_vars, task);
        all_vars
    }

    pub fn vars_of(&self, node: NodeRef) -> Vars {
        match node {
            NodeRef::Include(id) => self.include_vars(id),
            NodeRef::Block(id) => self.block_vars(id),
            NodeRef::Role(id) => self.role_vars(id),
            NodeRef::Task(id) => self.task_vars(id),
        }
    }

    /// Own tags plus every tag inherited from owners and parent includes
    pub fn effective_tags(&self, node: NodeRef) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        self.collect_tags(node, &mut tags, &mut HashSet::new());
        tags
    }

    /// Owners reachable along several paths are visited once
    fn collect_tags(&self, node: NodeRef, tags: &mut BTreeSet<String>, seen: &mut HashSet<NodeRef>) {
        if !seen.insert(node) {
            return;
        }
        let (own, links) = match node {
            NodeRef::Include(id) => (self.include(id).tags(), self.include(id).links()),
            NodeRef::Block(id) => (self.block(id).tags(), self.block(id).links()),
            NodeRef::Task(id) => (self.task(id).tags(), self.task(id).links()),
            NodeRef::Role(id) => {
                tags.extend(self.role(id).tags().iter().cloned());
                return;
            }
        };
        tags.extend(own.iter().cloned());
        if let Some(block) = links.block {
            self.collect_tags(NodeRef::Block(block), tags, seen);
        }
        if let Some(include) = links.task_include {
            self.collect_tags(NodeRef::Include(include), tags, seen);
        }
        if let Some(role) = links.role {
            self.collect_tags(NodeRef::Role(role), tags, seen);
        }
    }

    /// Tag selection using inherited tags
    pub fn tags_selected(&self, node: NodeRef, only_tags: &[String], skip_tags: &[String]) -> bool {
        let tags = self.effective_tags(node);
        let tags: BTreeSet<&str> = tags.iter().map(String::as_str).collect();
        tags_selected(&tags, only_tags, skip_tags)
    }
}

fn overlay(all_vars: &mut Vars, entity: &impl Scoped) {
    all_vars.extend(
        entity
            .own_vars()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::arena::ParentLinks;
    use crate::playbook::block::{Block, BlockAttributes};
    use crate::playbook::role::Role;
    use crate::playbook::task::Task;
    use crate::playbook::task_include::{IncludeAttributes, TaskInclude};
    use serde_yaml::Value;

    fn vars(yaml: &str) -> Vars {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn include(arena: &mut PlaybookArena, target: &str, v: &str, parent: Option<IncludeId>) -> IncludeId {
        let mut attrs = IncludeAttributes::new(target);
        attrs.vars = vars(v);
        arena.add_include(TaskInclude::from_attributes(
            attrs,
            ParentLinks {
                task_include: parent,
                ..ParentLinks::default()
            },
        ))
    }

    #[test]
    fn test_three_level_chain_leaf_wins() {
        let mut arena = PlaybookArena::new();
        let root = include(&mut arena, "root.yml", "{a: 1}", None);
        let mid = include(&mut arena, "mid.yml", "{a: 2, b: 3}", Some(root));
        let leaf = include(&mut arena, "leaf.yml", "{c: 4}", Some(mid));

        assert_eq!(arena.include_vars(leaf), vars("{a: 2, b: 3, c: 4}"));
        assert_eq!(arena.include_vars(root), vars("{a: 1}"));
    }

    #[test]
    fn test_include_without_parent() {
        let mut arena = PlaybookArena::new();
        let id = include(&mut arena, "only.yml", "{}", None);
        assert!(arena.include_vars(id).is_empty());
    }

    #[test]
    fn test_task_vars_precedence() {
        let mut arena = PlaybookArena::new();
        let role = arena.add_role(Role::new("web"));
        let inc = include(&mut arena, "tasks.yml", "{port: 8080, env: prod}", None);

        let block_attrs = BlockAttributes {
            vars: vars("{port: 81, owner: block}"),
            ..BlockAttributes::default()
        };
        let block = arena.add_block(Block::new(
            block_attrs,
            ParentLinks {
                role: Some(role),
                task_include: Some(inc),
                ..ParentLinks::default()
            },
            false,
        ));

        let mut task = Task::new("debug");
        task.attrs.vars = vars("{env: staging}");
        let task = arena.add_task(task.with_links(ParentLinks {
            block: Some(block),
            role: Some(role),
            task_include: Some(inc),
            use_handlers: false,
        }));

        let resolved = arena.task_vars(task);
        // include vars override block vars, task vars override both
        assert_eq!(resolved.get("port"), Some(&yaml("8080")));
        assert_eq!(resolved.get("owner"), Some(&yaml("block")));
        assert_eq!(resolved.get("env"), Some(&yaml("staging")));
        assert_eq!(arena.vars_of(NodeRef::Task(task)), resolved);
    }

    #[test]
    fn test_effective_tags_inherited() {
        let mut arena = PlaybookArena::new();
        let mut attrs = IncludeAttributes::new("tasks.yml");
        attrs.tags = vec!["deploy".to_string()];
        let inc = arena.add_include(TaskInclude::from_attributes(attrs, ParentLinks::default()));

        let mut task = Task::new("debug");
        task.attrs.tags = vec!["fast".to_string()];
        let task = arena.add_task(task.with_links(ParentLinks {
            task_include: Some(inc),
            ..ParentLinks::default()
        }));

        let tags = arena.effective_tags(NodeRef::Task(task));
        assert!(tags.contains("deploy"));
        assert!(tags.contains("fast"));

        assert!(arena.tags_selected(NodeRef::Task(task), &["deploy".to_string()], &[]));
        assert!(!arena.tags_selected(NodeRef::Task(task), &[], &["deploy".to_string()]));
    }
}
