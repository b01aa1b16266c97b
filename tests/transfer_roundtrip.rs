//! Integration tests for transfer records
//!
//! Compiled entities are serialized, shipped as JSON and rebuilt in a
//! fresh arena, the way a worker process receives them.

use playweave::playbook::{
    decode, deserialize_include, deserialize_task, from_json, serialize_include, serialize_task,
    to_json, ConditionalEvaluator, InclusionCompiler, MemoryLoader, NodeRef, PlaybookArena, Record,
    StaticLookupRegistry,
};
use playweave::PlaybookError;
use serde_json::json;

fn compiled_arena() -> (PlaybookArena, Vec<playweave::playbook::TaskId>) {
    let loader = MemoryLoader::new()
        .with_file(
            "site.yml",
            r#"
- name: web tier
  vars:
    tier: web
  when: deploy_web | bool
  block:
    - include: app.yml version=2
      tags: [app]
      with_items: [a, b]
"#,
        )
        .with_file(
            "app.yml",
            r#"
- name: ship version {{ version }}
  copy: src=app dest=/srv
  when: version == '2'
  notify: restart app
"#,
        );
    let lookups = StaticLookupRegistry::default();
    let compiler = InclusionCompiler::new(&loader, &lookups);
    let mut arena = PlaybookArena::new();
    let (_, tasks) = compiler.compile_file(&mut arena, "site.yml").unwrap();
    (arena, tasks)
}

#[test]
fn test_nested_include_round_trip() {
    let (arena, _) = compiled_arena();
    let nested = arena
        .include_ids()
        .find(|id| arena.include(*id).target() == "app.yml")
        .unwrap();

    let json = to_json(&serialize_include(&arena, nested)).unwrap();
    let mut worker_arena = PlaybookArena::new();
    let rebuilt = deserialize_include(&mut worker_arena, from_json(&json).unwrap()).unwrap();

    let (original, copy) = (arena.include(nested), worker_arena.include(rebuilt));
    assert_eq!(copy.target(), original.target());
    assert_eq!(copy.attrs.vars, original.attrs.vars);
    assert_eq!(copy.attrs.tags, original.attrs.tags);
    assert_eq!(copy.attrs.loop_name.as_deref(), Some("items"));
    assert_eq!(copy.attrs.loop_args, original.attrs.loop_args);
    assert_eq!(
        worker_arena.include_chain_depth(rebuilt),
        arena.include_chain_depth(nested)
    );
    assert_eq!(worker_arena.include_vars(rebuilt), arena.include_vars(nested));

    let block = copy.block().expect("owning block is rebuilt");
    assert_eq!(worker_arena.block(block).attrs.name.as_deref(), Some("web tier"));
    // the rebuilt include is not compiled; only its metadata travels
    assert!(!copy.is_compiled());
}

#[test]
fn test_task_records_evaluate_like_originals() {
    let (arena, tasks) = compiled_arena();
    let evaluator = ConditionalEvaluator::new();

    for task in tasks {
        let json = to_json(&serialize_task(&arena, task)).unwrap();
        let mut worker_arena = PlaybookArena::new();
        let copy = deserialize_task(&mut worker_arena, from_json(&json).unwrap()).unwrap();

        let mut vars = worker_arena.task_vars(copy);
        assert_eq!(vars, arena.task_vars(task));
        vars.insert("deploy_web".to_string(), serde_yaml::Value::from("yes"));

        assert!(evaluator.evaluate_task(&worker_arena, copy, &vars).unwrap());
        vars.insert("deploy_web".to_string(), serde_yaml::Value::from("no"));
        assert!(!evaluator.evaluate_task(&worker_arena, copy, &vars).unwrap());

        assert!(worker_arena.task(copy).keywords.contains_key("notify"));
    }
}

#[test]
fn test_record_without_relations() {
    let record = decode(json!({
        "__kind": "task_include",
        "include": "standalone.yml",
        "vars": {"x": 1},
        "when": ["x == 1"]
    }))
    .unwrap();
    assert_eq!(record.kind(), "task_include");

    let mut arena = PlaybookArena::new();
    let id = deserialize_include(&mut arena, record).unwrap();
    let include = arena.include(id);
    assert!(include.block().is_none());
    assert!(include.role().is_none());
    assert!(include.parent().is_none());

    let evaluator = ConditionalEvaluator::new();
    assert!(evaluator
        .evaluate_include(&arena, id, &arena.include_vars(id))
        .unwrap());
}

#[test]
fn test_record_with_role_only() {
    let record = decode(json!({
        "__kind": "task_include",
        "include": "role_tasks.yml",
        "role": {"__kind": "role", "name": "db", "vars": {"engine": "postgres"}}
    }))
    .unwrap();

    let mut arena = PlaybookArena::new();
    let id = deserialize_include(&mut arena, record).unwrap();
    let role = arena.include(id).role().unwrap();
    assert_eq!(arena.role(role).name(), "db");
    assert!(arena.include(id).block().is_none());
}

#[test]
fn test_missing_target_is_rejected() {
    let err = from_json(r#"{"__kind": "task_include", "vars": {}}"#).unwrap_err();
    assert!(matches!(err, PlaybookError::Deserialization(_)));

    let record: Record = from_json(r#"{"__kind": "task_include", "include": "  "}"#).unwrap();
    let mut arena = PlaybookArena::new();
    let err = deserialize_include(&mut arena, record).unwrap_err();
    assert!(matches!(err, PlaybookError::Deserialization(_)));
    assert_eq!(arena.include_count(), 0);
}

/// f0.yml -> f1.yml -> ... -> f40.yml, each link guarded and tagged
fn deep_chain(levels: usize) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for level in 0..levels {
        loader = loader.with_file(
            format!("f{}.yml", level),
            format!(
                "- include: f{}.yml\n  when: \"true\"\n  tags: [level{}]\n",
                level + 1,
                level
            ),
        );
    }
    loader.with_file(
        format!("f{}.yml", levels),
        "- name: leaf\n  debug: msg=deep\n  when: depth_ok | bool\n",
    )
}

#[test]
fn test_deep_include_chain_stays_linear() {
    let loader = deep_chain(40);
    let lookups = StaticLookupRegistry::default();
    let compiler = InclusionCompiler::new(&loader, &lookups);
    let mut arena = PlaybookArena::new();
    let (_, tasks) = compiler.compile_file(&mut arena, "f0.yml").unwrap();
    assert_eq!(tasks.len(), 1);
    let leaf = tasks[0];

    let json = to_json(&serialize_task(&arena, leaf)).unwrap();
    // every ancestor is written once
    assert!(json.len() < 100_000, "record is {} bytes", json.len());

    let mut worker_arena = PlaybookArena::new();
    let copy = deserialize_task(&mut worker_arena, from_json(&json).unwrap()).unwrap();
    assert_eq!(worker_arena.include_count(), arena.include_count());
    assert_eq!(worker_arena.block_count(), arena.block_count());

    let tags = worker_arena.effective_tags(NodeRef::Task(copy));
    assert!(tags.contains("level0"));
    assert!(tags.contains("level39"));
    assert_eq!(tags, arena.effective_tags(NodeRef::Task(leaf)));

    let evaluator = ConditionalEvaluator::new();
    let mut vars = worker_arena.task_vars(copy);
    vars.insert("depth_ok".to_string(), serde_yaml::Value::from("yes"));
    assert!(evaluator.evaluate_task(&worker_arena, copy, &vars).unwrap());
    assert!(evaluator.evaluate_task(&arena, leaf, &vars).unwrap());

    vars.insert("depth_ok".to_string(), serde_yaml::Value::from("no"));
    assert!(!evaluator.evaluate_task(&worker_arena, copy, &vars).unwrap());
}
