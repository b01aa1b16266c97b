use criterion::{black_box, criterion_group, criterion_main, Criterion};
use playweave::playbook::{
    serialize_task, to_json, ConditionalEvaluator, InclusionCompiler, MemoryLoader, PlaybookArena,
    StaticLookupRegistry,
};

/// A chain of `depth` task files, each with a few tasks and one nested include
fn nested_tree(depth: usize) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for level in 0..depth {
        let mut contents = format!(
            "- name: level {level} block\n  vars:\n    level: {level}\n  block:\n    - debug: msg=first\n    - debug: msg=second\n      when: level >= 0\n"
        );
        if level + 1 < depth {
            contents.push_str(&format!("    - include: level{}.yml depth={}\n", level + 1, level));
        }
        contents.push_str("- shell: echo done\n");
        loader.add_file(format!("level{}.yml", level), contents);
    }
    loader
}

/// Benchmark compiling a nested include tree
fn bench_compile(c: &mut Criterion) {
    let loader = nested_tree(16);
    let lookups = StaticLookupRegistry::default();
    let compiler = InclusionCompiler::new(&loader, &lookups);

    c.bench_function("compile_nested_includes", |b| {
        b.iter(|| {
            let mut arena = PlaybookArena::new();
            let (_, tasks) = compiler
                .compile_file(&mut arena, black_box("level0.yml"))
                .unwrap();
            black_box(tasks.len());
        });
    });
}

/// Benchmark resolving vars and conditionals for every compiled task
fn bench_resolve(c: &mut Criterion) {
    let loader = nested_tree(16);
    let lookups = StaticLookupRegistry::default();
    let compiler = InclusionCompiler::new(&loader, &lookups);
    let mut arena = PlaybookArena::new();
    let (_, tasks) = compiler.compile_file(&mut arena, "level0.yml").unwrap();
    let evaluator = ConditionalEvaluator::new();

    c.bench_function("resolve_task_scope", |b| {
        b.iter(|| {
            for task in &tasks {
                let vars = arena.task_vars(*task);
                black_box(evaluator.evaluate_task(&arena, *task, &vars).unwrap());
            }
        });
    });

    c.bench_function("serialize_task_records", |b| {
        b.iter(|| {
            for task in &tasks {
                black_box(to_json(&serialize_task(&arena, *task)).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_compile, bench_resolve);
criterion_main!(benches);
