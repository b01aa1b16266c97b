use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use playweave::config::{default_config_dir, load_config, PlayweaveConfig};
use playweave::dispatch::{task_records, Dispatcher};
use playweave::playbook::{
    FileLoader, IncludeId, InclusionCompiler, PlaybookArena, StaticLookupRegistry, TaskId, Vars,
};

#[derive(Parser)]
#[command(name = "playweave")]
#[command(about = "Compile and inspect include directives in declarative task playbooks")]
#[command(version)]
struct Cli {
    /// Configuration directory (default: /etc/playweave if exists, otherwise ~/.config/playweave)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a task file and print the flattened task list
    Compile {
        /// Task file, treated as the root include
        file: PathBuf,
    },
    /// Print every include with its public attributes and resolved vars
    Inspect {
        file: PathBuf,
    },
    /// Print the transfer record of every compiled task as JSON lines
    Serialize {
        file: PathBuf,
    },
    /// Preview which tasks would run
    Plan {
        file: PathBuf,
        /// Extra variables (key=value), overriding everything else
        #[arg(short = 'e', long = "extra-vars")]
        extra_vars: Vec<String>,
        /// Only run tasks with these tags (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Skip tasks with these tags (comma separated)
        #[arg(long, value_delimiter = ',')]
        skip_tags: Vec<String>,
    },
}

/// A compiled task file together with the arena holding it
struct Compiled {
    arena: PlaybookArena,
    root: IncludeId,
    tasks: Vec<TaskId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_dir = cli.config.unwrap_or_else(default_config_dir);
    let config = load_config(&config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))?;

    match cli.command {
        Commands::Compile { file } => {
            let compiled = compile(&config, &file)?;
            info!("compiled {} tasks from {}", compiled.tasks.len(), file.display());
            for (index, id) in compiled.tasks.iter().enumerate() {
                let task = compiled.arena.task(*id);
                println!("{:>3}. {} [{}]", index + 1, task.display_name(), task.action);
            }
        }
        Commands::Inspect { file } => {
            let compiled = compile(&config, &file)?;
            let mut report = Vec::new();
            for id in compiled.arena.include_ids() {
                let include = compiled.arena.include(id);
                let mut entry = include.dump_attrs(false);
                entry.insert(
                    Value::from("depth"),
                    Value::from(compiled.arena.include_chain_depth(id) as u64),
                );
                entry.insert(
                    Value::from("resolved_vars"),
                    serde_yaml::to_value(compiled.arena.include_vars(id))?,
                );
                report.push(Value::Mapping(entry));
            }
            print!("{}", serde_yaml::to_string(&report)?);
            info!(
                "root include {} has {} nested includes",
                compiled.root,
                report.len().saturating_sub(1)
            );
        }
        Commands::Serialize { file } => {
            let compiled = compile(&config, &file)?;
            for record in task_records(&compiled.arena, &compiled.tasks)? {
                println!("{}", record);
            }
        }
        Commands::Plan {
            file,
            extra_vars,
            tags,
            skip_tags,
        } => {
            let compiled = compile(&config, &file)?;
            let records = task_records(&compiled.arena, &compiled.tasks)?;
            let plan = Dispatcher::new(config.workers)
                .with_extra_vars(parse_extra_vars(&extra_vars)?)
                .with_tags(tags, skip_tags)
                .plan(records)
                .await?;

            for verdict in &plan.verdicts {
                let status = if verdict.enabled { "run" } else { "skip" };
                println!("{:<4} {} [{}]", status, verdict.name, verdict.action);
            }
            info!("{} of {} tasks would run", plan.enabled_count(), plan.len());
        }
    }

    Ok(())
}

fn compile(config: &PlayweaveConfig, file: &Path) -> Result<Compiled> {
    let base_dir = config
        .base_dir
        .clone()
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = if config.base_dir.is_some() {
        file.to_string_lossy().into_owned()
    } else {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("not a file: {}", file.display()))?
    };

    let loader = FileLoader::new(base_dir);
    let lookups: StaticLookupRegistry = config.lookup_registry();
    let compiler =
        InclusionCompiler::new(&loader, &lookups).with_max_include_depth(config.max_include_depth);

    let mut arena = PlaybookArena::new();
    let (root, tasks) = compiler
        .compile_file(&mut arena, &file_name)
        .with_context(|| format!("failed to compile {}", file.display()))?;
    Ok(Compiled { arena, root, tasks })
}

/// Parse `key=value` pairs; values are read as YAML scalars
fn parse_extra_vars(pairs: &[String]) -> Result<Vars> {
    let mut vars = Vars::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("extra var '{}' is not in key=value form", pair))?;
        let value = match serde_yaml::from_str::<Value>(raw) {
            Ok(Value::Mapping(_)) | Ok(Value::Sequence(_)) | Err(_) => Value::from(raw),
            Ok(scalar) => scalar,
        };
        vars.insert(key.trim().to_string(), value);
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extra_vars() {
        let vars = parse_extra_vars(&[
            "env=prod".to_string(),
            "port=8080".to_string(),
            "debug=true".to_string(),
            "list=[1,2]".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["env"], Value::from("prod"));
        assert_eq!(vars["port"], serde_yaml::from_str::<Value>("8080").unwrap());
        assert_eq!(vars["debug"], Value::Bool(true));
        assert_eq!(vars["list"], Value::from("[1,2]"));
    }

    #[test]
    fn test_parse_extra_vars_requires_equals() {
        assert!(parse_extra_vars(&["env".to_string()]).is_err());
    }

    #[test]
    fn test_compile_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("main.yml"),
            "- debug: msg=one\n- include: other.yml\n",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("other.yml"), "- ping:\n").unwrap();

        let compiled = compile(
            &PlayweaveConfig::default(),
            &temp_dir.path().join("main.yml"),
        )
        .unwrap();
        assert_eq!(compiled.tasks.len(), 2);
        assert_eq!(compiled.arena.task(compiled.tasks[1]).action, "ping");
    }
}
