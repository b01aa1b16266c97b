//! Dispatch preview
//!
//! Compiled tasks are shipped to a pool of workers as JSON transfer
//! records, the same way an execution layer would hand them to separate
//! processes. Each worker rebuilds the task's ancestry in its own arena,
//! resolves variables and evaluates the conditional chain. Nothing is
//! executed: the result is a plan saying which tasks would run.

use crate::playbook::{
    deserialize_task, from_json, serialize_task, to_json, ConditionalEvaluator, NodeRef,
    PlaybookArena, TaskId, Vars,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Outcome for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskVerdict {
    /// Position in the compiled task list
    pub index: usize,
    pub name: String,
    pub action: String,
    pub enabled: bool,
}

/// Verdicts for every dispatched task, in task list order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    pub verdicts: Vec<TaskVerdict>,
}

impl DispatchPlan {
    pub fn enabled_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.enabled).count()
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Serialize compiled tasks into JSON transfer records
pub fn task_records(arena: &PlaybookArena, tasks: &[TaskId]) -> Result<Vec<String>> {
    tasks
        .iter()
        .map(|id| {
            to_json(&serialize_task(arena, *id)).with_context(|| format!("failed to serialize {}", id))
        })
        .collect()
}

/// Settings shared by every worker
#[derive(Debug, Clone, Default)]
struct WorkerContext {
    extra_vars: Vars,
    only_tags: Vec<String>,
    skip_tags: Vec<String>,
}

/// Worker pool evaluating task records
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workers: usize,
    context: WorkerContext,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            context: WorkerContext::default(),
        }
    }

    /// Variables that override everything resolved from the graph
    pub fn with_extra_vars(mut self, extra_vars: Vars) -> Self {
        self.context.extra_vars = extra_vars;
        self
    }

    pub fn with_tags(mut self, only_tags: Vec<String>, skip_tags: Vec<String>) -> Self {
        self.context.only_tags = only_tags;
        self.context.skip_tags = skip_tags;
        self
    }

    /// Evaluate every record and return the plan sorted by task index
    pub async fn plan(&self, records: Vec<String>) -> Result<DispatchPlan> {
        let capacity = records.len().max(1);
        let (job_tx, job_rx) = mpsc::channel::<(usize, String)>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<Result<TaskVerdict>>(capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let context = Arc::new(self.context.clone());

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let context = Arc::clone(&context);
            handles.push(tokio::spawn(async move {
                Self::run_worker(worker, job_rx, result_tx, context).await
            }));
        }
        drop(result_tx);

        info!("dispatching {} task records to {} workers", records.len(), self.workers);
        for job in records.into_iter().enumerate() {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut verdicts = Vec::new();
        let mut failure = None;
        while let Some(result) = result_rx.recv().await {
            match result {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        for handle in handles {
            handle.await.context("dispatch worker panicked")?;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        verdicts.sort_by_key(|v| v.index);
        Ok(DispatchPlan { verdicts })
    }

    async fn run_worker(
        worker: usize,
        job_rx: Arc<Mutex<mpsc::Receiver<(usize, String)>>>,
        result_tx: mpsc::Sender<Result<TaskVerdict>>,
        context: Arc<WorkerContext>,
    ) {
        let evaluator = ConditionalEvaluator::new();
        loop {
            let job = job_rx.lock().await.recv().await;
            let Some((index, record)) = job else {
                break;
            };
            debug!(worker, index, "evaluating task record");
            let verdict = evaluate_record(&evaluator, &context, index, &record)
                .with_context(|| format!("task record {}", index));
            if result_tx.send(verdict).await.is_err() {
                break;
            }
        }
    }
}

fn evaluate_record(
    evaluator: &ConditionalEvaluator,
    context: &WorkerContext,
    index: usize,
    record: &str,
) -> Result<TaskVerdict> {
    let mut arena = PlaybookArena::new();
    let id = deserialize_task(&mut arena, from_json(record)?)?;
    let task = arena.task(id);

    let enabled = if arena.tags_selected(NodeRef::Task(id), &context.only_tags, &context.skip_tags) {
        let mut vars = arena.task_vars(id);
        vars.extend(context.extra_vars.clone());
        evaluator.evaluate_task(&arena, id, &vars)?
    } else {
        false
    };

    Ok(TaskVerdict {
        index,
        name: task.display_name().to_string(),
        action: task.action.clone(),
        enabled,
    })
}
