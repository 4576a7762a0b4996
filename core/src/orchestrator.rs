// flowgate/src/orchestrator.rs

//! Defines the `Orchestrator`: the caller-facing boundary that owns a validated
//! pipeline and starts, resumes and summarizes workflow runs.

use crate::config::OrchestratorConfig;
use crate::core::context::{Cursor, ErrorRecord, ExecutionContext, HistoryEntry, HistoryEvent};
use crate::core::control::InputRequest;
use crate::core::status::WorkflowStatus;
use crate::core::step::Step;
use crate::error::{FlowError, FlowResult};
use crate::pipeline::definition::Pipeline;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Drives a pipeline against execution contexts.
///
/// The orchestrator keeps no contexts of its own: `start` hands a new context to the
/// caller, the caller keeps it (in memory, or serialized with
/// `ExecutionContext::to_json`) while the run is suspended, and passes it back to
/// `resume`. Taking `&mut ExecutionContext` in `resume` means one context cannot be
/// advanced by two callers at once; separate contexts are independent and may be
/// driven concurrently through a shared `Arc<Orchestrator>`.
pub struct Orchestrator {
  pipeline: RwLock<Arc<Pipeline>>,
  config: OrchestratorConfig,
}

impl Orchestrator {
  /// Validates `pipeline` and wraps it with default settings.
  pub fn new(pipeline: Pipeline) -> FlowResult<Self> {
    Self::with_config(pipeline, OrchestratorConfig::default())
  }

  pub fn with_config(pipeline: Pipeline, config: OrchestratorConfig) -> FlowResult<Self> {
    pipeline.validate()?;
    event!(Level::DEBUG, num_steps = pipeline.len(), "Orchestrator created.");
    Ok(Self {
      pipeline: RwLock::new(Arc::new(pipeline)),
      config,
    })
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  /// Appends a step to the registry. Runs already suspended pick it up on resume.
  pub fn register_step<S: Step + 'static>(&self, step_id: impl Into<String>, step: S) -> FlowResult<()> {
    let mut guard = self.pipeline.write();
    Arc::make_mut(&mut guard).register(step_id, step)
  }

  /// Step identifiers in registration order.
  pub fn step_ids(&self) -> Vec<String> {
    self.pipeline.read().step_ids().map(str::to_string).collect()
  }

  // Runs never hold the registry lock across an await: they work on a snapshot.
  fn snapshot(&self) -> Arc<Pipeline> {
    self.pipeline.read().clone()
  }

  /// Creates a context for `input` and runs it until it completes, suspends or fails.
  ///
  /// `Err` means the pipeline itself is unusable (a configuration error); no context
  /// is created in that case. Every step-level failure comes back as `Ok` with the
  /// context in `FAILED`.
  #[instrument(name = "Orchestrator::start", skip_all, err(Display))]
  pub async fn start(&self, input: Value) -> FlowResult<ExecutionContext> {
    let pipeline = self.snapshot();
    pipeline.validate()?;
    let first = pipeline.first().ok_or(FlowError::EmptyPipeline)?.to_string();

    let mut ctx = ExecutionContext::new(first, input);
    ctx.set_status(WorkflowStatus::InProgress)?;
    ctx.push_history(
      HistoryEvent::Started,
      self.config.actor.clone(),
      None,
      format!("Workflow started ({} steps registered)", pipeline.len()),
      None,
    );
    event!(Level::INFO, run_id = %ctx.run_id(), "Workflow started.");

    pipeline.drive(&mut ctx, None, None, &self.config).await?;
    Ok(ctx)
  }

  /// Continues a suspended run at the step that suspended it, passing `input` to that step.
  ///
  /// Fails with `NotResumable` for `SUCCESS`/`FAILED` contexts and leaves them untouched.
  #[instrument(
        name = "Orchestrator::resume",
        skip_all,
        fields(run_id = %ctx.run_id(), status = %ctx.status()),
        err(Display)
    )]
  pub async fn resume(&self, ctx: &mut ExecutionContext, input: Value) -> FlowResult<()> {
    if ctx.is_terminal() {
      event!(Level::WARN, "Refusing to resume a finished workflow.");
      return Err(FlowError::NotResumable { status: ctx.status() });
    }
    let pipeline = self.snapshot();

    if ctx.status() != WorkflowStatus::InProgress {
      ctx.set_status(WorkflowStatus::InProgress)?;
    }
    let answered = ctx.take_pending_input_request();
    let waiting_on = answered
      .as_ref()
      .map(|req| req.step_id.clone())
      .or_else(|| ctx.cursor().step_id().map(str::to_string));
    ctx.push_history(
      HistoryEvent::Resumed,
      self.config.actor.clone(),
      waiting_on.clone(),
      match &waiting_on {
        Some(step_id) => format!("Workflow resumed at '{}'", step_id),
        None => "Workflow resumed".to_string(),
      },
      None,
    );
    event!(Level::INFO, step_id = ?waiting_on, "Workflow resumed.");

    pipeline.drive(ctx, Some(input), answered, &self.config).await
  }

  /// Read-only report of a run: status, every output, and the full history.
  pub fn get_execution_summary(&self, ctx: &ExecutionContext) -> ExecutionSummary {
    ExecutionSummary::from_context(ctx)
  }
}

impl std::fmt::Debug for Orchestrator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Orchestrator")
      .field("steps", &self.step_ids())
      .field("config", &self.config)
      .finish()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
  pub run_id: Uuid,
  pub status: WorkflowStatus,
  pub cursor: Cursor,
  pub requires_approval: bool,
  /// Number of step invocations that ended (completed, suspended or failed).
  pub steps_executed: usize,
  pub total_step_duration_ms: u64,
  pub outputs: IndexMap<String, Value>,
  pub pending_input_request: Option<InputRequest>,
  pub error: Option<ErrorRecord>,
  pub history: Vec<HistoryEntry>,
}

impl ExecutionSummary {
  pub fn from_context(ctx: &ExecutionContext) -> Self {
    let step_entries = ctx.history().iter().filter(|entry| {
      matches!(
        entry.event,
        HistoryEvent::StepCompleted | HistoryEvent::StepSuspended | HistoryEvent::StepFailed
      ) && entry.duration_ms.is_some()
    });
    let (steps_executed, total_step_duration_ms) =
      step_entries.fold((0usize, 0u64), |(n, total), entry| (n + 1, total + entry.duration_ms.unwrap_or(0)));

    Self {
      run_id: ctx.run_id(),
      status: ctx.status(),
      cursor: ctx.cursor().clone(),
      requires_approval: ctx.status() == WorkflowStatus::RequiresApproval,
      steps_executed,
      total_step_duration_ms,
      outputs: ctx.outputs().clone(),
      pending_input_request: ctx.pending_input_request().cloned(),
      error: ctx.error().cloned(),
      history: ctx.history().to_vec(),
    }
  }

  /// True when any history entry names `step_id`, as executed step or route target.
  pub fn touched_step(&self, step_id: &str) -> bool {
    self
      .history
      .iter()
      .any(|entry| entry.step_id.as_deref() == Some(step_id) || entry.target.as_deref() == Some(step_id))
  }
}
