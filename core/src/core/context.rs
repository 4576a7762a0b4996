// flowgate/src/core/context.rs

//! The `ExecutionContext`: single source of truth for one workflow run.
//!
//! Only the orchestrator's driver loop mutates a context while it runs. Steps see it
//! through a read-only `StepView` and hand results back; callers read it through the
//! accessors below or `Orchestrator::get_execution_summary`.

use crate::core::control::{FailureKind, InputRequest, StepFailure};
use crate::core::status::WorkflowStatus;
use crate::error::{FlowError, FlowResult};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{event, Level};
use uuid::Uuid;

/// Where the driver loop will go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
  Step(String),
  /// Sentinel: no step left to run.
  Done,
}

impl Cursor {
  pub fn step_id(&self) -> Option<&str> {
    match self {
      Cursor::Step(id) => Some(id.as_str()),
      Cursor::Done => None,
    }
  }

  pub fn is_done(&self) -> bool {
    matches!(self, Cursor::Done)
  }
}

/// Category of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
  Note,
  Started,
  Resumed,
  StepCompleted,
  StepSuspended,
  StepFailed,
  Routed,
  Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub at: DateTime<Utc>,
  pub actor: String,
  pub message: String,
  pub event: HistoryEvent,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<u64>,
  /// Where a `Routed` entry sent the run; `None` for the end of the workflow.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
}

/// Last error of a `FAILED` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
  pub step_id: Option<String>,
  pub kind: FailureKind,
  pub message: String,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
  run_id: Uuid,
  created_at: DateTime<Utc>,
  input: Value,
  status: WorkflowStatus,
  cursor: Cursor,
  outputs: IndexMap<String, Value>,
  history: Vec<HistoryEntry>,
  pending_input_request: Option<InputRequest>,
  error: Option<ErrorRecord>,
}

impl ExecutionContext {
  /// A fresh context parked in `PENDING` with the cursor on `first_step`.
  pub fn new(first_step: impl Into<String>, input: Value) -> Self {
    Self {
      run_id: Uuid::new_v4(),
      created_at: Utc::now(),
      input,
      status: WorkflowStatus::Pending,
      cursor: Cursor::Step(first_step.into()),
      outputs: IndexMap::new(),
      history: Vec::new(),
      pending_input_request: None,
      error: None,
    }
  }

  // --- Read access ---

  pub fn run_id(&self) -> Uuid {
    self.run_id
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn input(&self) -> &Value {
    &self.input
  }

  pub fn status(&self) -> WorkflowStatus {
    self.status
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  pub fn cursor(&self) -> &Cursor {
    &self.cursor
  }

  pub fn outputs(&self) -> &IndexMap<String, Value> {
    &self.outputs
  }

  pub fn output(&self, step_id: &str) -> Option<&Value> {
    self.outputs.get(step_id)
  }

  pub fn history(&self) -> &[HistoryEntry] {
    &self.history
  }

  pub fn pending_input_request(&self) -> Option<&InputRequest> {
    self.pending_input_request.as_ref()
  }

  pub fn error(&self) -> Option<&ErrorRecord> {
    self.error.as_ref()
  }

  // --- Mutation contract ---

  /// Appends a free-form note to the history. Never fails, never removes entries.
  pub fn record(&mut self, actor: impl Into<String>, message: impl Into<String>) {
    self.push_history(HistoryEvent::Note, actor.into(), None, message.into(), None);
  }

  /// Stores `value` under `step_id`. Outputs are write-once.
  pub fn write_output(&mut self, step_id: impl Into<String>, value: Value) -> FlowResult<()> {
    if self.status.is_terminal() {
      return Err(FlowError::ContextFinalized { status: self.status });
    }
    let step_id = step_id.into();
    if self.outputs.contains_key(&step_id) {
      return Err(FlowError::DuplicateOutput { step_id });
    }
    self.outputs.insert(step_id, value);
    Ok(())
  }

  /// Moves to `next` if the transition graph allows it.
  pub fn set_status(&mut self, next: WorkflowStatus) -> FlowResult<()> {
    if !self.status.can_transition_to(next) {
      return Err(FlowError::InvalidTransition {
        from: self.status,
        to: next,
      });
    }
    event!(Level::TRACE, run_id = %self.run_id, from = %self.status, to = %next, "Status transition.");
    self.status = next;
    Ok(())
  }

  // --- Snapshot persistence ---

  pub fn to_json(&self) -> FlowResult<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_json(snapshot: &str) -> FlowResult<Self> {
    Ok(serde_json::from_str(snapshot)?)
  }

  // --- Driver-only helpers ---

  pub(crate) fn push_history(
    &mut self,
    event: HistoryEvent,
    actor: String,
    step_id: Option<String>,
    message: String,
    duration_ms: Option<u64>,
  ) {
    let at = self.next_stamp();
    self.history.push(HistoryEntry {
      at,
      actor,
      message,
      event,
      step_id,
      duration_ms,
      target: None,
    });
  }

  pub(crate) fn push_routed(&mut self, actor: String, step_id: String, target: Option<String>, message: String) {
    let at = self.next_stamp();
    self.history.push(HistoryEntry {
      at,
      actor,
      message,
      event: HistoryEvent::Routed,
      step_id: Some(step_id),
      duration_ms: None,
      target,
    });
  }

  pub(crate) fn set_cursor(&mut self, cursor: Cursor) {
    self.cursor = cursor;
  }

  pub(crate) fn set_pending_input_request(&mut self, request: Option<InputRequest>) {
    self.pending_input_request = request;
  }

  pub(crate) fn take_pending_input_request(&mut self) -> Option<InputRequest> {
    self.pending_input_request.take()
  }

  pub(crate) fn set_error(&mut self, step_id: Option<&str>, failure: &StepFailure) {
    let at = self.next_stamp();
    self.error = Some(ErrorRecord {
      step_id: step_id.map(str::to_string),
      kind: failure.kind,
      message: failure.message.clone(),
      at,
    });
  }

  // Wall clocks can step backwards; history stamps must not.
  fn next_stamp(&self) -> DateTime<Utc> {
    let now = Utc::now();
    match self.history.last() {
      Some(last) if last.at > now => last.at,
      _ => now,
    }
  }
}
