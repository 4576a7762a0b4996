// flowgate/src/error.rs
use crate::core::status::WorkflowStatus;
use thiserror::Error;

/// Errors raised by the orchestrator, the pipeline registry and the execution context.
///
/// Failures *inside* a step are not `FlowError`s: they are returned as
/// `StepResult::Failed` and recorded on the context. A `FlowError` means the caller
/// (or the pipeline author) asked for something the core refuses to do.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step '{step_id}' is already registered")]
  DuplicateStep { step_id: String },

  #[error("Step not found: {step_id}")]
  UnknownStep { step_id: String },

  #[error("Route from step '{step_id}' targets unregistered step '{target}'")]
  DanglingRoute { step_id: String, target: String },

  #[error("Pipeline has no registered steps")]
  EmptyPipeline,

  #[error("Output for step '{step_id}' was already written")]
  DuplicateOutput { step_id: String },

  #[error("Invalid status transition {from} -> {to}")]
  InvalidTransition { from: WorkflowStatus, to: WorkflowStatus },

  #[error("Workflow is {status} and cannot be resumed")]
  NotResumable { status: WorkflowStatus },

  #[error("Workflow is {status}; its context is read-only")]
  ContextFinalized { status: WorkflowStatus },

  #[error("Configuration error: {message}")]
  Config { message: String },

  #[error("Context snapshot could not be (de)serialized. Source: {source}")]
  Snapshot {
    #[from]
    source: serde_json::Error,
  },
}

impl FlowError {
  /// Programming errors in the pipeline definition. Never recoverable at runtime.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      FlowError::DuplicateStep { .. }
        | FlowError::UnknownStep { .. }
        | FlowError::DanglingRoute { .. }
        | FlowError::EmptyPipeline
        | FlowError::Config { .. }
    )
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
