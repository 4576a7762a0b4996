// flowgate/src/core/control.rs

//! Defines what a step hands back to the driver loop: completion, suspension or failure.

use crate::core::status::WorkflowStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of one step invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
  /// The step finished. The driver stores the value under the step's identifier
  /// and moves the cursor on.
  Completed(Value),
  /// The step cannot finish without external input. The cursor stays on this step
  /// and `resume` re-invokes it with the supplied input.
  Suspend(Suspension),
  /// The step cannot proceed. The run ends in `FAILED`.
  Failed(StepFailure),
}

impl StepResult {
  /// Serializes `output` into a `Completed` result. A value that cannot be
  /// represented as JSON is reported as a `StepOutput` failure.
  pub fn completed<T: Serialize>(output: &T) -> Self {
    match serde_json::to_value(output) {
      Ok(value) => StepResult::Completed(value),
      Err(e) => StepResult::Failed(StepFailure::new(
        FailureKind::StepOutput,
        format!("step output is not serializable: {}", e),
      )),
    }
  }

  pub fn awaiting_input(reason: impl Into<String>, expected: &[&str]) -> Self {
    StepResult::Suspend(Suspension::new(SuspendKind::AwaitingInput, reason, expected))
  }

  pub fn awaiting_approval(reason: impl Into<String>, expected: &[&str]) -> Self {
    StepResult::Suspend(Suspension::new(SuspendKind::AwaitingApproval, reason, expected))
  }

  pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
    StepResult::Failed(StepFailure::new(kind, message))
  }
}

impl From<StepFailure> for StepResult {
  fn from(failure: StepFailure) -> Self {
    StepResult::Failed(failure)
  }
}

// Lets step bodies use `?` on typed accessors and fold the error branch back in.
impl From<Result<StepResult, StepFailure>> for StepResult {
  fn from(res: Result<StepResult, StepFailure>) -> Self {
    res.unwrap_or_else(StepResult::Failed)
  }
}

/// Which kind of wait a suspension represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendKind {
  /// Data is missing (e.g. a supplier choice). Parks the run in `PENDING`.
  AwaitingInput,
  /// A human decision is required. Parks the run in `REQUIRES_APPROVAL`.
  AwaitingApproval,
}

impl SuspendKind {
  pub fn status(self) -> WorkflowStatus {
    match self {
      SuspendKind::AwaitingInput => WorkflowStatus::Pending,
      SuspendKind::AwaitingApproval => WorkflowStatus::RequiresApproval,
    }
  }
}

/// A step's request for external input.
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
  pub kind: SuspendKind,
  pub reason: String,
  /// Names of the fields the resume input is expected to carry.
  pub expected: Vec<String>,
  /// Free-form material for whoever answers (a draft email, a list of choices, ...).
  pub details: Value,
}

impl Suspension {
  pub fn new(kind: SuspendKind, reason: impl Into<String>, expected: &[&str]) -> Self {
    Self {
      kind,
      reason: reason.into(),
      expected: expected.iter().map(|s| (*s).to_string()).collect(),
      details: Value::Null,
    }
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = details;
    self
  }
}

/// What the context records while a run is suspended: the suspension plus the
/// step that asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
  pub step_id: String,
  pub kind: SuspendKind,
  pub reason: String,
  pub expected: Vec<String>,
  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub details: Value,
}

impl InputRequest {
  pub(crate) fn from_suspension(step_id: &str, suspension: Suspension) -> Self {
    Self {
      step_id: step_id.to_string(),
      kind: suspension.kind,
      reason: suspension.reason,
      expected: suspension.expected,
      details: suspension.details,
    }
  }
}

/// Category of a step-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// External output (typically model JSON) could not be parsed.
  ParseError,
  /// External output parsed but is unusable (null price, zero quantity, ...).
  StepOutput,
  /// A step read an upstream output that was never written.
  MissingOutput,
  /// A collaborator call itself failed.
  External,
  /// A human decision ended the run.
  Rejected,
  /// A selector routed to a step that is not registered.
  UnknownStep,
  /// A completed step tried to overwrite an existing output.
  DuplicateOutput,
  /// One call advanced more steps than the configured limit.
  StepLimitExceeded,
}

impl fmt::Display for FailureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      FailureKind::ParseError => "parse_error",
      FailureKind::StepOutput => "step_output",
      FailureKind::MissingOutput => "missing_output",
      FailureKind::External => "external",
      FailureKind::Rejected => "rejected",
      FailureKind::UnknownStep => "unknown_step",
      FailureKind::DuplicateOutput => "duplicate_output",
      FailureKind::StepLimitExceeded => "step_limit_exceeded",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
  pub kind: FailureKind,
  pub message: String,
}

impl StepFailure {
  pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn parse(message: impl Into<String>) -> Self {
    Self::new(FailureKind::ParseError, message)
  }

  pub fn output(message: impl Into<String>) -> Self {
    Self::new(FailureKind::StepOutput, message)
  }
}

impl fmt::Display for StepFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.kind, self.message)
  }
}

// Collaborator seams speak anyhow; keep the whole cause chain in the message.
impl From<anyhow::Error> for StepFailure {
  fn from(err: anyhow::Error) -> Self {
    StepFailure::new(FailureKind::External, format!("{:#}", err))
  }
}
