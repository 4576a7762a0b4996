// flowgate/src/core/step.rs

//! The step contract: the `Step` trait, the read-only `StepView` a step receives,
//! and the `StepDef` binding a step identifier to its implementation and selector.

use crate::core::context::ExecutionContext;
use crate::core::control::{FailureKind, InputRequest, StepFailure, StepResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// One unit of pipeline work.
///
/// A step never mutates the context. It reads what it needs through the `StepView`
/// and returns a `StepResult`; the driver loop writes outputs and moves the cursor.
///
/// When a step suspends, `resume` re-invokes *the same step* with the caller's
/// input, so a step has to treat a second invocation as a fresh attempt: nothing it
/// returned before a suspension was stored.
#[async_trait]
pub trait Step: Send + Sync {
  async fn run(&self, view: StepView<'_>) -> StepResult;
}

/// Read-only view of the context handed to a step, plus the resume input when the
/// step is being re-entered after a suspension.
#[derive(Debug, Clone, Copy)]
pub struct StepView<'a> {
  step_id: &'a str,
  ctx: &'a ExecutionContext,
  resume_input: Option<&'a Value>,
  answered: Option<&'a InputRequest>,
}

impl<'a> StepView<'a> {
  pub fn new(step_id: &'a str, ctx: &'a ExecutionContext, resume_input: Option<&'a Value>) -> Self {
    Self {
      step_id,
      ctx,
      resume_input,
      answered: None,
    }
  }

  /// Attaches the input request the resume input answers.
  pub fn answering(mut self, request: Option<&'a InputRequest>) -> Self {
    self.answered = request;
    self
  }

  pub fn step_id(&self) -> &'a str {
    self.step_id
  }

  pub fn run_id(&self) -> Uuid {
    self.ctx.run_id()
  }

  pub fn context(&self) -> &'a ExecutionContext {
    self.ctx
  }

  /// The run's initial input as given to `start`.
  pub fn input(&self) -> &'a Value {
    self.ctx.input()
  }

  pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, StepFailure> {
    serde_json::from_value(self.ctx.input().clone())
      .map_err(|e| StepFailure::parse(format!("run input does not match the expected shape: {}", e)))
  }

  /// Typed read of an upstream step's output.
  pub fn output<T: DeserializeOwned>(&self, step_id: &str) -> Result<T, StepFailure> {
    let raw = self.ctx.output(step_id).ok_or_else(|| {
      StepFailure::new(
        FailureKind::MissingOutput,
        format!("step '{}' needs the output of '{}', which has not run", self.step_id, step_id),
      )
    })?;
    serde_json::from_value(raw.clone())
      .map_err(|e| StepFailure::parse(format!("output of '{}' has an unexpected shape: {}", step_id, e)))
  }

  pub fn resume_input(&self) -> Option<&'a Value> {
    self.resume_input
  }

  /// `None` on a first invocation; otherwise the resume input decoded as `T`.
  pub fn resume_input_as<T: DeserializeOwned>(&self) -> Option<Result<T, StepFailure>> {
    self.resume_input.map(|raw| {
      serde_json::from_value(raw.clone())
        .map_err(|e| StepFailure::parse(format!("resume input for '{}' is malformed: {}", self.step_id, e)))
    })
  }

  pub fn is_reentry(&self) -> bool {
    self.resume_input.is_some()
  }

  /// On re-entry, the request this step issued when it suspended. `resume` clears it
  /// from the context, so this is the only place the step can read it back.
  pub fn answered_request(&self) -> Option<&'a InputRequest> {
    self.answered
  }
}

/// Adapts a synchronous closure into a `Step`. See [`step_fn`].
pub struct FnStep<F>(F);

/// Lifts `Fn(&StepView) -> StepResult` into a `Step`, for steps that do no I/O.
pub fn step_fn<F>(f: F) -> FnStep<F>
where
  F: for<'v> Fn(&StepView<'v>) -> StepResult + Send + Sync + 'static,
{
  FnStep(f)
}

#[async_trait]
impl<F> Step for FnStep<F>
where
  F: for<'v> Fn(&StepView<'v>) -> StepResult + Send + Sync + 'static,
{
  async fn run(&self, view: StepView<'_>) -> StepResult {
    (self.0)(&view)
  }
}

/// Where to go after a step completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
  /// Jump to the named step.
  Step(String),
  /// Follow the registered order.
  Default,
  /// End the run successfully.
  Done,
}

impl Next {
  pub fn step(id: impl Into<String>) -> Self {
    Next::Step(id.into())
  }
}

/// Per-step routing logic, evaluated against the context after the step's output is written.
pub type Selector = Arc<dyn Fn(&ExecutionContext) -> Next + Send + Sync + 'static>;

/// Binding of a step identifier to its implementation. Read-only once registered.
#[derive(Clone)]
pub struct StepDef {
  pub id: String,
  pub step: Arc<dyn Step>,
  pub selector: Option<Selector>,
  /// Targets the selector may return, checked by `Pipeline::validate`.
  pub declared_targets: Vec<String>,
}

impl std::fmt::Debug for StepDef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("id", &self.id)
      .field("selector_present", &self.selector.is_some())
      .field("declared_targets", &self.declared_targets)
      .finish()
  }
}
