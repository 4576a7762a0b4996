// flowgate/src/pipeline/definition.rs

//! Contains the `Pipeline` registry: the ordered set of steps, their selectors, and
//! the lookups the driver loop uses to resolve the cursor.

use crate::core::context::{Cursor, ExecutionContext};
use crate::core::step::{Next, Selector, Step, StepDef};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::routing::RouteBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

/// Ordered registry of steps.
///
/// Registration order is the default path through the pipeline; a step's selector
/// may override it once the step has completed. The registry is built up front and
/// checked with [`Pipeline::validate`] before any run starts.
#[derive(Default, Clone)]
pub struct Pipeline {
  /// Steps in declared order.
  pub(crate) steps: Vec<StepDef>,
  /// step id -> position in `steps`
  index: HashMap<String, usize>,
}

impl Pipeline {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a step to the end of the declared order.
  pub fn register<S: Step + 'static>(&mut self, step_id: impl Into<String>, step: S) -> FlowResult<()> {
    self.register_arc(step_id, Arc::new(step))
  }

  pub fn register_arc(&mut self, step_id: impl Into<String>, step: Arc<dyn Step>) -> FlowResult<()> {
    self.insert(step_id.into(), step, None, Vec::new())
  }

  /// Appends a step whose successor is chosen by `selector`.
  ///
  /// A free-form selector declares no targets, so `validate` cannot check where it
  /// points; an unknown target surfaces at runtime as an `UnknownStep` failure.
  /// Prefer [`Pipeline::routes_for_step`] when the targets are known up front.
  pub fn register_with_selector<S: Step + 'static>(
    &mut self,
    step_id: impl Into<String>,
    step: S,
    selector: impl Fn(&ExecutionContext) -> Next + Send + Sync + 'static,
  ) -> FlowResult<()> {
    let selector: Selector = Arc::new(selector);
    self.insert(step_id.into(), Arc::new(step), Some(selector), Vec::new())
  }

  fn insert(
    &mut self,
    step_id: String,
    step: Arc<dyn Step>,
    selector: Option<Selector>,
    declared_targets: Vec<String>,
  ) -> FlowResult<()> {
    if self.index.contains_key(&step_id) {
      event!(Level::ERROR, %step_id, "Duplicate step registration rejected.");
      return Err(FlowError::DuplicateStep { step_id });
    }
    event!(Level::DEBUG, %step_id, position = self.steps.len(), "Registering step.");
    self.index.insert(step_id.clone(), self.steps.len());
    self.steps.push(StepDef {
      id: step_id,
      step,
      selector,
      declared_targets,
    });
    Ok(())
  }

  /// Starts a fluent route declaration for an already registered step.
  pub fn routes_for_step(&mut self, step_id: &str) -> FlowResult<RouteBuilder<'_>> {
    if !self.index.contains_key(step_id) {
      return Err(FlowError::UnknownStep {
        step_id: step_id.to_string(),
      });
    }
    Ok(RouteBuilder::new(self, step_id.to_string()))
  }

  pub(crate) fn set_selector(&mut self, step_id: &str, selector: Selector, declared_targets: Vec<String>) -> FlowResult<()> {
    let idx = *self.index.get(step_id).ok_or_else(|| FlowError::UnknownStep {
      step_id: step_id.to_string(),
    })?;
    let def = &mut self.steps[idx];
    def.selector = Some(selector);
    def.declared_targets = declared_targets;
    Ok(())
  }

  pub fn get(&self, step_id: &str) -> FlowResult<&StepDef> {
    self
      .index
      .get(step_id)
      .map(|&idx| &self.steps[idx])
      .ok_or_else(|| FlowError::UnknownStep {
        step_id: step_id.to_string(),
      })
  }

  /// The step registered after `step_id`, or `Cursor::Done` if it is the last one.
  pub fn next_after(&self, step_id: &str) -> FlowResult<Cursor> {
    let idx = *self.index.get(step_id).ok_or_else(|| FlowError::UnknownStep {
      step_id: step_id.to_string(),
    })?;
    Ok(match self.steps.get(idx + 1) {
      Some(def) => Cursor::Step(def.id.clone()),
      None => Cursor::Done,
    })
  }

  pub fn first(&self) -> Option<&str> {
    self.steps.first().map(|def| def.id.as_str())
  }

  pub fn contains(&self, step_id: &str) -> bool {
    self.index.contains_key(step_id)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn step_ids(&self) -> impl Iterator<Item = &str> {
    self.steps.iter().map(|def| def.id.as_str())
  }

  /// Fails fast on a pipeline that could only break mid-run: no steps at all, or a
  /// declared route pointing at an unregistered step.
  pub fn validate(&self) -> FlowResult<()> {
    if self.steps.is_empty() {
      return Err(FlowError::EmptyPipeline);
    }
    for def in &self.steps {
      if let Some(target) = def.declared_targets.iter().find(|t| !self.index.contains_key(t.as_str())) {
        return Err(FlowError::DanglingRoute {
          step_id: def.id.clone(),
          target: target.clone(),
        });
      }
    }
    Ok(())
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline").field("steps", &self.steps).finish()
  }
}
