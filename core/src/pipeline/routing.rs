// flowgate/src/pipeline/routing.rs

//! Fluent route declarations (`RouteBuilder`) turning a step's output into the
//! next cursor position. This is how the pipeline branches: a step decides nothing
//! about control flow itself, its selector reads the output it produced and picks
//! the successor.

use crate::core::context::ExecutionContext;
use crate::core::step::{Next, Selector};
use crate::error::FlowResult;
use crate::pipeline::definition::Pipeline;
use std::sync::Arc;
use tracing::{event, instrument, Level};

type Condition = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync + 'static>;

struct RouteArm {
  condition: Condition,
  target: Next,
}

/// Builder for the routes leaving one step. Arms are checked in declaration order;
/// the first matching condition wins, otherwise the `otherwise` target applies.
///
/// ```ignore
/// pipeline
///   .routes_for_step("compliance")?
///   .when(output_flag("compliance", "compliant"), "order")
///   .otherwise("approval")?;
/// ```
pub struct RouteBuilder<'pipeline> {
  pipeline: &'pipeline mut Pipeline,
  step_id: String,
  arms: Vec<RouteArm>,
}

impl<'pipeline> RouteBuilder<'pipeline> {
  pub(crate) fn new(pipeline: &'pipeline mut Pipeline, step_id: String) -> Self {
    Self {
      pipeline,
      step_id,
      arms: Vec::new(),
    }
  }

  /// Route to `target` when `condition` holds.
  pub fn when(
    self,
    condition: impl Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    target: impl Into<String>,
  ) -> Self {
    self.when_next(condition, Next::Step(target.into()))
  }

  /// Like [`RouteBuilder::when`] but with any `Next`, e.g. `Next::Done` to end the run.
  pub fn when_next(mut self, condition: impl Fn(&ExecutionContext) -> bool + Send + Sync + 'static, target: Next) -> Self {
    self.arms.push(RouteArm {
      condition: Arc::new(condition),
      target,
    });
    self
  }

  /// Finishes the declaration with a fallback step.
  pub fn otherwise(self, target: impl Into<String>) -> FlowResult<()> {
    self.otherwise_next(Next::Step(target.into()))
  }

  /// Finishes the declaration with an arbitrary fallback (`Next::Default` keeps the
  /// registered order, `Next::Done` ends the run).
  #[instrument(
        name = "RouteBuilder::otherwise_next",
        skip_all,
        fields(step_id = %self.step_id, num_arms = self.arms.len())
    )]
  pub fn otherwise_next(self, fallback: Next) -> FlowResult<()> {
    let mut declared_targets: Vec<String> = self
      .arms
      .iter()
      .filter_map(|arm| match &arm.target {
        Next::Step(id) => Some(id.clone()),
        _ => None,
      })
      .collect();
    if let Next::Step(id) = &fallback {
      declared_targets.push(id.clone());
    }

    let arms = self.arms;
    let selector: Selector = Arc::new(move |ctx: &ExecutionContext| {
      arms
        .iter()
        .find(|arm| (arm.condition)(ctx))
        .map(|arm| arm.target.clone())
        .unwrap_or_else(|| fallback.clone())
    });

    self.pipeline.set_selector(&self.step_id, selector, declared_targets)?;
    event!(Level::DEBUG, step_id = %self.step_id, "Routes finalized and selector installed.");
    Ok(())
  }
}

/// Condition that holds when `field` of `step_id`'s output is the JSON value `true`.
///
/// A missing output or field counts as `false`, so an unfavorable branch is the
/// safe default.
pub fn output_flag(step_id: &str, field: &str) -> impl Fn(&ExecutionContext) -> bool + Send + Sync + 'static {
  let step_id = step_id.to_string();
  let field = field.to_string();
  move |ctx: &ExecutionContext| {
    ctx
      .output(&step_id)
      .and_then(|out| out.get(&field))
      .and_then(|v| v.as_bool())
      .unwrap_or(false)
  }
}
