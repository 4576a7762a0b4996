// flowgate/src/pipeline/execution.rs

//! Contains the driver loop shared by `Orchestrator::start` and `Orchestrator::resume`.

use crate::config::OrchestratorConfig;
use crate::core::context::{Cursor, ExecutionContext, HistoryEvent};
use crate::core::control::{FailureKind, InputRequest, StepFailure, StepResult};
use crate::core::status::WorkflowStatus;
use crate::core::step::{Next, StepView};
use crate::error::FlowResult;
use crate::pipeline::definition::Pipeline;
use serde_json::Value;
use std::time::Instant;
use tracing::{event, instrument, span, Instrument, Level};

impl Pipeline {
  /// Runs steps from the context's cursor until the run completes, suspends or fails.
  ///
  /// The context must be `IN_PROGRESS`. `resume_input` (and `answered`, the input
  /// request it responds to) go to the first step invoked and to no other.
  ///
  /// Step failures are not errors here: they end the run in `FAILED` and are recorded
  /// on the context. `Err` is reserved for broken context invariants.
  #[instrument(
        name = "Pipeline::drive",
        skip_all,
        fields(
            run_id = %ctx.run_id(),
            num_steps = self.steps.len(),
            reentry = resume_input.is_some(),
        ),
        err(Display)
    )]
  pub(crate) async fn drive(
    &self,
    ctx: &mut ExecutionContext,
    resume_input: Option<Value>,
    answered: Option<InputRequest>,
    config: &OrchestratorConfig,
  ) -> FlowResult<()> {
    let actor = config.actor.as_str();
    let mut resume_input = resume_input;
    let mut answered = answered;
    let mut invocations = 0usize;

    loop {
      let step_id = match ctx.cursor() {
        Cursor::Step(id) => id.clone(),
        Cursor::Done => {
          ctx.set_status(WorkflowStatus::Success)?;
          ctx.push_history(
            HistoryEvent::Finished,
            actor.to_string(),
            None,
            "Workflow completed successfully".to_string(),
            None,
          );
          event!(Level::INFO, invocations, "Workflow completed.");
          return Ok(());
        }
      };

      if invocations >= config.max_steps_per_call {
        let failure = StepFailure::new(
          FailureKind::StepLimitExceeded,
          format!(
            "stopped before '{}': {} step invocations in one call (limit {})",
            step_id, invocations, config.max_steps_per_call
          ),
        );
        return fail_run(ctx, actor, Some(&step_id), failure, None);
      }

      let def = match self.get(&step_id) {
        Ok(def) => def,
        Err(e) => {
          let failure = StepFailure::new(FailureKind::UnknownStep, e.to_string());
          return fail_run(ctx, actor, Some(&step_id), failure, None);
        }
      };
      invocations += 1;

      let step_span = span!(Level::INFO, "workflow_step", step_id = %step_id, invocation = invocations);
      let input = resume_input.take();
      let request = answered.take();
      let started = Instant::now();
      let result = def
        .step
        .run(StepView::new(&step_id, ctx, input.as_ref()).answering(request.as_ref()))
        .instrument(step_span)
        .await;
      let elapsed_ms = started.elapsed().as_millis() as u64;

      match result {
        StepResult::Completed(output) => {
          if let Err(e) = ctx.write_output(step_id.clone(), output) {
            event!(Level::ERROR, %step_id, error = %e, "Step output rejected.");
            let failure = StepFailure::new(FailureKind::DuplicateOutput, e.to_string());
            return fail_run(ctx, actor, Some(&step_id), failure, Some(elapsed_ms));
          }
          ctx.set_pending_input_request(None);
          ctx.push_history(
            HistoryEvent::StepCompleted,
            actor.to_string(),
            Some(step_id.clone()),
            format!("Step '{}' completed", step_id),
            Some(elapsed_ms),
          );
          event!(Level::DEBUG, %step_id, elapsed_ms, "Step completed.");

          let next = match &def.selector {
            Some(selector) => selector(ctx),
            None => Next::Default,
          };
          let cursor = match next {
            Next::Default => self.next_after(&step_id)?,
            Next::Done => {
              ctx.push_routed(
                actor.to_string(),
                step_id.clone(),
                None,
                format!("Step '{}' routed to end of workflow", step_id),
              );
              Cursor::Done
            }
            Next::Step(target) => {
              if !self.contains(&target) {
                let failure = StepFailure::new(
                  FailureKind::UnknownStep,
                  format!("step '{}' routed to unregistered step '{}'", step_id, target),
                );
                return fail_run(ctx, actor, Some(&step_id), failure, None);
              }
              ctx.push_routed(
                actor.to_string(),
                step_id.clone(),
                Some(target.clone()),
                format!("Step '{}' routed to '{}'", step_id, target),
              );
              Cursor::Step(target)
            }
          };
          ctx.set_cursor(cursor);
        }
        StepResult::Suspend(suspension) => {
          let status = suspension.kind.status();
          ctx.set_status(status)?;
          ctx.push_history(
            HistoryEvent::StepSuspended,
            actor.to_string(),
            Some(step_id.clone()),
            format!("Step '{}' suspended: {}", step_id, suspension.reason),
            Some(elapsed_ms),
          );
          event!(Level::INFO, %step_id, %status, reason = %suspension.reason, "Workflow suspended.");
          ctx.set_pending_input_request(Some(InputRequest::from_suspension(&step_id, suspension)));
          return Ok(());
        }
        StepResult::Failed(failure) => {
          return fail_run(ctx, actor, Some(&step_id), failure, Some(elapsed_ms));
        }
      }
    }
  }
}

fn fail_run(
  ctx: &mut ExecutionContext,
  actor: &str,
  step_id: Option<&str>,
  failure: StepFailure,
  elapsed_ms: Option<u64>,
) -> FlowResult<()> {
  event!(Level::ERROR, step_id = ?step_id, kind = %failure.kind, message = %failure.message, "Workflow failed.");
  ctx.set_error(step_id, &failure);
  ctx.set_pending_input_request(None);
  ctx.push_history(
    HistoryEvent::StepFailed,
    actor.to_string(),
    step_id.map(str::to_string),
    failure.to_string(),
    elapsed_ms,
  );
  ctx.set_status(WorkflowStatus::Failed)
}
