// flowgate/examples/procurement_walkthrough.rs

//! Runs one over-budget purchase request through the procurement pipeline, parks it
//! for approval, stores the suspended context as JSON, and resumes it later.
//!
//! `RUST_LOG=flowgate=debug cargo run --example procurement_walkthrough`

use flowgate::procurement::collaborators::{StaticDirectory, StaticExtractor};
use flowgate::procurement::models::{ApprovalRequest, OrderConfirmation, SupplierQuote};
use flowgate::procurement::{procurement_orchestrator, Collaborators, ORDER};
use flowgate::{ExecutionContext, FlowError, OrchestratorConfig, ProcurementSettings, WorkflowStatus};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EMAIL: &str = "Hello, please buy 100 monitors for the support floor. We can spend 5000 TL.";

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
  info!("--- Procurement Walkthrough ---");

  let settings = ProcurementSettings::from_env()?;
  let config = OrchestratorConfig::from_env()?;

  // 1. Collaborators. A real deployment would put a model client and a supplier API here.
  let collaborators = Collaborators::new(
    Arc::new(StaticExtractor::new(
      r#"{"item": "monitor", "quantity": 100, "budget": 5000}"#,
    )),
    Arc::new(StaticDirectory::new(vec![
      SupplierQuote::new("ScreenCo", 120.0, true),
      SupplierQuote::new("DisplayHub", 150.0, true),
    ])),
  );
  let orchestrator = procurement_orchestrator(&collaborators, &settings, config)?;
  info!(steps = ?orchestrator.step_ids(), "Pipeline ready.");

  // 2. First call: runs until the approval step parks the run.
  let ctx = orchestrator.start(json!({ "body": EMAIL })).await?;
  info!(status = %ctx.status(), "Start returned.");

  if let Some(request) = ctx.pending_input_request() {
    if let Ok(email) = serde_json::from_value::<ApprovalRequest>(request.details.clone()) {
      info!(to = %email.manager_email, subject = %email.subject, "Approval email drafted:\n{}", email.body);
      info!(
        every_minutes = email.reminder.interval_minutes,
        subject = %email.reminder.subject,
        "Reminder scheduled."
      );
    }
  }

  // 3. Persist the suspended run; nothing is kept in the orchestrator.
  let stored = ctx.to_json()?;
  info!(bytes = stored.len(), "Suspended context stored.");
  drop(ctx);

  // 4. Later: the manager answers.
  let mut ctx = ExecutionContext::from_json(&stored)?;
  orchestrator
    .resume(&mut ctx, json!({ "manager_approved": true, "note": "approved for Q3" }))
    .await?;

  match ctx.status() {
    WorkflowStatus::Success => {
      if let Some(order) = ctx
        .output(ORDER)
        .and_then(|v| serde_json::from_value::<OrderConfirmation>(v.clone()).ok())
      {
        info!(order_id = %order.order_id, supplier = %order.supplier, total = order.total_price, "Order placed.");
      }
    }
    other => warn!(status = %other, error = ?ctx.error(), "Run did not complete."),
  }

  let summary = orchestrator.get_execution_summary(&ctx);
  info!(
    steps_executed = summary.steps_executed,
    total_step_duration_ms = summary.total_step_duration_ms,
    "Run summary."
  );
  for entry in &summary.history {
    info!("{} [{}] {}", entry.at.format("%H:%M:%S%.3f"), entry.actor, entry.message);
  }

  // 5. A finished run cannot be resumed again.
  if let Err(e) = orchestrator.resume(&mut ctx, json!({ "manager_approved": false })).await {
    info!(error = %e, "Second resume refused as expected.");
  }
  Ok(())
}
