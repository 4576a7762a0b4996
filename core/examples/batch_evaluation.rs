// flowgate/examples/batch_evaluation.rs

//! Evaluates a handful of purchase-request emails and prints the outcome of each,
//! with a stand-in manager who accepts budget overruns but never a non-compliant
//! supplier.

use flowgate::procurement::collaborators::{FnDirectory, FnExtractor};
use flowgate::procurement::models::{PurchaseRequest, SupplierQuote};
use flowgate::procurement::{evaluate_batch, procurement_orchestrator, BatchTally, Collaborators};
use flowgate::{FlowError, OrchestratorConfig, ProcurementSettings};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Batch Evaluation ---");

  // Keyword matching in place of a language model.
  let extractor = FnExtractor::new(|text: &str| {
    let json = if text.contains("laptop") {
      r#"{"item": "laptop", "quantity": 5, "budget": 50000}"#
    } else if text.contains("monitor") {
      r#"{"item": "monitor", "quantity": "100", "budget": 5000}"#
    } else if text.contains("server") {
      r#"{"item": "server", "quantity": 3, "budget": 20000}"#
    } else {
      "I found no purchase request."
    };
    Ok(json.to_string())
  });
  let directory = FnDirectory::new(|request: &PurchaseRequest| {
    Ok(match request.item.as_str() {
      "laptop" => vec![SupplierQuote::new("TechSupply", 8000.0, true)],
      "monitor" => vec![SupplierQuote::new("ScreenCo", 120.0, true)],
      "server" => vec![SupplierQuote::new("RackMasters", 9000.0, false)],
      _ => Vec::new(),
    })
  });

  let orchestrator = procurement_orchestrator(
    &Collaborators::new(Arc::new(extractor), Arc::new(directory)),
    &ProcurementSettings::default(),
    OrchestratorConfig::default(),
  )?;

  let emails: Vec<String> = [
    "We need 5 laptops for onboarding, budget 50000.",
    "100 monitors please, 5000 budget.",
    "Three rack servers, up to 20000.",
    "Reminder: team lunch on Friday.",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect();

  let results = evaluate_batch(&orchestrator, &emails, |request| !request.reason.contains("not compliant")).await;

  for result in &results {
    info!(
      email = %result.email_id,
      status = ?result.status,
      reason = ?result.reason,
      order = ?result.order.as_ref().map(|o| o.order_id.as_str()),
      "Result."
    );
  }
  let tally = BatchTally::tally(&results);
  info!(
    success = tally.success,
    rejected = tally.rejected,
    approval_required = tally.approval_required,
    errors = tally.errors,
    total = tally.total,
    "Batch finished."
  );
  Ok(())
}
