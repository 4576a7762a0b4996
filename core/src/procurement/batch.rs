// flowgate/src/procurement/batch.rs

//! Runs a batch of emails through a procurement orchestrator and tallies the
//! outcomes. Approval suspensions are answered by a caller-supplied decision
//! function standing in for the manager.

use crate::core::control::{FailureKind, SuspendKind};
use crate::core::status::WorkflowStatus;
use crate::orchestrator::Orchestrator;
use crate::procurement::models::{ApprovalRequest, OrderConfirmation};
use crate::procurement::ORDER;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// An approval step re-suspends on unusable input; stop answering after this many rounds.
const MAX_APPROVAL_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
  Success,
  RejectedByManager,
  Error,
  /// Still suspended (e.g. waiting for a manual supplier choice).
  Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
  pub email_id: String,
  /// `None` when the run could not even start.
  pub run_id: Option<Uuid>,
  pub status: BatchStatus,
  pub reason: Option<String>,
  pub order: Option<OrderConfirmation>,
  /// The approval email sent for this request, if one was needed.
  pub approval_email: Option<ApprovalRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTally {
  pub success: usize,
  pub rejected: usize,
  pub approval_required: usize,
  pub errors: usize,
  pub pending: usize,
  pub total: usize,
}

impl BatchTally {
  pub fn tally(results: &[EvaluationResult]) -> Self {
    results.iter().fold(Self::default(), |mut t, r| {
      match r.status {
        BatchStatus::Success => t.success += 1,
        BatchStatus::RejectedByManager => t.rejected += 1,
        BatchStatus::Error => t.errors += 1,
        BatchStatus::Pending => t.pending += 1,
      }
      if r.approval_email.is_some() {
        t.approval_required += 1;
      }
      t.total += 1;
      t
    })
  }
}

/// Evaluates each email in order. Emails are numbered `email_1`, `email_2`, ...
#[instrument(name = "procurement::evaluate_batch", skip_all, fields(num_emails = emails.len()))]
pub async fn evaluate_batch<D>(orchestrator: &Orchestrator, emails: &[String], decide: D) -> Vec<EvaluationResult>
where
  D: Fn(&ApprovalRequest) -> bool,
{
  let mut results = Vec::with_capacity(emails.len());
  for (i, email) in emails.iter().enumerate() {
    let email_id = format!("email_{}", i + 1);
    let result = evaluate_one(orchestrator, email_id, email, &decide).await;
    event!(Level::INFO, email_id = %result.email_id, status = ?result.status, "Email evaluated.");
    results.push(result);
  }
  results
}

async fn evaluate_one<D>(orchestrator: &Orchestrator, email_id: String, email: &str, decide: &D) -> EvaluationResult
where
  D: Fn(&ApprovalRequest) -> bool,
{
  let mut result = EvaluationResult {
    email_id,
    run_id: None,
    status: BatchStatus::Error,
    reason: None,
    order: None,
    approval_email: None,
  };

  let mut ctx = match orchestrator.start(json!({ "body": email })).await {
    Ok(ctx) => ctx,
    Err(e) => {
      result.reason = Some(e.to_string());
      return result;
    }
  };
  result.run_id = Some(ctx.run_id());

  let mut rounds = 0;
  while ctx.status() == WorkflowStatus::RequiresApproval && rounds < MAX_APPROVAL_ROUNDS {
    rounds += 1;
    let request = ctx
      .pending_input_request()
      .filter(|req| req.kind == SuspendKind::AwaitingApproval)
      .and_then(|req| serde_json::from_value::<ApprovalRequest>(req.details.clone()).ok());
    let approved = match &request {
      Some(request) => decide(request),
      None => false,
    };
    if result.approval_email.is_none() {
      result.approval_email = request;
    }
    if let Err(e) = orchestrator.resume(&mut ctx, json!({ "manager_approved": approved })).await {
      result.reason = Some(e.to_string());
      return result;
    }
  }

  match ctx.status() {
    WorkflowStatus::Success => {
      result.status = BatchStatus::Success;
      result.order = ctx
        .output(ORDER)
        .and_then(|v| serde_json::from_value::<OrderConfirmation>(v.clone()).ok());
    }
    WorkflowStatus::Failed => {
      let error = ctx.error();
      result.status = match error.map(|e| e.kind) {
        Some(FailureKind::Rejected) => BatchStatus::RejectedByManager,
        _ => BatchStatus::Error,
      };
      result.reason = error.map(|e| e.message.clone());
    }
    WorkflowStatus::Pending | WorkflowStatus::RequiresApproval | WorkflowStatus::InProgress => {
      result.status = BatchStatus::Pending;
      result.reason = ctx.pending_input_request().map(|req| req.reason.clone());
    }
  }
  result
}
