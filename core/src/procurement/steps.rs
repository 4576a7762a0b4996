// flowgate/src/procurement/steps.rs

//! The six procurement steps. Each reads upstream outputs through its `StepView`,
//! calls at most one collaborator, and returns a `StepResult`; routing between them
//! is declared in `build_pipeline`.

use crate::config::SupplierSelection;
use crate::core::control::{FailureKind, StepFailure, StepResult, SuspendKind, Suspension};
use crate::core::step::{Step, StepView};
use crate::procurement::collaborators::{ApprovalDrafter, CompliancePolicy, RequestExtractor, SupplierDirectory};
use crate::procurement::models::{
  ApprovalDecision, ApprovalOutcome, ApprovalRequest, ComplianceReport, OrderConfirmation, PurchaseRequest,
  ReminderPlan, Supplier, SupplierChoice, ORDER_PLACED,
};
use crate::procurement::{APPROVAL, COMPLIANCE, EMAIL, SUPPLIER};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{event, Level};

pub const REJECTION_MESSAGE: &str = "Manager did not approve the request";

/// Extracts a `PurchaseRequest` from the run input (an email).
pub struct EmailStep {
  extractor: Arc<dyn RequestExtractor>,
}

impl EmailStep {
  pub fn new(extractor: Arc<dyn RequestExtractor>) -> Self {
    Self { extractor }
  }

  async fn try_run(&self, view: StepView<'_>) -> Result<StepResult, StepFailure> {
    let body = email_body(view.input())?;
    let raw = self.extractor.extract(body).await?;
    let request = PurchaseRequest::from_model_json(&raw)?;
    event!(Level::INFO, item = %request.item, quantity = request.quantity, budget = request.budget, "Purchase request extracted.");
    Ok(StepResult::completed(&request))
  }
}

#[async_trait]
impl Step for EmailStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.try_run(view).await.into()
  }
}

fn email_body(input: &Value) -> Result<&str, StepFailure> {
  match input {
    Value::String(text) => Ok(text),
    Value::Object(map) => map
      .get("body")
      .and_then(Value::as_str)
      .ok_or_else(|| StepFailure::parse("run input has no 'body' text")),
    _ => Err(StepFailure::parse("run input must be the email text or an object with a 'body' field")),
  }
}

/// Fetches quotes and picks one, automatically or by asking the caller.
pub struct SupplierStep {
  directory: Arc<dyn SupplierDirectory>,
  selection: SupplierSelection,
}

impl SupplierStep {
  pub fn new(directory: Arc<dyn SupplierDirectory>, selection: SupplierSelection) -> Self {
    Self { directory, selection }
  }

  async fn try_run(&self, view: StepView<'_>) -> Result<StepResult, StepFailure> {
    let request: PurchaseRequest = view.output(EMAIL)?;
    let quotes = self.directory.quotes(&request).await?;
    if quotes.is_empty() {
      return Err(StepFailure::output(format!("no supplier quoted for '{}'", request.item)));
    }
    let candidates = quotes
      .into_iter()
      .map(Supplier::from_quote)
      .collect::<Result<Vec<_>, _>>()?;

    let selected = match self.selection {
      SupplierSelection::Cheapest => {
        cheapest(&candidates).ok_or_else(|| StepFailure::output("no usable supplier quote"))?
      }
      SupplierSelection::Manual => match pick_by_name(&view, &candidates) {
        Some(supplier) => supplier,
        None => return Ok(StepResult::Suspend(ask_for_supplier(&candidates, view.is_reentry()))),
      },
    };
    event!(Level::INFO, supplier = %selected.name, price_per_unit = selected.price_per_unit, "Supplier selected.");
    Ok(StepResult::completed(&SupplierChoice { candidates, selected }))
  }
}

#[async_trait]
impl Step for SupplierStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.try_run(view).await.into()
  }
}

// Ties keep the directory's order.
fn cheapest(candidates: &[Supplier]) -> Option<Supplier> {
  candidates
    .iter()
    .reduce(|best, c| if c.price_per_unit < best.price_per_unit { c } else { best })
    .cloned()
}

/// Accepts `{"selected_supplier": "Name"}` or `{"selected_supplier": {"name": "Name"}}`.
fn pick_by_name(view: &StepView<'_>, candidates: &[Supplier]) -> Option<Supplier> {
  let chosen = view.resume_input()?.get("selected_supplier")?;
  let name = match chosen {
    Value::String(name) => name.as_str(),
    Value::Object(map) => map.get("name")?.as_str()?,
    _ => return None,
  };
  candidates.iter().find(|s| s.name.eq_ignore_ascii_case(name.trim())).cloned()
}

fn ask_for_supplier(candidates: &[Supplier], retry: bool) -> Suspension {
  let names: Vec<&str> = candidates.iter().map(|s| s.name.as_str()).collect();
  let reason = if retry {
    format!("Unknown supplier; choose one of: {}", names.join(", "))
  } else {
    "Choose a supplier for this request".to_string()
  };
  Suspension::new(SuspendKind::AwaitingInput, reason, &["selected_supplier"])
    .with_details(json!({ "candidates": candidates }))
}

pub struct ComplianceStep {
  policy: Arc<dyn CompliancePolicy>,
}

impl ComplianceStep {
  pub fn new(policy: Arc<dyn CompliancePolicy>) -> Self {
    Self { policy }
  }

  fn try_run(&self, view: &StepView<'_>) -> Result<StepResult, StepFailure> {
    let request: PurchaseRequest = view.output(EMAIL)?;
    let choice: SupplierChoice = view.output(SUPPLIER)?;
    let report = self.policy.evaluate(&request, &choice.selected);
    event!(
      Level::INFO,
      compliant = report.compliant,
      total_cost = report.total_cost,
      budget = report.budget,
      "Compliance evaluated."
    );
    Ok(StepResult::completed(&report))
  }
}

#[async_trait]
impl Step for ComplianceStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.try_run(&view).into()
  }
}

/// Asks the manager for a decision on a non-compliant request.
pub struct ApprovalStep {
  drafter: Arc<dyn ApprovalDrafter>,
  manager_email: String,
  reminder_interval_minutes: u32,
}

impl ApprovalStep {
  pub fn new(drafter: Arc<dyn ApprovalDrafter>, manager_email: impl Into<String>, reminder_interval_minutes: u32) -> Self {
    Self {
      drafter,
      manager_email: manager_email.into(),
      reminder_interval_minutes,
    }
  }

  async fn draft_request(&self, view: &StepView<'_>) -> Result<ApprovalRequest, StepFailure> {
    let request: PurchaseRequest = view.output(EMAIL)?;
    let choice: SupplierChoice = view.output(SUPPLIER)?;
    let report: ComplianceReport = view.output(COMPLIANCE)?;
    let draft = self.drafter.draft(&request, &choice.selected, &report).await?;

    let manager_email = draft.manager_email.unwrap_or_else(|| self.manager_email.clone());
    let reminder = ReminderPlan {
      to: manager_email.clone(),
      subject: format!("REMINDER: {}", draft.subject),
      interval_minutes: self.reminder_interval_minutes,
    };
    Ok(ApprovalRequest {
      subject: draft.subject,
      body: draft.body,
      manager_email,
      reason: report.reason.unwrap_or_else(|| "Approval required".to_string()),
      reminder,
    })
  }

  // The draft travels with the suspension, so a resume reuses the exact email the
  // manager saw. It is only re-drafted if the request is gone (e.g. an older snapshot).
  async fn recover_request(&self, view: &StepView<'_>) -> Result<ApprovalRequest, StepFailure> {
    let carried = view
      .answered_request()
      .filter(|req| req.step_id == APPROVAL)
      .and_then(|req| serde_json::from_value::<ApprovalRequest>(req.details.clone()).ok());
    match carried {
      Some(request) => Ok(request),
      None => self.draft_request(view).await,
    }
  }

  fn suspend_with(request: &ApprovalRequest, reason: String) -> Result<StepResult, StepFailure> {
    let details = serde_json::to_value(request)
      .map_err(|e| StepFailure::output(format!("approval request is not serializable: {}", e)))?;
    Ok(StepResult::Suspend(
      Suspension::new(SuspendKind::AwaitingApproval, reason, &["manager_approved"]).with_details(details),
    ))
  }

  async fn try_run(&self, view: StepView<'_>) -> Result<StepResult, StepFailure> {
    let decision = match view.resume_input_as::<ApprovalDecision>() {
      None => {
        let request = self.draft_request(&view).await?;
        event!(Level::INFO, to = %request.manager_email, subject = %request.subject, "Approval requested.");
        let reason = format!("Manager approval required: {}", request.reason);
        return Self::suspend_with(&request, reason);
      }
      Some(Err(failure)) => {
        let request = self.recover_request(&view).await?;
        event!(Level::WARN, error = %failure, "Unusable approval decision; still waiting.");
        return Self::suspend_with(&request, format!("Expected {{\"manager_approved\": true|false}} ({})", failure.message));
      }
      Some(Ok(decision)) => decision,
    };

    let request = self.recover_request(&view).await?;
    event!(Level::INFO, manager_approved = decision.manager_approved, "Approval decision received.");
    Ok(StepResult::completed(&ApprovalOutcome {
      manager_approved: decision.manager_approved,
      note: decision.note,
      request,
    }))
  }
}

#[async_trait]
impl Step for ApprovalStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.try_run(view).await.into()
  }
}

/// Places the order with the selected supplier.
#[derive(Debug, Default)]
pub struct OrderStep;

impl OrderStep {
  fn try_run(view: &StepView<'_>) -> Result<StepResult, StepFailure> {
    let request: PurchaseRequest = view.output(EMAIL)?;
    let choice: SupplierChoice = view.output(SUPPLIER)?;
    let order_id = format!("ORD-{}", &view.run_id().simple().to_string()[..8]).to_uppercase();
    let confirmation = OrderConfirmation {
      order_id,
      supplier: choice.selected.name.clone(),
      item: request.item.clone(),
      quantity: request.quantity,
      total_price: choice.selected.total_for(request.quantity),
      status: ORDER_PLACED.to_string(),
    };
    event!(Level::INFO, order_id = %confirmation.order_id, total_price = confirmation.total_price, "Order placed.");
    Ok(StepResult::completed(&confirmation))
  }
}

#[async_trait]
impl Step for OrderStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    Self::try_run(&view).into()
  }
}

/// Terminal step for a declined approval.
#[derive(Debug, Default)]
pub struct RejectionStep;

#[async_trait]
impl Step for RejectionStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    let note = view
      .output::<ApprovalOutcome>(APPROVAL)
      .ok()
      .and_then(|outcome| outcome.note);
    event!(Level::WARN, ?note, "Purchase request rejected by manager.");
    let message = match note {
      Some(note) => format!("{} ({})", REJECTION_MESSAGE, note),
      None => REJECTION_MESSAGE.to_string(),
    };
    StepResult::failed(FailureKind::Rejected, message)
  }
}
