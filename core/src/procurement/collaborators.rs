// flowgate/src/procurement/collaborators.rs

//! Seams to the systems the procurement steps call out to: the language model that
//! reads emails, the supplier directory, the approval-email drafter, and the
//! compliance rules. Shipped implementations are deterministic so pipelines can run
//! without any external service.

use crate::procurement::models::{
  ApprovalDraft, ComplianceReport, ComplianceViolation, PurchaseRequest, Supplier, SupplierQuote,
};
use async_trait::async_trait;

/// Turns free email text into the raw JSON for a `PurchaseRequest`.
///
/// Implementations return the model's text untouched; parsing and validation are
/// the email step's job, so malformed output becomes a `ParseError` failure there.
#[async_trait]
pub trait RequestExtractor: Send + Sync {
  async fn extract(&self, email_text: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
  async fn quotes(&self, request: &PurchaseRequest) -> anyhow::Result<Vec<SupplierQuote>>;
}

#[async_trait]
pub trait ApprovalDrafter: Send + Sync {
  async fn draft(
    &self,
    request: &PurchaseRequest,
    supplier: &Supplier,
    report: &ComplianceReport,
  ) -> anyhow::Result<ApprovalDraft>;
}

/// The rule-based budget/compliance predicate.
pub trait CompliancePolicy: Send + Sync {
  fn evaluate(&self, request: &PurchaseRequest, supplier: &Supplier) -> ComplianceReport;
}

// --- Shipped implementations ---

/// Always answers with the same model output.
#[derive(Debug, Clone)]
pub struct StaticExtractor {
  response: String,
}

impl StaticExtractor {
  pub fn new(response: impl Into<String>) -> Self {
    Self {
      response: response.into(),
    }
  }
}

#[async_trait]
impl RequestExtractor for StaticExtractor {
  async fn extract(&self, _email_text: &str) -> anyhow::Result<String> {
    Ok(self.response.clone())
  }
}

/// Extractor backed by a synchronous function of the email text.
pub struct FnExtractor<F>(F);

impl<F> FnExtractor<F>
where
  F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
  pub fn new(f: F) -> Self {
    FnExtractor(f)
  }
}

#[async_trait]
impl<F> RequestExtractor for FnExtractor<F>
where
  F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
  async fn extract(&self, email_text: &str) -> anyhow::Result<String> {
    (self.0)(email_text)
  }
}

/// A fixed list of quotes, whatever the request.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
  quotes: Vec<SupplierQuote>,
}

impl StaticDirectory {
  pub fn new(quotes: Vec<SupplierQuote>) -> Self {
    Self { quotes }
  }
}

#[async_trait]
impl SupplierDirectory for StaticDirectory {
  async fn quotes(&self, _request: &PurchaseRequest) -> anyhow::Result<Vec<SupplierQuote>> {
    Ok(self.quotes.clone())
  }
}

/// Directory backed by a synchronous function of the request.
pub struct FnDirectory<F>(F);

impl<F> FnDirectory<F>
where
  F: Fn(&PurchaseRequest) -> anyhow::Result<Vec<SupplierQuote>> + Send + Sync,
{
  pub fn new(f: F) -> Self {
    FnDirectory(f)
  }
}

#[async_trait]
impl<F> SupplierDirectory for FnDirectory<F>
where
  F: Fn(&PurchaseRequest) -> anyhow::Result<Vec<SupplierQuote>> + Send + Sync,
{
  async fn quotes(&self, request: &PurchaseRequest) -> anyhow::Result<Vec<SupplierQuote>> {
    (self.0)(request)
  }
}

/// Composes the approval email from a fixed template. Leaves `manager_email` unset
/// so the configured address is used.
#[derive(Debug, Clone)]
pub struct TemplateDrafter {
  currency: String,
}

impl TemplateDrafter {
  pub fn new(currency: impl Into<String>) -> Self {
    Self {
      currency: currency.into(),
    }
  }
}

impl Default for TemplateDrafter {
  fn default() -> Self {
    Self::new("TL")
  }
}

#[async_trait]
impl ApprovalDrafter for TemplateDrafter {
  async fn draft(
    &self,
    request: &PurchaseRequest,
    supplier: &Supplier,
    report: &ComplianceReport,
  ) -> anyhow::Result<ApprovalDraft> {
    let reason = report.reason.as_deref().unwrap_or("Approval required");
    let body = format!(
      "Dear Manager,\n\n\
       A purchase request needs your approval.\n\n\
       Item: {item}\n\
       Quantity: {qty}\n\
       Supplier: {supplier}\n\
       Unit Price: {price} {cur}\n\
       Total Cost: {total} {cur}\n\
       Budget: {budget} {cur}\n\
       Reason: {reason}\n\n\
       Please approve or reject this request.",
      item = request.item,
      qty = request.quantity,
      supplier = supplier.name,
      price = supplier.price_per_unit,
      total = report.total_cost,
      budget = request.budget,
      cur = self.currency,
      reason = reason,
    );
    Ok(ApprovalDraft {
      subject: format!("Approval Required: {} Purchase", request.item),
      body,
      manager_email: None,
    })
  }
}

/// The stock compliance rules: the supplier must be compliant and the total cost
/// must stay within budget. Both violations are reported when both apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetPolicy;

impl CompliancePolicy for BudgetPolicy {
  fn evaluate(&self, request: &PurchaseRequest, supplier: &Supplier) -> ComplianceReport {
    let total_cost = supplier.total_for(request.quantity);
    let mut violations = Vec::new();
    if !supplier.compliant {
      violations.push(ComplianceViolation::SupplierNonCompliant {
        supplier: supplier.name.clone(),
      });
    }
    if total_cost > request.budget {
      violations.push(ComplianceViolation::BudgetExceeded {
        total_cost,
        budget: request.budget,
      });
    }

    let reason = if violations.is_empty() {
      None
    } else {
      Some(violations.iter().map(ComplianceViolation::describe).collect::<Vec<_>>().join("; "))
    };
    ComplianceReport {
      compliant: violations.is_empty(),
      total_cost,
      budget: request.budget,
      reason,
      violations,
    }
  }
}
