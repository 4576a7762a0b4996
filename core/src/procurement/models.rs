// flowgate/src/procurement/models.rs

//! Plain data exchanged between the procurement steps. Every type here is what one
//! step stores as its output and what later steps read back.

use crate::core::control::StepFailure;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
  pub item: String,
  pub quantity: u32,
  pub budget: f64,
}

impl PurchaseRequest {
  /// Parses the JSON a language model produced for an email.
  ///
  /// Models are loose with types, so `quantity` and `budget` may arrive as integers,
  /// floats or numeric strings; a fractional quantity is truncated. The payload may
  /// be wrapped in a Markdown code fence.
  pub fn from_model_json(raw: &str) -> Result<Self, StepFailure> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
      .map_err(|e| StepFailure::parse(format!("extraction output is not valid JSON: {}", e)))?;
    let obj = value
      .as_object()
      .ok_or_else(|| StepFailure::parse("extraction output is not a JSON object"))?;

    let item = obj
      .get("item")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .ok_or_else(|| StepFailure::parse("extraction output has no 'item'"))?
      .to_string();
    let quantity = obj
      .get("quantity")
      .and_then(number_like)
      .ok_or_else(|| StepFailure::parse("extraction output has no numeric 'quantity'"))?;
    let budget = obj
      .get("budget")
      .and_then(number_like)
      .ok_or_else(|| StepFailure::parse("extraction output has no numeric 'budget'"))?;

    if quantity < 1.0 || quantity > u32::MAX as f64 {
      return Err(StepFailure::output(format!("quantity {} is out of range", quantity)));
    }
    if budget < 0.0 {
      return Err(StepFailure::output(format!("budget {} is not a usable amount", budget)));
    }

    Ok(Self {
      item,
      quantity: quantity.trunc() as u32,
      budget,
    })
  }
}

fn number_like(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }
  .filter(|n| n.is_finite())
}

fn strip_code_fence(raw: &str) -> &str {
  let trimmed = raw.trim();
  match trimmed.strip_prefix("```") {
    Some(rest) => {
      // Drop the info string ("json", "JSON", "json5", ...) up to the first newline.
      let rest = match rest.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body,
        _ => rest,
      };
      let rest = rest.trim();
      rest.strip_suffix("```").unwrap_or(rest).trim()
    }
    None => trimmed,
  }
}

/// A quote as a supplier directory reports it. Fields are optional because the
/// directory may itself be a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuote {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub price_per_unit: Option<f64>,
  #[serde(default)]
  pub compliant: Option<bool>,
}

impl SupplierQuote {
  pub fn new(name: &str, price_per_unit: f64, compliant: bool) -> Self {
    Self {
      name: Some(name.to_string()),
      price_per_unit: Some(price_per_unit),
      compliant: Some(compliant),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
  pub name: String,
  pub price_per_unit: f64,
  pub compliant: bool,
}

impl Supplier {
  /// A quote without a price is unusable; a missing name or compliance flag falls
  /// back to "Unknown Supplier" / not compliant.
  pub fn from_quote(quote: SupplierQuote) -> Result<Self, StepFailure> {
    let price_per_unit = quote
      .price_per_unit
      .ok_or_else(|| StepFailure::output("supplier directory returned null price_per_unit"))?;
    if price_per_unit < 0.0 || !price_per_unit.is_finite() {
      return Err(StepFailure::output(format!("supplier price {} is not usable", price_per_unit)));
    }
    Ok(Self {
      name: quote.name.unwrap_or_else(|| "Unknown Supplier".to_string()),
      price_per_unit,
      compliant: quote.compliant.unwrap_or(false),
    })
  }

  pub fn total_for(&self, quantity: u32) -> f64 {
    self.price_per_unit * f64::from(quantity)
  }
}

/// Output of the supplier step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierChoice {
  pub candidates: Vec<Supplier>,
  pub selected: Supplier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplianceViolation {
  SupplierNonCompliant { supplier: String },
  BudgetExceeded { total_cost: f64, budget: f64 },
}

impl ComplianceViolation {
  pub fn describe(&self) -> String {
    match self {
      ComplianceViolation::SupplierNonCompliant { .. } => "Supplier is not compliant with company policies".to_string(),
      ComplianceViolation::BudgetExceeded { total_cost, budget } => {
        format!("Budget exceeded: {} > {}", total_cost, budget)
      }
    }
  }
}

/// Output of the compliance step. Routing only looks at `compliant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
  pub compliant: bool,
  pub total_cost: f64,
  pub budget: f64,
  pub reason: Option<String>,
  pub violations: Vec<ComplianceViolation>,
}

/// Reminder an external scheduler should send while an approval is outstanding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPlan {
  pub to: String,
  pub subject: String,
  pub interval_minutes: u32,
}

/// What a drafter produces: the approval email itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDraft {
  pub subject: String,
  pub body: String,
  #[serde(default)]
  pub manager_email: Option<String>,
}

/// The approval request sent to the manager, carried as suspension details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
  pub subject: String,
  pub body: String,
  pub manager_email: String,
  pub reason: String,
  pub reminder: ReminderPlan,
}

/// Resume input answering an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
  pub manager_approved: bool,
  #[serde(default)]
  pub note: Option<String>,
}

/// Output of the approval step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
  pub manager_approved: bool,
  pub note: Option<String>,
  pub request: ApprovalRequest,
}

pub const ORDER_PLACED: &str = "ORDER_PLACED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
  pub order_id: String,
  pub supplier: String,
  pub item: String,
  pub quantity: u32,
  pub total_price: f64,
  pub status: String,
}
