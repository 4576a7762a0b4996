// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use flowgate::procurement::collaborators::{StaticDirectory, StaticExtractor};
use flowgate::procurement::models::SupplierQuote;
use flowgate::procurement::{procurement_orchestrator, Collaborators};
use flowgate::{
  async_trait, step_fn, FailureKind, Orchestrator, OrchestratorConfig, ProcurementSettings, Step, StepResult, StepView,
};
use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;

// --- Helper for Tracing Setup ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Generic steps ---

/// Completes with `{"step": <id>}` and counts its invocations.
pub struct CountingStep {
  pub calls: Arc<AtomicUsize>,
}

impl CountingStep {
  pub fn new() -> (Self, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Self { calls: calls.clone() }, calls)
  }
}

#[async_trait]
impl Step for CountingStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.calls.fetch_add(1, Ordering::SeqCst);
    StepResult::completed(&json!({ "step": view.step_id() }))
  }
}

/// Suspends in `PENDING` until it is resumed with `{"answer": ...}`, then completes
/// with that answer. Counts invocations.
pub struct AskingStep {
  pub calls: Arc<AtomicUsize>,
}

impl AskingStep {
  pub fn new() -> (Self, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Self { calls: calls.clone() }, calls)
  }
}

#[async_trait]
impl Step for AskingStep {
  async fn run(&self, view: StepView<'_>) -> StepResult {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match view.resume_input().and_then(|input| input.get("answer")) {
      Some(answer) => StepResult::completed(&json!({ "answer": answer })),
      None => StepResult::awaiting_input("need an answer", &["answer"]),
    }
  }
}

pub fn completing(value: serde_json::Value) -> impl Step {
  step_fn(move |_view: &StepView<'_>| StepResult::Completed(value.clone()))
}

pub fn failing(message: &'static str) -> impl Step {
  step_fn(move |_view: &StepView<'_>| StepResult::failed(FailureKind::External, message))
}

// --- Procurement fixtures ---

pub const LAPTOP_EMAIL: &str = "Hi, we need 5 laptops for the new hires. Budget is 50000 TL.";
pub const MONITOR_EMAIL: &str = "Please order 100 monitors, our budget is 5000 TL.";

pub fn laptop_extraction() -> String {
  r#"{"item": "laptop", "quantity": 5, "budget": 50000}"#.to_string()
}

pub fn monitor_extraction() -> String {
  // Model output as it often arrives: fenced, with loosely typed numbers.
  "```json\n{\"item\": \"monitor\", \"quantity\": \"100\", \"budget\": 5000.0}\n```".to_string()
}

pub fn laptop_quotes() -> Vec<SupplierQuote> {
  vec![
    SupplierQuote::new("LaptopWorld", 9500.0, true),
    SupplierQuote::new("TechSupply", 8000.0, true),
  ]
}

pub fn monitor_quotes() -> Vec<SupplierQuote> {
  vec![
    SupplierQuote::new("ScreenCo", 120.0, true),
    SupplierQuote::new("DisplayHub", 150.0, true),
  ]
}

pub fn collaborators(extraction: String, quotes: Vec<SupplierQuote>) -> Collaborators {
  Collaborators::new(
    Arc::new(StaticExtractor::new(extraction)),
    Arc::new(StaticDirectory::new(quotes)),
  )
}

pub fn procurement(extraction: String, quotes: Vec<SupplierQuote>, settings: ProcurementSettings) -> Orchestrator {
  procurement_orchestrator(&collaborators(extraction, quotes), &settings, OrchestratorConfig::default())
    .expect("procurement pipeline should be valid")
}
