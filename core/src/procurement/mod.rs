// flowgate/src/procurement/mod.rs

//! Purchase-request pipeline built on the core:
//!
//! ```text
//! `email` → `supplier` → `compliance` ─┬─ compliant ──────────────► `order` → done
//!                                      └─ otherwise → `approval` ─┬─ approved ─► `order`
//!                                                                 └─ declined ─► `rejection`
//! ```
//!
//! `approval` suspends the run in `REQUIRES_APPROVAL` until the manager's decision
//! is passed to `resume`. With manual supplier selection `supplier` also suspends,
//! in `PENDING`.

pub mod batch;
pub mod collaborators;
pub mod models;
pub mod steps;

use crate::config::{OrchestratorConfig, ProcurementSettings};
use crate::core::step::Next;
use crate::error::FlowResult;
use crate::orchestrator::Orchestrator;
use crate::pipeline::definition::Pipeline;
use crate::pipeline::routing::output_flag;
use std::sync::Arc;

use collaborators::{ApprovalDrafter, BudgetPolicy, CompliancePolicy, RequestExtractor, SupplierDirectory, TemplateDrafter};
use steps::{ApprovalStep, ComplianceStep, EmailStep, OrderStep, RejectionStep, SupplierStep};

pub use batch::{evaluate_batch, BatchStatus, BatchTally, EvaluationResult};

pub const EMAIL: &str = "email";
pub const SUPPLIER: &str = "supplier";
pub const COMPLIANCE: &str = "compliance";
pub const APPROVAL: &str = "approval";
pub const ORDER: &str = "order";
pub const REJECTION: &str = "rejection";

/// The external systems the steps talk to.
#[derive(Clone)]
pub struct Collaborators {
  pub extractor: Arc<dyn RequestExtractor>,
  pub directory: Arc<dyn SupplierDirectory>,
  /// `None` drafts from the built-in template in the configured currency.
  pub drafter: Option<Arc<dyn ApprovalDrafter>>,
  pub policy: Arc<dyn CompliancePolicy>,
}

impl Collaborators {
  /// Uses the template drafter and the stock budget policy.
  pub fn new(extractor: Arc<dyn RequestExtractor>, directory: Arc<dyn SupplierDirectory>) -> Self {
    Self {
      extractor,
      directory,
      drafter: None,
      policy: Arc::new(BudgetPolicy),
    }
  }

  pub fn with_drafter(mut self, drafter: Arc<dyn ApprovalDrafter>) -> Self {
    self.drafter = Some(drafter);
    self
  }

  pub fn with_policy(mut self, policy: Arc<dyn CompliancePolicy>) -> Self {
    self.policy = policy;
    self
  }
}

impl std::fmt::Debug for Collaborators {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Collaborators").finish_non_exhaustive()
  }
}

pub fn build_pipeline(collaborators: &Collaborators, settings: &ProcurementSettings) -> FlowResult<Pipeline> {
  let drafter: Arc<dyn ApprovalDrafter> = match &collaborators.drafter {
    Some(drafter) => drafter.clone(),
    None => Arc::new(TemplateDrafter::new(settings.currency.clone())),
  };

  let mut pipeline = Pipeline::new();
  pipeline.register(EMAIL, EmailStep::new(collaborators.extractor.clone()))?;
  pipeline.register(
    SUPPLIER,
    SupplierStep::new(collaborators.directory.clone(), settings.supplier_selection),
  )?;
  pipeline.register(COMPLIANCE, ComplianceStep::new(collaborators.policy.clone()))?;
  pipeline.register(
    APPROVAL,
    ApprovalStep::new(
      drafter,
      settings.manager_email.clone(),
      settings.reminder_interval_minutes,
    ),
  )?;
  pipeline.register(ORDER, OrderStep)?;
  pipeline.register(REJECTION, RejectionStep)?;

  pipeline
    .routes_for_step(COMPLIANCE)?
    .when(output_flag(COMPLIANCE, "compliant"), ORDER)
    .otherwise(APPROVAL)?;
  pipeline
    .routes_for_step(APPROVAL)?
    .when(output_flag(APPROVAL, "manager_approved"), ORDER)
    .otherwise(REJECTION)?;
  // Without this the registered order would fall through from `order` into `rejection`.
  pipeline.routes_for_step(ORDER)?.otherwise_next(Next::Done)?;

  Ok(pipeline)
}

pub fn procurement_orchestrator(
  collaborators: &Collaborators,
  settings: &ProcurementSettings,
  config: OrchestratorConfig,
) -> FlowResult<Orchestrator> {
  Orchestrator::with_config(build_pipeline(collaborators, settings)?, config)
}
