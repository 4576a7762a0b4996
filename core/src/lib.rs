// src/lib.rs

//! flowgate: a suspendable, auditable workflow orchestration core.
//!
//! flowgate runs a fixed pipeline of steps ("agents") against one execution context
//! per unit of work, with:
//!  - A uniform async step contract returning `Completed`, `Suspend` or `Failed`.
//!  - Write-once step outputs and an append-only, timestamped history.
//!  - Suspension points: a step can park the run (`PENDING` / `REQUIRES_APPROVAL`)
//!    and be re-invoked later with the caller's input.
//!  - Data-dependent routing through per-step selectors.
//!  - Serializable contexts so a suspended run can be stored between calls.
//!
//! The `procurement` module is a complete pipeline built on the core: purchase
//! request extraction, supplier sourcing, compliance gate, manager approval, order.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod procurement;

// --- Re-exports for the Public API ---

pub use crate::core::context::{Cursor, ErrorRecord, ExecutionContext, HistoryEntry, HistoryEvent};
pub use crate::core::control::{FailureKind, InputRequest, StepFailure, StepResult, SuspendKind, Suspension};
pub use crate::core::status::WorkflowStatus;
pub use crate::core::step::{step_fn, Next, Selector, Step, StepDef, StepView};

pub use crate::pipeline::definition::Pipeline;
pub use crate::pipeline::routing::{output_flag, RouteBuilder};

pub use crate::config::{OrchestratorConfig, ProcurementSettings, SupplierSelection};
pub use crate::error::{FlowError, FlowResult};
pub use crate::orchestrator::{ExecutionSummary, Orchestrator};

// Steps are written against async-trait; re-export it so implementors use the same version.
pub use async_trait::async_trait;

/*
    Core workflow:
    1. Build a `Pipeline`, registering steps in their default order.
    2. Attach routes where a step's output decides the successor:
       `pipeline.routes_for_step("x")?.when(cond, "y").otherwise("z")?`.
    3. Wrap it in an `Orchestrator` (validation happens here).
    4. `orchestrator.start(input).await?` returns a context that is SUCCESS, FAILED,
       or suspended (PENDING / REQUIRES_APPROVAL).
    5. For a suspended context, collect the requested input (see
       `ctx.pending_input_request()`) and call `orchestrator.resume(&mut ctx, input).await?`.
    6. Read `orchestrator.get_execution_summary(&ctx)`.
*/
