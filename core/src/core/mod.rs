pub mod context;
pub mod control;
pub mod status;
pub mod step;

// Re-export key types for easier access from other flowgate modules (and lib.rs)
pub use context::{Cursor, ErrorRecord, ExecutionContext, HistoryEntry, HistoryEvent};
pub use control::{FailureKind, InputRequest, StepFailure, StepResult, SuspendKind, Suspension};
pub use status::WorkflowStatus;
pub use step::{step_fn, Next, Selector, Step, StepDef, StepView};
