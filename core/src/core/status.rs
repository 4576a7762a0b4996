// flowgate/src/core/status.rs

//! Workflow status and the transition graph the orchestrator enforces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one workflow run. Exactly one value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
  /// Waiting for external input before the run can continue.
  Pending,
  /// A step is executing or about to execute.
  InProgress,
  /// Suspended until a human/manager decision arrives.
  RequiresApproval,
  /// Terminal: every step on the taken path completed.
  Success,
  /// Terminal: the run hit an unrecoverable error.
  Failed,
}

impl WorkflowStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, WorkflowStatus::Success | WorkflowStatus::Failed)
  }

  /// A run parked in this status is waiting for `resume`.
  pub fn is_suspended(self) -> bool {
    matches!(self, WorkflowStatus::Pending | WorkflowStatus::RequiresApproval)
  }

  /// The allowed edges:
  ///
  /// ```text
  /// PENDING           -> IN_PROGRESS
  /// IN_PROGRESS       -> SUCCESS | FAILED | PENDING | REQUIRES_APPROVAL
  /// REQUIRES_APPROVAL -> IN_PROGRESS
  /// ```
  ///
  /// `SUCCESS` and `FAILED` have no outgoing edges.
  pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
    use WorkflowStatus::*;
    match (self, next) {
      (Pending, InProgress) => true,
      (RequiresApproval, InProgress) => true,
      (InProgress, Success | Failed | Pending | RequiresApproval) => true,
      _ => false,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      WorkflowStatus::Pending => "PENDING",
      WorkflowStatus::InProgress => "IN_PROGRESS",
      WorkflowStatus::RequiresApproval => "REQUIRES_APPROVAL",
      WorkflowStatus::Success => "SUCCESS",
      WorkflowStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for WorkflowStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
