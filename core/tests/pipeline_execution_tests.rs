// tests/pipeline_execution_tests.rs
mod common;
use common::*;
use flowgate::{
  output_flag, step_fn, Cursor, FailureKind, FlowError, HistoryEvent, Next, Orchestrator, OrchestratorConfig, Pipeline,
  StepResult, StepView, WorkflowStatus,
};
use serde_json::json;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn test_straight_run_completes_every_step_in_order() {
  setup_tracing();
  let (a, a_calls) = CountingStep::new();
  let (b, b_calls) = CountingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("a", a).unwrap();
  pipeline.register("b", b).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();

  assert_eq!(ctx.status(), WorkflowStatus::Success);
  assert_eq!(ctx.cursor(), &Cursor::Done);
  assert_eq!(a_calls.load(Ordering::SeqCst), 1);
  assert_eq!(b_calls.load(Ordering::SeqCst), 1);
  assert_eq!(ctx.outputs().keys().collect::<Vec<_>>(), vec!["a", "b"]);
  assert_eq!(ctx.output("b"), Some(&json!({ "step": "b" })));

  let events: Vec<HistoryEvent> = ctx.history().iter().map(|e| e.event).collect();
  assert_eq!(
    events,
    vec![
      HistoryEvent::Started,
      HistoryEvent::StepCompleted,
      HistoryEvent::StepCompleted,
      HistoryEvent::Finished
    ]
  );
  assert!(ctx.history().iter().all(|e| e.actor == "orchestrator"));
}

#[tokio::test]
#[serial]
async fn test_suspend_and_resume_reinvokes_same_step() {
  setup_tracing();
  let (first, first_calls) = CountingStep::new();
  let (ask, ask_calls) = AskingStep::new();
  let (last, last_calls) = CountingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("first", first).unwrap();
  pipeline.register("ask", ask).unwrap();
  pipeline.register("last", last).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let mut ctx = orchestrator.start(json!({})).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Pending);
  assert_eq!(ctx.cursor(), &Cursor::Step("ask".to_string()));
  assert!(ctx.output("ask").is_none(), "a suspension writes no output");
  let request = ctx.pending_input_request().expect("pending request");
  assert_eq!(request.step_id, "ask");
  assert_eq!(request.expected, vec!["answer".to_string()]);
  assert_eq!(last_calls.load(Ordering::SeqCst), 0);

  // Resuming without the expected field suspends again at the same step.
  orchestrator.resume(&mut ctx, json!({ "wrong": 1 })).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Pending);
  assert_eq!(ctx.cursor(), &Cursor::Step("ask".to_string()));

  orchestrator.resume(&mut ctx, json!({ "answer": 42 })).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Success);
  assert!(ctx.pending_input_request().is_none());
  assert_eq!(ctx.output("ask"), Some(&json!({ "answer": 42 })));
  assert_eq!(first_calls.load(Ordering::SeqCst), 1, "earlier steps never run again");
  assert_eq!(ask_calls.load(Ordering::SeqCst), 3);
  assert_eq!(last_calls.load(Ordering::SeqCst), 1);

  let resumed = ctx.history().iter().filter(|e| e.event == HistoryEvent::Resumed).count();
  assert_eq!(resumed, 2);
}

#[tokio::test]
#[serial]
async fn test_resume_advances_exactly_one_position() {
  setup_tracing();
  let (ask, _) = AskingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("ask", ask).unwrap();
  pipeline.register("ask_again", AskingStep::new().0).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let mut ctx = orchestrator.start(json!({})).await.unwrap();
  orchestrator.resume(&mut ctx, json!({ "answer": "one" })).await.unwrap();

  // The resume input went to "ask" only; "ask_again" got nothing and suspended.
  assert_eq!(ctx.status(), WorkflowStatus::Pending);
  assert_eq!(ctx.cursor(), &Cursor::Step("ask_again".to_string()));
  assert_eq!(ctx.output("ask"), Some(&json!({ "answer": "one" })));
  assert!(ctx.output("ask_again").is_none());
}

#[tokio::test]
#[serial]
async fn test_failure_halts_the_run() {
  setup_tracing();
  let (after, after_calls) = CountingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("ok", completing(json!(1))).unwrap();
  pipeline.register("boom", failing("supplier API is down")).unwrap();
  pipeline.register("after", after).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();

  assert_eq!(ctx.status(), WorkflowStatus::Failed);
  assert_eq!(ctx.cursor(), &Cursor::Step("boom".to_string()), "cursor stays on the failed step");
  assert_eq!(after_calls.load(Ordering::SeqCst), 0);
  let error = ctx.error().expect("error recorded");
  assert_eq!(error.kind, FailureKind::External);
  assert_eq!(error.step_id.as_deref(), Some("boom"));
  assert_eq!(error.message, "supplier API is down");

  let failures = ctx.history().iter().filter(|e| e.event == HistoryEvent::StepFailed).count();
  assert_eq!(failures, 1);
  assert_eq!(ctx.history().last().unwrap().event, HistoryEvent::StepFailed);
}

#[tokio::test]
#[serial]
async fn test_terminal_contexts_are_not_resumable() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline.register("boom", failing("nope")).unwrap();
  let failing_orchestrator = Orchestrator::new(pipeline).unwrap();
  let mut failed = failing_orchestrator.start(json!({})).await.unwrap();
  let before = failed.clone();

  let err = failing_orchestrator.resume(&mut failed, json!({})).await.unwrap_err();
  assert!(matches!(err, FlowError::NotResumable { status: WorkflowStatus::Failed }));
  assert_eq!(failed, before, "a refused resume changes nothing");

  let mut pipeline = Pipeline::new();
  pipeline.register("ok", completing(json!(1))).unwrap();
  let ok_orchestrator = Orchestrator::new(pipeline).unwrap();
  let mut succeeded = ok_orchestrator.start(json!({})).await.unwrap();
  let before = succeeded.clone();
  let err = ok_orchestrator.resume(&mut succeeded, json!({})).await.unwrap_err();
  assert!(matches!(err, FlowError::NotResumable { status: WorkflowStatus::Success }));
  assert_eq!(succeeded, before);
}

#[tokio::test]
#[serial]
async fn test_history_only_grows_across_calls() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline.register("ask", AskingStep::new().0).unwrap();
  pipeline.register("done", completing(json!(null))).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let mut ctx = orchestrator.start(json!({})).await.unwrap();
  let first_snapshot = ctx.history().to_vec();
  orchestrator.resume(&mut ctx, json!({ "answer": true })).await.unwrap();

  let history = ctx.history();
  assert!(history.len() > first_snapshot.len());
  assert_eq!(&history[..first_snapshot.len()], &first_snapshot[..], "existing entries are never rewritten");
  assert!(history.windows(2).all(|w| w[0].at <= w[1].at));
}

#[tokio::test]
#[serial]
async fn test_selector_routes_on_output() {
  setup_tracing();
  let (yes, yes_calls) = CountingStep::new();
  let (no, no_calls) = CountingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline
    .register(
      "check",
      step_fn(|view: &StepView<'_>| {
        let approved = view.input().get("approved").and_then(|v| v.as_bool()).unwrap_or(false);
        StepResult::completed(&json!({ "approved": approved }))
      }),
    )
    .unwrap();
  pipeline.register("no", no).unwrap();
  pipeline.register("yes", yes).unwrap();
  pipeline
    .routes_for_step("check")
    .unwrap()
    .when(output_flag("check", "approved"), "yes")
    .otherwise("no")
    .unwrap();
  pipeline.routes_for_step("no").unwrap().otherwise_next(Next::Done).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({ "approved": true })).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Success);
  assert_eq!(yes_calls.load(Ordering::SeqCst), 1);
  assert_eq!(no_calls.load(Ordering::SeqCst), 0);
  assert!(ctx
    .history()
    .iter()
    .any(|e| e.event == HistoryEvent::Routed && e.message == "Step 'check' routed to 'yes'"));

  let ctx = orchestrator.start(json!({ "approved": false })).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Success);
  assert_eq!(no_calls.load(Ordering::SeqCst), 1);
  assert_eq!(yes_calls.load(Ordering::SeqCst), 1, "'no' ends the run before 'yes'");
  assert!(ctx.output("yes").is_none());
}

#[tokio::test]
#[serial]
async fn test_routed_entries_carry_structured_target() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline
    .register_with_selector("a", completing(json!(1)), |_ctx| Next::step("c"))
    .unwrap();
  pipeline.register("b", completing(json!(2))).unwrap();
  pipeline
    .register_with_selector("c", completing(json!(3)), |_ctx| Next::Done)
    .unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let mut ctx = orchestrator.start(json!({})).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Success);

  let routes: Vec<(Option<&str>, Option<&str>)> = ctx
    .history()
    .iter()
    .filter(|e| e.event == HistoryEvent::Routed)
    .map(|e| (e.step_id.as_deref(), e.target.as_deref()))
    .collect();
  assert_eq!(routes, vec![(Some("a"), Some("c")), (Some("c"), None)]);

  // Free-text notes naming a step do not count as touching it.
  ctx.record("auditor", "compared against step 'b'");
  let summary = orchestrator.get_execution_summary(&ctx);
  assert!(summary.touched_step("a"));
  assert!(summary.touched_step("c"));
  assert!(!summary.touched_step("b"));
}

#[tokio::test]
#[serial]
async fn test_selector_to_unregistered_step_fails_run() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline
    .register_with_selector("a", completing(json!(1)), |_ctx| Next::step("ghost"))
    .unwrap();
  pipeline.register("b", completing(json!(2))).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Failed);
  let error = ctx.error().unwrap();
  assert_eq!(error.kind, FailureKind::UnknownStep);
  assert!(error.message.contains("ghost"));
  assert!(ctx.output("a").is_some(), "the routing step's output was already written");
  assert!(ctx.output("b").is_none());
}

#[tokio::test]
#[serial]
async fn test_cycle_back_to_completed_step_fails_on_duplicate_output() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline.register("a", completing(json!(1))).unwrap();
  pipeline
    .register_with_selector("b", completing(json!(2)), |_ctx| Next::step("a"))
    .unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Failed);
  assert_eq!(ctx.error().unwrap().kind, FailureKind::DuplicateOutput);
  assert_eq!(ctx.output("a"), Some(&json!(1)), "outputs are write-once");
}

#[tokio::test]
#[serial]
async fn test_step_limit_stops_runaway_routing() {
  setup_tracing();
  let (ask, _) = AskingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("s1", completing(json!(1))).unwrap();
  pipeline.register("s2", completing(json!(2))).unwrap();
  pipeline.register("s3", ask).unwrap();
  let config = OrchestratorConfig {
    max_steps_per_call: 2,
    ..OrchestratorConfig::default()
  };
  let orchestrator = Orchestrator::with_config(pipeline, config).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();
  assert_eq!(ctx.status(), WorkflowStatus::Failed);
  assert_eq!(ctx.error().unwrap().kind, FailureKind::StepLimitExceeded);
  assert_eq!(ctx.cursor(), &Cursor::Step("s3".to_string()));
}

#[tokio::test]
#[serial]
async fn test_suspended_context_survives_snapshot() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline.register("ask", AskingStep::new().0).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();
  let stored = ctx.to_json().unwrap();
  drop(ctx);

  let mut restored = flowgate::ExecutionContext::from_json(&stored).unwrap();
  assert_eq!(restored.status(), WorkflowStatus::Pending);
  orchestrator.resume(&mut restored, json!({ "answer": "later" })).await.unwrap();
  assert_eq!(restored.status(), WorkflowStatus::Success);
}

#[tokio::test]
#[serial]
async fn test_concurrent_runs_are_independent() {
  setup_tracing();
  let (ask, calls) = AskingStep::new();
  let mut pipeline = Pipeline::new();
  pipeline.register("ask", ask).unwrap();
  let orchestrator = Arc::new(Orchestrator::new(pipeline).unwrap());

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let orchestrator = orchestrator.clone();
      tokio::spawn(async move {
        let mut ctx = orchestrator.start(json!({})).await.unwrap();
        orchestrator.resume(&mut ctx, json!({ "answer": i })).await.unwrap();
        ctx
      })
    })
    .collect();

  let mut run_ids = std::collections::HashSet::new();
  for (i, handle) in handles.into_iter().enumerate() {
    let ctx = handle.await.unwrap();
    assert_eq!(ctx.status(), WorkflowStatus::Success);
    assert_eq!(ctx.output("ask"), Some(&json!({ "answer": i })));
    run_ids.insert(ctx.run_id());
  }
  assert_eq!(run_ids.len(), 8);
  assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
#[serial]
async fn test_execution_summary_reports_run() {
  setup_tracing();
  let mut pipeline = Pipeline::new();
  pipeline.register("ok", completing(json!({ "x": 1 }))).unwrap();
  pipeline.register("ask", AskingStep::new().0).unwrap();
  let orchestrator = Orchestrator::new(pipeline).unwrap();

  let ctx = orchestrator.start(json!({})).await.unwrap();
  let summary = orchestrator.get_execution_summary(&ctx);

  assert_eq!(summary.run_id, ctx.run_id());
  assert_eq!(summary.status, WorkflowStatus::Pending);
  assert!(!summary.requires_approval);
  assert_eq!(summary.steps_executed, 2);
  assert_eq!(summary.outputs.len(), 1);
  assert_eq!(summary.pending_input_request.as_ref().unwrap().step_id, "ask");
  assert!(summary.touched_step("ok"));
  assert!(!summary.touched_step("elsewhere"));
  assert_eq!(summary.history.len(), ctx.history().len());
}
