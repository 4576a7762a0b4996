use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowgate::procurement::collaborators::{StaticDirectory, StaticExtractor};
use flowgate::procurement::models::SupplierQuote;
use flowgate::procurement::{procurement_orchestrator, Collaborators};
use flowgate::{
  step_fn, ExecutionContext, Orchestrator, OrchestratorConfig, Pipeline, ProcurementSettings, StepResult, StepView,
  WorkflowStatus,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

// --- Helpers ---

fn straight_pipeline(num_steps: usize) -> Orchestrator {
  let mut pipeline = Pipeline::new();
  for i in 0..num_steps {
    pipeline
      .register(
        format!("step_{}", i),
        step_fn(|view: &StepView<'_>| StepResult::completed(&json!({ "step": view.step_id() }))),
      )
      .unwrap();
  }
  Orchestrator::new(pipeline).unwrap()
}

fn asking_pipeline() -> Orchestrator {
  let mut pipeline = Pipeline::new();
  pipeline
    .register(
      "ask",
      step_fn(|view: &StepView<'_>| match view.resume_input() {
        Some(answer) => StepResult::Completed(answer.clone()),
        None => StepResult::awaiting_input("need an answer", &["answer"]),
      }),
    )
    .unwrap();
  pipeline
    .register("after", step_fn(|_view: &StepView<'_>| StepResult::Completed(json!(null))))
    .unwrap();
  Orchestrator::new(pipeline).unwrap()
}

fn procurement(extraction: &str, quotes: Vec<SupplierQuote>) -> Orchestrator {
  let collaborators = Collaborators::new(
    Arc::new(StaticExtractor::new(extraction)),
    Arc::new(StaticDirectory::new(quotes)),
  );
  procurement_orchestrator(&collaborators, &ProcurementSettings::default(), OrchestratorConfig::default()).unwrap()
}

// --- Benchmark Functions ---

fn bench_straight_through_runs(c: &mut Criterion) {
  let mut group = c.benchmark_group("StraightThrough");
  let rt = Runtime::new().unwrap();

  for num_steps in [1usize, 5, 20].iter() {
    let orchestrator = Arc::new(straight_pipeline(*num_steps));
    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::new("steps", num_steps), num_steps, |b, _| {
      b.to_async(&rt).iter(|| {
        let orchestrator = orchestrator.clone();
        async move {
          let ctx = orchestrator.start(json!({})).await.unwrap();
          assert_eq!(ctx.status(), WorkflowStatus::Success);
        }
      });
    });
  }
  group.finish();
}

fn bench_suspend_resume(c: &mut Criterion) {
  let mut group = c.benchmark_group("SuspendResume");
  let rt = Runtime::new().unwrap();
  let orchestrator = Arc::new(asking_pipeline());

  group.bench_function("in_memory", |b| {
    b.to_async(&rt).iter(|| {
      let orchestrator = orchestrator.clone();
      async move {
        let mut ctx = orchestrator.start(json!({})).await.unwrap();
        orchestrator.resume(&mut ctx, json!({ "answer": 1 })).await.unwrap();
      }
    });
  });

  // Stores the suspended run as JSON between the two calls.
  group.bench_function("through_snapshot", |b| {
    b.to_async(&rt).iter(|| {
      let orchestrator = orchestrator.clone();
      async move {
        let ctx = orchestrator.start(json!({})).await.unwrap();
        let stored = ctx.to_json().unwrap();
        let mut restored = ExecutionContext::from_json(&stored).unwrap();
        orchestrator.resume(&mut restored, json!({ "answer": 1 })).await.unwrap();
      }
    });
  });
  group.finish();
}

fn bench_procurement_paths(c: &mut Criterion) {
  let mut group = c.benchmark_group("Procurement");
  let rt = Runtime::new().unwrap();

  let compliant = Arc::new(procurement(
    r#"{"item": "laptop", "quantity": 5, "budget": 50000}"#,
    vec![SupplierQuote::new("TechSupply", 8000.0, true)],
  ));
  group.bench_function("compliant_order", |b| {
    b.to_async(&rt).iter(|| {
      let orchestrator = compliant.clone();
      async move { orchestrator.start(json!({ "body": "5 laptops" })).await.unwrap() }
    });
  });

  let over_budget = Arc::new(procurement(
    r#"{"item": "monitor", "quantity": 100, "budget": 5000}"#,
    vec![SupplierQuote::new("ScreenCo", 120.0, true)],
  ));
  group.bench_function("approval_round_trip", |b| {
    b.to_async(&rt).iter(|| {
      let orchestrator = over_budget.clone();
      async move {
        let mut ctx = orchestrator.start(json!({ "body": "100 monitors" })).await.unwrap();
        orchestrator
          .resume(&mut ctx, json!({ "manager_approved": true }))
          .await
          .unwrap();
      }
    });
  });
  group.finish();
}

fn bench_summary(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let orchestrator = straight_pipeline(20);
  let ctx = rt.block_on(orchestrator.start(json!({}))).unwrap();

  c.bench_function("ExecutionSummary/20_steps", |b| {
    b.iter(|| criterion::black_box(orchestrator.get_execution_summary(&ctx)))
  });
}

criterion_group!(
  benches,
  bench_straight_through_runs,
  bench_suspend_resume,
  bench_procurement_paths,
  bench_summary
);
criterion_main!(benches);
