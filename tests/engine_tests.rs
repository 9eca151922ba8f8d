//! End-to-end tests for the effect engine
//!
//! Every scenario goes through the public API and forces effects with the
//! real executor. Runs use an explicit `Config`/sink so tests never race on
//! the process-wide slots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use tarry::{
    apply, apply_fn, fail, from_env, from_outcome_thunk, run, sequence, sequence_a, succeed,
    traverse, validate, Cause, Config, Context, Effect, Env, MemorySink, Outcome, Reason,
    RunOptions, Stage, ValidatorFn,
};

/// Route engine logs through a test subscriber, honoring `RUST_LOG`
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn options() -> RunOptions {
    init_tracing();
    RunOptions::new().with_config(Config::testing().with_telemetry_enabled(false))
}

fn staged(outcome: Outcome<Value>) -> tarry::StageTaggedError {
    match outcome {
        Outcome::Failure(Cause::Staged(err)) => err,
        other => panic!("expected staged failure, got {other:?}"),
    }
}

// ============================================================================
// Identities and combinator laws
// ============================================================================

#[tokio::test]
async fn success_identity_round_trips_through_run() {
    let outcome = run(succeed(json!({"id": 7})), Env::new(), options()).await;
    assert_eq!(outcome, Outcome::success(json!({"id": 7})));
}

#[tokio::test]
async fn failure_identity_round_trips_through_run() {
    let outcome = run(fail::<Value>(json!("nope")), Env::new(), options()).await;
    assert_eq!(outcome, Outcome::failure(json!("nope")));
}

#[tokio::test]
async fn mapping_composed_functions_equals_composing_maps() {
    let double = |v: Value| Ok(json!(v.as_i64().unwrap() * 2));
    let inc = |v: Value| Ok(json!(v.as_i64().unwrap() + 1));

    let chained = succeed(json!(5)).map(double).map(inc);
    let fused = succeed(json!(5)).map(move |v: Value| {
        let doubled = json!(v.as_i64().unwrap() * 2);
        Ok(json!(doubled.as_i64().unwrap() + 1))
    });

    let a = run(chained, Env::new(), options()).await;
    let b = run(fused, Env::new(), options()).await;
    assert_eq!(a, b);
    assert_eq!(a, Outcome::success(json!(11)));
}

#[tokio::test]
async fn bind_left_identity() {
    let f = |v: Value| succeed(json!(format!("got {v}")));
    let bound = run(succeed(json!(1)).bind(f), Env::new(), options()).await;
    let direct = run(f(json!(1)), Env::new(), options()).await;
    assert_eq!(bound, direct);
}

#[tokio::test]
async fn bind_right_identity() {
    let effect = succeed(json!([1, 2]));
    let rebound = run(effect.clone().bind(succeed), Env::new(), options()).await;
    let plain = run(effect, Env::new(), options()).await;
    assert_eq!(rebound, plain);
}

#[tokio::test]
async fn map_skips_the_transform_on_the_failure_track() {
    let calls = Arc::new(AtomicUsize::new(0));
    let spy = Arc::clone(&calls);
    let effect = fail::<Value>("already broken").map(move |v: Value| {
        spy.fetch_add(1, Ordering::SeqCst);
        Ok(v)
    });

    let outcome = run(effect, Env::new(), options()).await;
    assert_eq!(outcome, Outcome::failure("already broken"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Failure taxonomy
// ============================================================================

#[tokio::test]
async fn map_panic_becomes_a_map_staged_failure() {
    let effect = succeed(json!(1)).map(|_v: Value| -> Result<Value, Value> {
        panic!("transform exploded")
    });
    let err = staged(run(effect, Env::new(), options()).await);
    assert_eq!(err.stage, Stage::Map);
    assert_eq!(
        err.reason,
        Reason::Caught {
            error: json!("transform exploded")
        }
    );
}

#[tokio::test]
async fn operand_failures_keep_their_original_stage_through_later_maps() {
    let effect = from_env(|_env| -> Result<Value, Value> { Err(json!("bad lift")) })
        .map(|v: Value| Ok(v))
        .map(|v: Value| Ok(v));

    let err = staged(run(effect, Env::new(), options()).await);
    assert_eq!(err.stage, Stage::LiftFunction);
}

#[tokio::test]
async fn apply_reports_the_function_side_when_both_fail() {
    let func: Effect<tarry::ApplyFn<Value, Value>> = fail("function side down");
    let value: Effect<Value> = fail("value side down");
    let outcome = run(apply(func, value), Env::new(), options()).await;
    assert_eq!(outcome, Outcome::failure("function side down"));
}

#[tokio::test]
async fn apply_combines_two_success_tracks() {
    let func = succeed(apply_fn(|v: Value| Ok(json!(v.as_i64().unwrap() * 10))));
    let outcome = run(apply(func, succeed(json!(4))), Env::new(), options()).await;
    assert_eq!(outcome, Outcome::success(json!(40)));
}

#[tokio::test]
async fn timeout_is_a_run_staged_timeout_failure() {
    let effect: Effect<Value> = from_outcome_thunk(|_env| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Outcome::success(json!("too late"))
    });

    let started = Instant::now();
    let outcome = run(
        effect,
        Env::new(),
        options().with_timeout(Duration::from_millis(80)),
    )
    .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_secs(5), "timeout did not cut the run short");
    let err = staged(outcome);
    assert_eq!(err.stage, Stage::Run);
    assert!(err.is_timeout());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_lifted_function_is_bounded_by_the_timeout() {
    // the lift runs on the spawned task, so a thread-blocking function
    // cannot hold up the caller past the budget
    let effect = from_env(|_env| {
        std::thread::sleep(Duration::from_millis(800));
        Ok(json!("slept"))
    });

    let started = Instant::now();
    let outcome = run(
        effect,
        Env::new(),
        options().with_timeout(Duration::from_millis(50)),
    )
    .await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(400),
        "run blocked for {elapsed:?} despite a 50ms timeout"
    );
    let err = staged(outcome);
    assert!(err.is_timeout());
}

// ============================================================================
// Sequencing
// ============================================================================

#[tokio::test]
async fn sequence_short_circuits_and_never_runs_later_thunks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        from_outcome_thunk(move |_env| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::success(json!("ok"))
            }
        })
    };

    let effect = sequence(vec![
        counted(&calls),
        fail::<Value>("stop here"),
        counted(&calls),
        counted(&calls),
    ]);

    let outcome = run(effect, Env::new(), options()).await;
    assert_eq!(outcome, Outcome::failure("stop here"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequence_a_accumulates_every_failure_in_input_order() {
    let effect = sequence_a(vec![
        fail::<Value>("first"),
        succeed(json!("fine")),
        fail::<Value>("second"),
    ]);

    let outcome = run(effect, Env::new(), options()).await;
    assert_eq!(
        outcome,
        Outcome::Failure(Cause::Many(vec![
            Cause::from("first"),
            Cause::from("second"),
        ]))
    );
}

#[tokio::test]
async fn sequence_a_flattens_nested_accumulations_one_level() {
    let inner = Cause::Many(vec![Cause::from("a"), Cause::from("b")]);
    let effect = sequence_a(vec![fail::<Value>(inner), fail::<Value>("c")]);

    let outcome = run(effect, Env::new(), options()).await;
    assert_eq!(
        outcome,
        Outcome::Failure(Cause::Many(vec![
            Cause::from("a"),
            Cause::from("b"),
            Cause::from("c"),
        ]))
    );
}

#[tokio::test]
async fn sequence_a_runs_every_thunk_even_after_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        from_outcome_thunk(move |_env| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::<Value>::failure("counted failure")
            }
        })
    };

    let effect = sequence_a(vec![counted(&calls), counted(&calls), counted(&calls)]);
    let outcome = run(effect, Env::new(), options()).await;
    assert!(outcome.is_failure());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn traverse_maps_then_collects() {
    let effect = traverse(vec![1_i64, 2, 3], |n| succeed(json!(n * n)));
    let outcome = run(effect, Env::new(), options()).await;
    assert_eq!(outcome, Outcome::success(vec![json!(1), json!(4), json!(9)]));
}

#[tokio::test]
async fn validate_returns_the_original_value_when_all_checks_pass() {
    let checks: Vec<ValidatorFn<Value>> = vec![
        Box::new(|v| {
            if v.get("name").is_some() {
                succeed(v.clone())
            } else {
                fail("name required")
            }
        }),
        Box::new(|v| {
            if v.get("age").is_some() {
                succeed(v.clone())
            } else {
                fail("age required")
            }
        }),
    ];

    let value = json!({"name": "ada", "age": 36});
    let outcome = run(validate(value.clone(), &checks), Env::new(), options()).await;
    assert_eq!(outcome, Outcome::success(value));
}

#[tokio::test]
async fn validate_accumulates_every_violation() {
    let checks: Vec<ValidatorFn<Value>> = vec![
        Box::new(|_v| fail("name required")),
        Box::new(|_v| fail("age required")),
    ];

    let outcome = run(validate(json!({}), &checks), Env::new(), options()).await;
    assert_eq!(
        outcome,
        Outcome::Failure(Cause::Many(vec![
            Cause::from("name required"),
            Cause::from("age required"),
        ]))
    );
}

// ============================================================================
// Context propagation
// ============================================================================

#[tokio::test]
async fn combinators_promote_the_context_per_step() {
    let base = Context::new()
        .with_span_name("load-user")
        .with_baggage("tenant", json!("acme"));
    let base_trace = base.trace_id.clone();

    let mapped = succeed(json!(1)).with_context(base).map(|v: Value| Ok(v));
    let promoted = mapped.context().clone();

    assert_ne!(promoted.trace_id, base_trace);
    assert_eq!(promoted.parent_trace_id.as_deref(), Some(base_trace.as_str()));
    assert_eq!(promoted.span_name.as_deref(), Some("map -> load-user"));
    assert_eq!(promoted.baggage.get("tenant"), Some(&json!("acme")));

    // the promoted context does not change the resolved value
    let outcome = run(mapped, Env::new(), options()).await;
    assert_eq!(outcome, Outcome::success(json!(1)));
}

#[tokio::test]
async fn environment_flows_into_lifted_functions() {
    let effect = from_env(|env| {
        env.get("greeting")
            .cloned()
            .ok_or_else(|| json!("no greeting"))
    })
    .bind(|g: Value| succeed(json!(format!("{} world", g.as_str().unwrap()))));

    let env = Env::new().with("greeting", json!("hello"));
    let outcome = run(effect, env, options()).await;
    assert_eq!(outcome, Outcome::success(json!("hello world")));
}

// ============================================================================
// Telemetry
// ============================================================================

#[tokio::test]
async fn run_emits_a_start_stop_pair() {
    let sink = Arc::new(MemorySink::new());
    let opts = RunOptions::new()
        .with_config(Config::testing())
        .with_sink(sink.clone());

    let outcome = run(succeed(json!(1)), Env::new(), opts).await;
    assert!(outcome.is_success());

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_start());
    assert!(events[1].is_stop());
    assert_eq!(events[0].trace_id, events[1].trace_id);
    assert!(events[0].duration_ms.is_none());
    assert!(events[1].duration_ms.is_some());
    assert_eq!(events[1].status, Some(tarry::telemetry::RunStatus::Ok));
}

#[tokio::test]
async fn stop_event_reports_failures_with_a_bounded_summary() {
    let sink = Arc::new(MemorySink::new());
    let opts = RunOptions::new()
        .with_config(Config::testing())
        .with_sink(sink.clone());

    let long = "x".repeat(4096);
    let outcome = run(fail::<Value>(json!(long)), Env::new(), opts).await;
    assert!(outcome.is_failure());

    let events = sink.events();
    let stop = &events[1];
    assert_eq!(stop.status, Some(tarry::telemetry::RunStatus::Error));
    let summary = stop.summary.as_ref().expect("stop carries a summary");
    // the raw 4 KiB string never reaches the sink
    assert!(serde_json::to_string(summary).unwrap().len() < 1024);
}

#[tokio::test]
async fn disabling_telemetry_suppresses_event_construction_entirely() {
    let sink = Arc::new(MemorySink::new());
    let opts = RunOptions::new()
        .with_config(Config::testing().with_telemetry_enabled(false))
        .with_sink(sink.clone());

    let outcome = run(succeed(json!(1)), Env::new(), opts).await;
    assert!(outcome.is_success());
    assert!(sink.is_empty());
}
