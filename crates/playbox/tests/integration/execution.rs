use playbox::{FailureDetail, FaultKind, RunRequest, RunStatus, Snippet, SubmitError};

use super::{fixture_source, harness};

#[tokio::test]
async fn sum_snippet_prints_fifteen() {
    let (registry, scheduler) = harness(4);
    registry
        .register(
            Snippet::new("sum", fixture_source("sum.play"))
                .with_entry_point("main")
                .with_timeout_ms(1_000),
        )
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("sum"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stdout, b"15");
    assert_eq!(result.stderr, b"");
}

#[tokio::test]
async fn unregistered_snippet_is_not_found() {
    let (_registry, scheduler) = harness(4);

    let err = scheduler
        .run(RunRequest::new("ghost"))
        .await
        .expect_err("ghost is not registered");

    assert!(matches!(err, SubmitError::NotFound(id) if id == "ghost"));
}

#[tokio::test]
async fn zero_output_run_has_empty_buffers() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("quiet", "fn main\nend"))
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("quiet"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn explicit_fault_is_failed_with_detail() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("faulty", "fn main\nprint partial\nfail deliberate\nend"))
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("faulty"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Failed);
    // Output produced before the fault is kept
    assert_eq!(result.stdout, b"partial");
    match result.failure {
        Some(FailureDetail::RuntimeFault { kind, message }) => {
            assert_eq!(kind, FaultKind::Explicit);
            assert_eq!(message, "deliberate");
        }
        other => panic!("expected explicit fault, got {other:?}"),
    }
}

#[tokio::test]
async fn memory_cap_exceeded_is_failed_with_detail() {
    let (registry, scheduler) = harness(4);
    registry
        .register(
            Snippet::new("greedy", "fn main\nalloc 1048576\nend").with_memory_cap_bytes(1024),
        )
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("greedy"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.failure,
        Some(FailureDetail::ResourceExceeded { cap_bytes: 1024, .. })
    ));
}

#[tokio::test]
async fn missing_entry_point_is_failed() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("askew", "fn main\nend").with_entry_point("start"))
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("askew"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.failure,
        Some(FailureDetail::RuntimeFault {
            kind: FaultKind::UnknownFunction,
            ..
        })
    ));
}

#[tokio::test]
async fn malformed_source_is_failed_at_run_time() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("garbled", "this is not a snippet"))
        .expect("source is not validated at registration");

    let result = scheduler
        .run(RunRequest::new("garbled"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.failure,
        Some(FailureDetail::RuntimeFault {
            kind: FaultKind::Parse,
            ..
        })
    ));
}

#[tokio::test]
async fn tour_snippet_exercises_every_instruction() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("tour", fixture_source("tour.play")))
        .expect("registration should succeed");

    let result = scheduler
        .run(RunRequest::new("tour"))
        .await
        .expect("run should be admitted");

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stdout, b"starting6done");
    assert_eq!(result.stderr, b"aside");
}
