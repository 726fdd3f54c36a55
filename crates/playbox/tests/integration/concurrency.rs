use std::sync::Arc;
use std::time::Duration;

use playbox::{RunRequest, RunStatus, Snippet, SubmitError};

use super::{fixture_source, harness};

#[tokio::test]
async fn cap_limits_simultaneous_running_runs() {
    let cap = 2;
    let (registry, scheduler) = harness(cap);
    registry
        .register(Snippet::new("napper", fixture_source("napper.play")).with_timeout_ms(2_000))
        .unwrap();

    let mut joins = Vec::new();
    for _ in 0..cap + 1 {
        let scheduler = Arc::clone(&scheduler);
        joins.push(tokio::spawn(async move {
            scheduler.run(RunRequest::new("napper")).await
        }));
    }

    // While the first wave is sleeping, the extra request must be queued,
    // never running.
    let mut saw_queued = false;
    for _ in 0..50 {
        assert!(scheduler.running() <= cap);
        if scheduler.queued() == 1 {
            saw_queued = true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(saw_queued, "the surplus request never appeared in the queue");

    for join in joins {
        let result = join.await.unwrap().unwrap();
        assert_eq!(result.status, RunStatus::Completed);
    }
    assert_eq!(scheduler.running(), 0);
    assert_eq!(scheduler.queued(), 0);
}

#[tokio::test]
async fn queued_request_is_admitted_when_a_slot_frees() {
    let (registry, scheduler) = harness(1);
    registry
        .register(Snippet::new("napper", "fn main\nsleep 100\nend").with_timeout_ms(2_000))
        .unwrap();
    registry
        .register(Snippet::new("quick", "fn main\nprint x\nend"))
        .unwrap();

    let occupant = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(RunRequest::new("napper")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Blocks in the queue until the napper finishes, then completes
    let result = scheduler.run(RunRequest::new("quick")).await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stdout, b"x");

    occupant.await.unwrap().unwrap();
}

#[tokio::test]
async fn queue_wait_expiry_is_a_queue_timeout() {
    let (registry, scheduler) = harness(1);
    registry
        .register(Snippet::new("napper", "fn main\nsleep 1000\nend").with_timeout_ms(5_000))
        .unwrap();

    let occupant = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(RunRequest::new("napper")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // test_config sets queue_wait_ms = 500, well under the occupant's nap
    let err = scheduler
        .run(RunRequest::new("napper"))
        .await
        .expect_err("no slot frees within the queue wait");
    assert!(matches!(err, SubmitError::QueueTimeout { .. }));

    let result = occupant.await.unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Completed);
}

#[tokio::test]
async fn every_submission_gets_exactly_one_terminal_result() {
    let (registry, scheduler) = harness(4);
    registry
        .register(Snippet::new("quick", "fn main\nprint .\nend"))
        .unwrap();

    let mut joins = Vec::new();
    for _ in 0..20 {
        let scheduler = Arc::clone(&scheduler);
        joins.push(tokio::spawn(async move {
            scheduler.run(RunRequest::new("quick")).await
        }));
    }

    let mut terminal = 0;
    for join in joins {
        let result = join.await.unwrap().unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        terminal += 1;
    }
    assert_eq!(terminal, 20);
}
