//! Racing terminators from multiple threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use deferred_response::deferred::{Operation, Outcome, ResponseState};
use deferred_response::{DeferredResponse, TimeoutScheduler, TokioScheduler};

const ROUNDS: usize = 200;

fn scheduler() -> Arc<dyn TimeoutScheduler> {
    Arc::new(TokioScheduler::current())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_workers_race_to_resume() {
    let scheduler = scheduler();

    for _ in 0..ROUNDS {
        let response: DeferredResponse<&'static str> = DeferredResponse::new(scheduler.clone());
        response.set_timeout(Duration::from_secs(60)).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let results: Vec<(&str, bool)> = ["A", "B"]
            .into_iter()
            .map(|value| {
                let worker = response.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (value, worker.resume(value).is_ok())
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let winners: Vec<&str> = results.iter().filter(|(_, ok)| *ok).map(|(v, _)| *v).collect();
        assert_eq!(winners.len(), 1, "exactly one producer must win");
        assert_eq!(response.outcome().unwrap().value(), Some(&winners[0]));
        assert_eq!(response.state(), ResponseState::Completed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mixed_terminators_exactly_one_wins() {
    let scheduler = scheduler();

    for round in 0..ROUNDS {
        let response: DeferredResponse<usize> = DeferredResponse::new(scheduler.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let n = notified.clone();
        response.on_resolved(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });
        if round % 2 == 0 {
            response.suspend().unwrap();
        }

        let threads = 6;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let producer = response.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if i % 3 == 0 {
                        producer.cancel()
                    } else {
                        producer.resume(i)
                    }
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(err.is_already_resolved());
            assert!(matches!(err.operation(), Operation::Resume | Operation::Cancel));
            assert_eq!(err.state(), response.state());
        }

        assert!(response.is_done());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_races_producers() {
    let scheduler = scheduler();

    for _ in 0..ROUNDS {
        let response: DeferredResponse<u32> = DeferredResponse::new(scheduler.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let n = notified.clone();
        response.on_resolved(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });

        response.set_timeout(Duration::from_micros(50)).unwrap();
        let producer = response.clone();
        let resumed = thread::spawn(move || producer.resume(7).is_ok())
            .join()
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), response.wait())
            .await
            .expect("response must resolve");

        match &*outcome {
            Outcome::Completed(7) => assert!(resumed),
            Outcome::TimedOut(_) => assert!(!resumed),
            other => panic!("unexpected outcome {}", other.kind()),
        }
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_reschedule_never_double_fires() {
    let scheduler = Arc::new(TokioScheduler::current());
    let response: DeferredResponse<u32> = DeferredResponse::new(scheduler.clone());
    let notified = Arc::new(AtomicUsize::new(0));
    let n = notified.clone();
    response.on_resolved(move |_| {
        n.fetch_add(1, Ordering::SeqCst);
    });

    response.set_timeout(Duration::from_millis(1)).unwrap();
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let r = response.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    if r.set_timeout(Duration::from_micros(200)).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let outcome = tokio::time::timeout(Duration::from_secs(5), response.wait())
        .await
        .expect("response must time out");
    assert!(outcome.is_timed_out());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.armed(), 0);
}
