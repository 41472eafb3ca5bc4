use leakwatch::{CollectingReporter, LeakRegistry, Provenance, TokioScheduler};
use std::sync::Arc;
use std::time::Duration;

struct Connection;

#[tokio::test(start_paused = true)]
async fn test_reevaluation_on_tokio_timer() {
    let reports = CollectingReporter::new();
    let registry = LeakRegistry::builder()
        .scheduler(TokioScheduler::current().unwrap())
        .reporter(reports.clone())
        .build()
        .unwrap();

    let a = Arc::new(Connection);
    let b = Arc::new(Connection);
    registry.track(&a, Provenance::new("net/pool.rs", "connect", 31));
    registry.track(&b, Provenance::new("net/pool.rs", "connect", 31));

    tokio::time::sleep(Duration::from_millis(499)).await;
    assert!(reports.is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    for _ in 0..10 {
        if registry.stats().reevaluations == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let all = reports.reports();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].lines()[1], "Object Connection created at: pool.rs:31 connect");
}
