use nutrigen::session::{Phase, Ticket, Workflow};
use serde_json::json;

#[tokio::test]
async fn starts_in_input() {
    let wf: Workflow<String> = Workflow::new();
    let snap = wf.snapshot().await;
    assert_eq!(snap.phase, Phase::Input);
    assert_eq!(snap.ticket, Ticket(0));
    assert_eq!(snap.error, None);
    assert_eq!(wf.current().await, None);
}

#[tokio::test]
async fn success_moves_to_ready() {
    let wf = Workflow::new();
    let t = wf.begin().await;
    assert_eq!(wf.snapshot().await.phase, Phase::Generating);

    assert!(wf.finish(t, Ok("plan".to_string())).await);
    assert_eq!(wf.snapshot().await.phase, Phase::Ready("plan".to_string()));
    assert_eq!(wf.current().await.as_deref(), Some("plan"));
}

#[tokio::test]
async fn failure_returns_to_input_with_error() {
    let wf: Workflow<String> = Workflow::new();
    let t = wf.begin().await;
    assert!(wf.finish(t, Err("识别失败".to_string())).await);

    let snap = wf.snapshot().await;
    assert_eq!(snap.phase, Phase::Input);
    assert_eq!(snap.error.as_deref(), Some("识别失败"));

    // a new attempt clears the error
    wf.begin().await;
    assert_eq!(wf.snapshot().await.error, None);
}

#[tokio::test]
async fn superseded_results_are_dropped() {
    let wf = Workflow::new();
    let old = wf.begin().await;
    let new = wf.begin().await;
    assert!(new > old);

    assert!(!wf.finish(old, Ok("stale".to_string())).await);
    assert_eq!(wf.snapshot().await.phase, Phase::Generating);

    assert!(wf.finish(new, Ok("fresh".to_string())).await);
    assert!(!wf.finish(old, Err("late failure".to_string())).await);
    assert_eq!(wf.current().await.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn reset_invalidates_in_flight_work() {
    let wf = Workflow::new();
    let t = wf.begin().await;
    let after = wf.reset().await;
    assert!(after > t);
    assert!(!wf.finish(t, Ok(1_u32)).await);
    assert_eq!(wf.snapshot().await.phase, Phase::Input);
}

#[tokio::test]
async fn snapshot_serializes_flat() {
    let wf = Workflow::new();
    let t = wf.begin().await;
    assert_eq!(
        serde_json::to_value(wf.snapshot().await).unwrap(),
        json!({"ticket": 1, "phase": "generating", "error": null})
    );
    wf.finish(t, Ok(json!({"title": "x"}))).await;
    assert_eq!(
        serde_json::to_value(wf.snapshot().await).unwrap(),
        json!({"ticket": 1, "phase": "ready", "value": {"title": "x"}, "error": null})
    );
}
