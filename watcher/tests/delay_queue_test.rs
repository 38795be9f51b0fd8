//! Delay-queue behavior against a live Redis broker.
//!
//! These tests need a broker at REDIS_URL (default localhost) and are
//! ignored by default. Run with:
//! `cargo test --test delay_queue_test -- --ignored`

use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use sei_watcher::config::AppConfig;
use sei_watcher::infrastructure::queue::{DelayQueue, SubmitOpts};

async fn connect() -> Option<DelayQueue> {
    let config = AppConfig::from_env();
    match DelayQueue::connect(&config).await {
        Ok(queue) => Some(queue),
        Err(e) => {
            println!("Skipping: broker unavailable ({})", e);
            None
        }
    }
}

fn unique_queue_name() -> String {
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn test_immediate_item_is_reserved_once() {
    let Some(queue) = connect().await else { return };
    let name = unique_queue_name();

    queue
        .submit(&name, json!({"jobId": "job-a"}), SubmitOpts::default())
        .await
        .unwrap();

    let item = queue.reserve_next(&name).await.unwrap().expect("item ready");
    assert_eq!(item.job_id(), Some("job-a"));

    // The item moved to the active set; nothing else is waiting
    assert!(queue.reserve_next(&name).await.unwrap().is_none());
    let counts = queue.counts(&name).await.unwrap();
    assert_eq!(counts.active, 1);
    assert_eq!(counts.waiting, 0);

    queue.complete(&name, &item).await.unwrap();
    let counts = queue.counts(&name).await.unwrap();
    assert_eq!(counts.active, 0);

    queue.obliterate(&name).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_delayed_item_becomes_ready_after_its_fire_time() {
    let Some(queue) = connect().await else { return };
    let name = unique_queue_name();

    queue
        .submit(
            &name,
            json!({"jobId": "job-delayed"}),
            SubmitOpts {
                delay_ms: Some(300),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(queue.reserve_next(&name).await.unwrap().is_none());
    assert_eq!(queue.counts(&name).await.unwrap().delayed, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let item = queue.reserve_next(&name).await.unwrap().expect("due item");
    assert_eq!(item.job_id(), Some("job-delayed"));

    queue.complete(&name, &item).await.unwrap();
    queue.obliterate(&name).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_repeating_entry_rearms_after_each_fire() {
    let Some(queue) = connect().await else { return };
    let name = unique_queue_name();

    queue
        .submit(
            &name,
            json!({"jobId": "job-repeat"}),
            SubmitOpts {
                delay_ms: Some(200),
                repeat_every_ms: Some(200),
                repeat_key: Some("job-repeat".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(queue.counts(&name).await.unwrap().repeating, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let first = queue.reserve_next(&name).await.unwrap().expect("first fire");
    queue.complete(&name, &first).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let second = queue.reserve_next(&name).await.unwrap().expect("second fire");
    queue.complete(&name, &second).await.unwrap();

    // Two distinct fires of the same repetition spec
    assert_ne!(first.id, second.id);
    assert_eq!(first.job_id(), second.job_id());

    // Cancelling the spec stops future fires
    assert!(queue.remove_repeating(&name, "job-repeat").await.unwrap());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(queue.reserve_next(&name).await.unwrap().is_none());

    queue.obliterate(&name).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_remove_by_job_clears_waiting_delayed_and_repeating() {
    let Some(queue) = connect().await else { return };
    let name = unique_queue_name();

    queue
        .submit(&name, json!({"jobId": "doomed"}), SubmitOpts::default())
        .await
        .unwrap();
    queue
        .submit(
            &name,
            json!({"jobId": "doomed"}),
            SubmitOpts {
                delay_ms: Some(60_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    queue
        .submit(
            &name,
            json!({"jobId": "doomed"}),
            SubmitOpts {
                delay_ms: Some(60_000),
                repeat_every_ms: Some(60_000),
                repeat_key: Some("doomed".to_string()),
            },
        )
        .await
        .unwrap();
    queue
        .submit(&name, json!({"jobId": "survivor"}), SubmitOpts::default())
        .await
        .unwrap();

    let removed = queue.remove_by_job(&name, "doomed").await.unwrap();
    assert_eq!(removed, 3);

    // The unrelated job is untouched
    let survivor = queue.reserve_next(&name).await.unwrap().expect("survivor");
    assert_eq!(survivor.job_id(), Some("survivor"));

    queue.complete(&name, &survivor).await.unwrap();
    queue.obliterate(&name).await.unwrap();

    let counts = queue.counts(&name).await.unwrap();
    assert_eq!(counts.waiting + counts.delayed + counts.repeating + counts.failed, 0);
}

#[tokio::test]
#[ignore]
async fn test_failed_items_land_on_the_failed_list() {
    let Some(queue) = connect().await else { return };
    let name = unique_queue_name();

    queue
        .submit(&name, json!({"jobId": "broken"}), SubmitOpts::default())
        .await
        .unwrap();

    let item = queue.reserve_next(&name).await.unwrap().unwrap();
    queue.fail(&name, &item, "analyzer exploded").await.unwrap();

    let failed = queue.list_failed(&name).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error, "analyzer exploded");
    assert_eq!(failed[0].item.job_id(), Some("broken"));

    queue.obliterate(&name).await.unwrap();
}
