//! Fan-out, eviction and dispatch behaviour against an in-memory registry

mod fixtures;

use critterkeep_db::PushSubscriptionRepository;
use critterkeep_push::{BatchReport, NotificationDispatcher};
use fixtures::{reset_event, sender, setup_registry, subscribe, RecordingTransport, Reply};

const PHONE: &str = "https://push.example.com/phone";
const LAPTOP: &str = "https://push.example.com/laptop";

#[tokio::test]
async fn gone_subscription_is_evicted_and_not_retried() {
    let (_db, registry) = setup_registry().await;
    subscribe(&registry, 1, PHONE).await;
    subscribe(&registry, 1, LAPTOP).await;

    let transport = RecordingTransport::new();
    transport.reply(LAPTOP, Reply::Status(410));
    let sender = sender(transport.clone(), registry.clone());

    let report = sender.deliver_batch(vec![reset_event(7, 1)]).await;
    assert_eq!(
        report,
        BatchReport {
            delivered: 1,
            gone: 1,
            ..BatchReport::default()
        }
    );

    let remaining = registry.list_by_owner(1).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].endpoint, PHONE);

    sender.deliver_batch(vec![reset_event(8, 1)]).await;
    assert_eq!(transport.sent_to(LAPTOP), 1);
    assert_eq!(transport.sent_to(PHONE), 2);
}

#[tokio::test]
async fn gone_subscription_is_skipped_for_later_events_in_same_batch() {
    let (_db, registry) = setup_registry().await;
    subscribe(&registry, 1, LAPTOP).await;

    let transport = RecordingTransport::new();
    transport.reply(LAPTOP, Reply::Status(404));
    let sender = sender(transport.clone(), registry);

    let report = sender
        .deliver_batch(vec![reset_event(7, 1), reset_event(8, 1)])
        .await;
    assert_eq!(report.gone, 1);
    assert_eq!(transport.sent_to(LAPTOP), 1);
}

#[tokio::test]
async fn failures_stay_with_their_owner() {
    let (_db, registry) = setup_registry().await;
    let healthy = "https://push.example.com/owner-1";
    let rejecting = "https://push.example.com/owner-2";
    let unreachable = "https://push.example.com/owner-3";
    subscribe(&registry, 1, healthy).await;
    subscribe(&registry, 2, rejecting).await;
    subscribe(&registry, 3, unreachable).await;

    let transport = RecordingTransport::new();
    transport.reply(rejecting, Reply::Status(500));
    transport.reply(unreachable, Reply::Unreachable);
    let sender = sender(transport.clone(), registry.clone());

    let report = sender
        .deliver_batch(vec![reset_event(10, 1), reset_event(20, 2), reset_event(30, 3)])
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.gone, 0);

    // Transient failures never evict.
    assert_eq!(registry.list_by_owner(2).await.unwrap().len(), 1);
    assert_eq!(registry.list_by_owner(3).await.unwrap().len(), 1);

    let delivered: Vec<_> = transport
        .sent()
        .into_iter()
        .filter(|(endpoint, _)| endpoint == healthy)
        .collect();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1["tag"], "task-10");
}

#[tokio::test]
async fn each_owner_only_receives_own_tasks() {
    let (_db, registry) = setup_registry().await;
    subscribe(&registry, 1, PHONE).await;
    subscribe(&registry, 2, LAPTOP).await;

    let transport = RecordingTransport::new();
    let sender = sender(transport.clone(), registry);

    sender
        .deliver_batch(vec![reset_event(10, 1), reset_event(20, 2), reset_event(11, 1)])
        .await;

    let mut phone_tags: Vec<String> = transport
        .sent()
        .into_iter()
        .filter(|(endpoint, _)| endpoint == PHONE)
        .map(|(_, payload)| payload["tag"].as_str().unwrap().to_string())
        .collect();
    phone_tags.sort();
    assert_eq!(phone_tags, vec!["task-10", "task-11"]);

    let laptop: Vec<_> = transport
        .sent()
        .into_iter()
        .filter(|(endpoint, _)| endpoint == LAPTOP)
        .collect();
    assert_eq!(laptop.len(), 1);
    assert_eq!(laptop[0].1["data"]["taskId"], 20);
}

#[tokio::test]
async fn owner_without_subscriptions_is_a_no_op() {
    let (_db, registry) = setup_registry().await;
    let transport = RecordingTransport::new();
    let sender = sender(transport.clone(), registry);

    let report = sender.deliver_batch(vec![reset_event(1, 99)]).await;
    assert_eq!(report, BatchReport::default());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn delivery_touches_last_used() {
    let (db, registry) = setup_registry().await;
    let sub = subscribe(&registry, 1, PHONE).await;
    db.execute(&format!(
        "UPDATE push_subscriptions SET last_used = 0 WHERE subscription_id = {}",
        sub.subscription_id
    ))
    .await
    .unwrap();

    let sender = sender(RecordingTransport::new(), registry.clone());
    sender.deliver_batch(vec![reset_event(1, 1)]).await;

    let stored = &registry.list_by_owner(1).await.unwrap()[0];
    assert!(stored.last_used.timestamp() > 0);
}

#[tokio::test]
async fn dispatcher_delivers_in_background() {
    let (_db, registry) = setup_registry().await;
    subscribe(&registry, 1, PHONE).await;

    let transport = RecordingTransport::new();
    let (dispatcher, worker) =
        NotificationDispatcher::spawn(sender(transport.clone(), registry), 4);

    assert!(dispatcher.submit(vec![reset_event(7, 1)]));
    drop(dispatcher);
    worker.await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1["title"], "Feed (Rex)");
    assert_eq!(sent[0].1["tag"], "task-7");
}

#[tokio::test]
async fn dispatcher_drops_batches_when_queue_is_full() {
    let (_db, registry) = setup_registry().await;
    subscribe(&registry, 1, PHONE).await;

    let transport = RecordingTransport::new();
    let (dispatcher, worker) =
        NotificationDispatcher::spawn(sender(transport.clone(), registry), 1);

    // Single-threaded runtime: the worker cannot drain before we yield.
    assert!(dispatcher.submit(vec![reset_event(1, 1)]));
    assert!(!dispatcher.submit(vec![reset_event(2, 1)]));

    drop(dispatcher);
    worker.await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1["tag"], "task-1");
}
