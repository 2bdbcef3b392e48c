
use critterkeep_db::{NewPushSubscription, PushSubscriptionRepository};
use fixtures::{setup, setup_file_backed};

fn subscription(user_id: i64, endpoint: &str, user_agent: &str) -> NewPushSubscription {
    NewPushSubscription {
        user_id,
        endpoint: endpoint.to_string(),
        p256dh: "BPk3-public-key".to_string(),
        auth: "auth-secret".to_string(),
        user_agent: user_agent.to_string(),
    }
}

#[tokio::test]
async fn resubscribe_refreshes_instead_of_duplicating() {
    let (_, _, subs) = setup().await;

    let (first, created) = subs
        .create_or_refresh(subscription(1, "https://push.example/abc", "Firefox"))
        .await
        .unwrap();
    assert!(created);

    let mut rotated = subscription(1, "https://push.example/abc", "Chrome");
    rotated.p256dh = "BRotated-public-key".to_string();
    let (second, created) = subs.create_or_refresh(rotated).await.unwrap();
    assert!(!created);
    // Keys from the first registration are kept.
    assert_eq!(second.p256dh, first.p256dh);
    assert_eq!(second.subscription_id, first.subscription_id);
    assert_eq!(second.user_agent, "Chrome");
    assert!(second.last_used >= first.last_used);
    assert_eq!(second.created_at, first.created_at);

    let listed = subs.list_by_owner(1).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resubscribes_keep_one_row() {
    let (_dir, _, _, subs) = setup_file_backed(8).await;

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let subs = subs.clone();
            tokio::spawn(async move {
                let mut created = 0;
                for round in 0..20 {
                    let agent = format!("worker {} round {}", worker, round);
                    let (_, fresh) = subs
                        .create_or_refresh(subscription(1, "https://push.example/shared", &agent))
                        .await
                        .unwrap();
                    created += usize::from(fresh);
                }
                created
            })
        })
        .collect();

    let mut created = 0;
    for worker in workers {
        created += worker.await.unwrap();
    }

    assert_eq!(created, 1);
    assert_eq!(subs.list_by_owner(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_endpoint_for_another_user_is_separate() {
    let (_, _, subs) = setup().await;

    subs.create_or_refresh(subscription(1, "https://push.example/abc", "Firefox"))
        .await
        .unwrap();
    let (_, created) = subs
        .create_or_refresh(subscription(2, "https://push.example/abc", "Firefox"))
        .await
        .unwrap();
    assert!(created);
    assert_eq!(subs.list_by_owner(1).await.unwrap().len(), 1);
    assert_eq!(subs.list_by_owner(2).await.unwrap().len(), 1);
    assert!(subs.list_by_owner(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn evict_is_idempotent() {
    let (_, _, subs) = setup().await;

    let (sub, _) = subs
        .create_or_refresh(subscription(1, "https://push.example/gone", "Safari"))
        .await
        .unwrap();
    assert!(subs.evict(sub.subscription_id).await.unwrap());
    assert!(!subs.evict(sub.subscription_id).await.unwrap());
    assert!(subs.list_by_owner(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_by_endpoint_reports_missing() {
    let (_, _, subs) = setup().await;

    subs.create_or_refresh(subscription(1, "https://push.example/a", "Firefox"))
        .await
        .unwrap();
    assert!(!subs
        .delete_by_endpoint(2, "https://push.example/a")
        .await
        .unwrap());
    assert!(subs
        .delete_by_endpoint(1, "https://push.example/a")
        .await
        .unwrap());
    assert!(!subs
        .delete_by_endpoint(1, "https://push.example/a")
        .await
        .unwrap());
}

#[tokio::test]
async fn touch_last_used_keeps_the_row() {
    let (_, _, subs) = setup().await;

    let (sub, _) = subs
        .create_or_refresh(subscription(1, "https://push.example/a", "Firefox"))
        .await
        .unwrap();
    subs.touch_last_used(sub.subscription_id).await.unwrap();
    let listed = subs.list_by_owner(1).await.unwrap();
    assert!(listed[0].last_used >= sub.last_used);
}
