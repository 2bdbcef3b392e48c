//! The overdue trigger end to end: sweep, immediate answer, background push


use axum::http::StatusCode;
use chrono::{Duration, Utc};
use fixtures::{add_animal, add_enclosure, body_json, complete_task, request, setup, subscribe};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn overdue_task_is_reset_and_owner_notified() {
    let app = setup().await;
    add_animal(&app.db, 5, "Rex").await;
    subscribe(&app.subscriptions, 1, "https://push.example.com/phone").await;

    let created = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/task",
            Some(1),
            Some(json!({
                "taskName": "Feed",
                "taskDesc": "Two crickets",
                "repeatIntervHours": 24,
                "animalId": 5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let task_id = body_json(created).await["taskId"].as_i64().unwrap();
    complete_task(&app.db, task_id, Utc::now() - Duration::hours(25)).await;

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"tasksReset": 1}));

    let sent = app.transport.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    let (user_id, payload) = &sent[0];
    assert_eq!(*user_id, 1);
    assert_eq!(payload["title"], "Feed (Rex)");
    assert_eq!(payload["body"], "Two crickets");
    assert_eq!(payload["tag"], format!("task-{}", task_id));
    assert_eq!(payload["data"]["url"], format!("/tasks/{}", task_id));
    assert_eq!(payload["requireInteraction"], false);

    let task = app
        .router
        .oneshot(request(
            "GET",
            &format!("/task/byid?taskId={}", task_id),
            Some(1),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(task).await["complete"], false);
}

#[tokio::test]
async fn second_sweep_resets_nothing() {
    let app = setup().await;
    add_enclosure(&app.db, 3, "Vivarium").await;
    subscribe(&app.subscriptions, 1, "https://push.example.com/phone").await;

    let created = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/task",
            Some(1),
            Some(json!({"taskName": "Mist", "repeatIntervHours": 12, "enclosureId": 3})),
        ))
        .await
        .unwrap();
    let task_id = body_json(created).await["taskId"].as_i64().unwrap();
    complete_task(&app.db, task_id, Utc::now() - Duration::hours(13)).await;

    let first = app
        .router
        .clone()
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(body_json(first).await, json!({"tasksReset": 1}));
    app.transport.wait_for(1).await;

    let second = app
        .router
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await, json!({"tasksReset": 0}));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.transport.sent().len(), 1);
}

#[tokio::test]
async fn task_within_interval_is_left_alone() {
    let app = setup().await;
    add_animal(&app.db, 5, "Rex").await;
    subscribe(&app.subscriptions, 1, "https://push.example.com/phone").await;

    let created = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/task",
            Some(1),
            Some(json!({"taskName": "Feed", "repeatIntervHours": 24, "animalId": 5})),
        ))
        .await
        .unwrap();
    let task_id = body_json(created).await["taskId"].as_i64().unwrap();
    complete_task(&app.db, task_id, Utc::now() - Duration::hours(23)).await;

    let response = app
        .router
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"tasksReset": 0}));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(app.transport.sent().is_empty());
}

#[tokio::test]
async fn sweep_failure_is_a_server_error() {
    let app = setup().await;
    app.db.execute("DROP TABLE task_subjects").await.unwrap();
    app.db
        .execute(
            "INSERT INTO tasks (task_name, task_desc, complete, last_completed, repeat_interv_hours) \
             VALUES ('Feed', '', 1, 0, 1)",
        )
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Rolled back: the task is still complete.
    let remaining = app
        .db
        .execute("UPDATE tasks SET task_name = task_name WHERE complete = 1")
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn reset_count_includes_tasks_nobody_is_notified_about() {
    let app = setup().await;
    subscribe(&app.subscriptions, 1, "https://push.example.com/phone").await;
    // No owner or subject rows: the task flips but produces no notification.
    app.db
        .execute(
            "INSERT INTO tasks (task_name, task_desc, complete, last_completed, repeat_interv_hours) \
             VALUES ('Orphan', '', 1, 0, 1)",
        )
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(request("GET", "/task/check-completion", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"tasksReset": 1}));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(app.transport.sent().is_empty());
}
