
use axum::http::StatusCode;
use fixtures::{add_animal, request, setup, TestApp, ADMIN_ID};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &TestApp, method: &str, uri: &str, user: Option<i64>, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request(method, uri, user, body))
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create(app: &TestApp, user: i64, name: &str, animal_id: i64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/task",
        Some(user),
        Some(json!({"taskName": name, "repeatIntervHours": 24, "animalId": animal_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["taskId"].as_i64().unwrap()
}

#[tokio::test]
async fn task_routes_need_a_token() {
    let app = setup().await;
    let (status, body) = send(&app, "GET", "/task", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);
}

#[tokio::test]
async fn create_and_read_back() {
    let app = setup().await;
    add_animal(&app.db, 5, "Rex").await;

    let task_id = create(&app, 1, "Feed", 5).await;

    let (status, body) = send(&app, "GET", "/task", Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["taskId"], task_id);
    assert_eq!(tasks[0]["subject"], json!({"type": "animal", "id": 5}));
    assert_eq!(tasks[0]["complete"], false);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/task/byid?taskId={}", task_id),
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["taskName"], "Feed");
}

#[tokio::test]
async fn create_rejects_invalid_payloads() {
    let app = setup().await;

    for body in [
        json!({"taskName": "Feed", "repeatIntervHours": 24}),
        json!({"taskName": "Feed", "repeatIntervHours": 24, "animalId": 1, "enclosureId": 2}),
        json!({"taskName": "Feed", "repeatIntervHours": 0, "animalId": 1}),
        json!({"taskName": "", "repeatIntervHours": 24, "animalId": 1}),
        json!({"repeatIntervHours": 24, "animalId": 1}),
    ] {
        let (status, _) = send(&app, "POST", "/task", Some(1), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, body) = send(&app, "GET", "/task", Some(1), None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_task_is_rejected() {
    let app = setup().await;
    create(&app, 1, "Feed", 5).await;

    let (status, _) = send(
        &app,
        "POST",
        "/task",
        Some(1),
        Some(json!({"taskName": "Feed", "repeatIntervHours": 24, "animalId": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Same name for another user is fine.
    create(&app, 3, "Feed", 5).await;
}

#[tokio::test]
async fn other_users_tasks_are_invisible() {
    let app = setup().await;
    let task_id = create(&app, 1, "Feed", 5).await;

    let (status, _) = send(
        &app,
        "GET",
        &format!("/task/byid?taskId={}", task_id),
        Some(3),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/task?taskId={}", task_id),
        Some(3),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/task/bysubject?animalId=5", Some(3), None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn update_complete_and_subject_then_delete() {
    let app = setup().await;
    let task_id = create(&app, 1, "Feed", 5).await;

    let (status, _) = send(
        &app,
        "PUT",
        "/task",
        Some(1),
        Some(json!({
            "taskId": task_id,
            "taskName": "Feed well",
            "taskDesc": "Three crickets",
            "complete": true,
            "lastCompleted": "2026-10-01T08:00:00Z",
            "repeatIntervHours": 48
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "PUT",
        "/task/subject",
        Some(1),
        Some(json!({"taskId": task_id, "animalId": 0, "enclosureId": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/task/byid?taskId={}", task_id),
        Some(1),
        None,
    )
    .await;
    assert_eq!(body["taskName"], "Feed well");
    assert_eq!(body["complete"], true);
    assert_eq!(body["repeatIntervHours"], 48);
    assert_eq!(body["lastCompleted"], "2026-10-01T08:00:00Z");
    assert_eq!(body["subject"], json!({"type": "enclosure", "id": 8}));

    let (_, by_subject) = send(&app, "GET", "/task/bysubject?enclosureId=8", Some(1), None).await;
    assert_eq!(by_subject.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/task?taskId={}", task_id),
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/task/byid?taskId={}", task_id),
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subject_query_needs_exactly_one_id() {
    let app = setup().await;
    let (status, _) = send(
        &app,
        "GET",
        "/task/bysubject?animalId=1&enclosureId=2",
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/task/bysubject", Some(1), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_are_forbidden_to_regular_users() {
    let app = setup().await;
    let task_id = create(&app, 1, "Feed", 5).await;

    let (status, _) = send(
        &app,
        "GET",
        &format!("/admin/task/byid?taskId={}", task_id),
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PUT",
        "/admin/task/owner",
        Some(1),
        Some(json!({"taskId": task_id, "oldUserId": 1, "newUserId": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_reassign_and_manage_any_task() {
    let app = setup().await;
    let task_id = create(&app, 1, "Feed", 5).await;

    let (status, body) = send(&app, "GET", "/admin/task/byuser?userId=1", Some(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "PUT",
        "/admin/task/owner",
        Some(ADMIN_ID),
        Some(json!({"taskId": task_id, "oldUserId": 1, "newUserId": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Wrong previous owner.
    let (status, _) = send(
        &app,
        "PUT",
        "/admin/task/owner",
        Some(ADMIN_ID),
        Some(json!({"taskId": task_id, "oldUserId": 1, "newUserId": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/task", Some(3), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = send(&app, "GET", "/task", Some(1), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "POST",
        "/admin/task",
        Some(ADMIN_ID),
        Some(json!({"userId": 4, "taskName": "Clean", "repeatIntervHours": 168, "enclosureId": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created_id = body["taskId"].as_i64().unwrap();

    let (_, body) = send(&app, "GET", "/admin/task/bysubject?enclosureId=2", Some(ADMIN_ID), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/admin/task?taskId={}", created_id),
        Some(ADMIN_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/admin/task/byid?taskId={}", created_id),
        Some(ADMIN_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
