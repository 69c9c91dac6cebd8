mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{june, TestApp};

#[tokio::test]
async fn creates_and_lists_notifications() -> Result<()> {
    let app = TestApp::at(june(5));

    let (status, res) = app
        .post(
            "/api/notifications",
            json!({ "title": "Attendance", "message": "Asha missed class", "type": "attendance" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(res["data"]["type"], "attendance");
    assert_eq!(res["data"]["isRead"], false);

    let (status, res) = app
        .post("/api/notifications", json!({ "title": "Hello", "message": "Welcome" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(res["data"]["type"], "other");

    let (status, res) = app.get("/api/notifications").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["pagination"]["total"], 2);
    assert_eq!(res["data"]["notifications"].as_array().unwrap().len(), 2);

    let (_, res) = app.get("/api/notifications?type=attendance").await?;
    assert_eq!(res["data"]["pagination"]["total"], 1);

    let (status, _) = app.get("/api/notifications?type=birthday").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn validates_new_notifications() -> Result<()> {
    let app = TestApp::at(june(5));

    let (status, res) = app.post("/api/notifications", json!({ "title": "No body" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["message"], "Title and message are required");

    let (status, _) = app
        .post(
            "/api/notifications",
            json!({ "title": "Overdue", "message": "manual", "type": "overdue_payment" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/notifications",
            json!({
                "title": "Paid",
                "message": "two ids, one name",
                "type": "payment_received",
                "studentIds": [Uuid::new_v4(), Uuid::new_v4()],
                "studentNames": ["Asha"]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn read_state_and_deletion() -> Result<()> {
    let app = TestApp::at(june(5));
    let mut ids = Vec::new();
    for n in 0..3 {
        let (_, res) = app
            .post(
                "/api/notifications",
                json!({ "title": format!("Note {}", n), "message": "body" }),
            )
            .await?;
        ids.push(res["data"]["id"].as_str().unwrap().to_string());
    }

    let (_, res) = app.get("/api/notifications/unread-count").await?;
    assert_eq!(res["data"]["count"], 3);

    let (status, res) = app
        .call(Method::PATCH, &format!("/api/notifications/{}/read", ids[0]), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["isRead"], true);

    let (_, res) = app.get("/api/notifications?isRead=false").await?;
    assert_eq!(res["data"]["pagination"]["total"], 2);

    let (status, res) = app.call(Method::PATCH, "/api/notifications/read-all", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["updated"], 2);

    let (_, res) = app.get("/api/notifications/unread-count").await?;
    assert_eq!(res["data"]["count"], 0);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/notifications/{}", ids[1]), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/notifications/{}", ids[1]), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn other_operators_cannot_touch_my_notifications() -> Result<()> {
    let app = TestApp::at(june(5));
    let (_, res) = app
        .post("/api/notifications", json!({ "title": "Mine", "message": "private" }))
        .await?;
    let id = res["data"]["id"].as_str().unwrap().to_string();

    let intruder = common::token_for(Uuid::new_v4());
    let (status, _) = app
        .call_with_token(Some(&intruder), Method::PATCH, &format!("/api/notifications/{}/read", id), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call_with_token(Some(&intruder), Method::DELETE, &format!("/api/notifications/{}", id), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, res) = app
        .call_with_token(Some(&intruder), Method::GET, "/api/notifications", None)
        .await?;
    assert_eq!(res["data"]["pagination"]["total"], 0);

    let (_, res) = app.get("/api/notifications/unread-count").await?;
    assert_eq!(res["data"]["count"], 1);
    Ok(())
}
