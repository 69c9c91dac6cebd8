mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{june, TestApp};

fn payment_body(student_id: Uuid, month: &str) -> Value {
    json!({
        "studentId": student_id,
        "paymentDate": "2025-06-12",
        "paymentTime": "10:30",
        "paymentMode": "Cash",
        "paymentMonth": month,
        "amount": 1500
    })
}

#[tokio::test]
async fn records_a_payment_with_embedded_student() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;

    let mut body = payment_body(asha, "2025-06");
    body["utrNumber"] = json!("UTR-IGNORED");
    let (status, res) = app.post("/api/billing", body).await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(res["success"], true);
    assert_eq!(res["message"], "Payment recorded successfully");
    assert_eq!(res["data"]["studentId"], asha.to_string());
    assert_eq!(res["data"]["paymentMonth"], "2025-06");
    assert_eq!(res["data"]["paymentDate"], "2025-06-12");
    assert_eq!(res["data"]["student"]["fullName"], "Asha Rao");
    // a reference number only sticks to online payments
    assert!(res["data"]["utrNumber"].is_null());
    Ok(())
}

#[tokio::test]
async fn keeps_utr_for_online_payments() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;

    let mut body = payment_body(asha, "2025-06");
    body["paymentMode"] = json!("Online");
    body["utrNumber"] = json!("UTR-778812");
    body["paymentDate"] = json!("2025-06-12T08:15:00Z");
    let (status, res) = app.post("/api/billing", body).await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(res["data"]["utrNumber"], "UTR-778812");
    assert_eq!(res["data"]["paymentDate"], "2025-06-12");
    Ok(())
}

#[tokio::test]
async fn rejects_incomplete_or_invalid_payments() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;

    let mut missing = payment_body(asha, "2025-06");
    missing.as_object_mut().unwrap().remove("paymentTime");
    let (status, res) = app.post("/api/billing", missing).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["message"], "All required fields must be provided");

    let (status, res) = app.post("/api/billing", payment_body(asha, "2025-6")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["message"], "Payment month must be in YYYY-MM format");

    let mut negative = payment_body(asha, "2025-06");
    negative["amount"] = json!(-10);
    let (status, _) = app.post("/api/billing", negative).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut cheque = payment_body(asha, "2025-06");
    cheque["paymentMode"] = json!("Cheque");
    let (status, res) = app.post("/api/billing", cheque).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res["message"].as_str().unwrap().contains("Google Pay"));

    let (status, res) = app
        .call(Method::POST, "/api/billing", None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn students_of_other_operators_are_not_found() -> Result<()> {
    let app = TestApp::at(june(15));
    let foreign = app.student_of(Uuid::new_v4(), "Someone Else").await;

    let (status, res) = app.post("/api/billing", payment_body(foreign, "2025-06")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(res["message"], "Student not found or unauthorized");

    let (status, _) = app.post("/api/billing", payment_body(Uuid::new_v4(), "2025-06")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn lists_paginated_and_filtered() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;
    let bilal = app.student("Bilal Khan").await;

    for month in ["2025-04", "2025-05", "2025-06"] {
        app.post("/api/billing", payment_body(asha, month)).await?;
    }
    app.post("/api/billing", payment_body(bilal, "2025-06")).await?;

    let (status, res) = app.get("/api/billing?page=1&limit=3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["billing"].as_array().unwrap().len(), 3);
    let pagination = &res["data"]["pagination"];
    assert_eq!(pagination["total"], 4);
    assert_eq!(pagination["totalPages"], 2);
    assert_eq!(pagination["currentPage"], 1);
    assert_eq!(pagination["hasNextPage"], true);
    assert_eq!(pagination["hasPrevPage"], false);

    let (_, res) = app.get("/api/billing?paymentMonth=2025-06").await?;
    let rows = res["data"]["billing"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["paymentMonth"] == "2025-06"));
    assert!(rows.iter().all(|r| r["student"]["email"].is_string()));

    let (_, res) = app.get(&format!("/api/billing?studentId={}", bilal)).await?;
    assert_eq!(res["data"]["pagination"]["total"], 1);

    let (status, _) = app.get("/api/billing?paymentMonth=June").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // another operator sees nothing
    let other = common::token_for(Uuid::new_v4());
    let (_, res) = app
        .call_with_token(Some(&other), Method::GET, "/api/billing", None)
        .await?;
    assert_eq!(res["data"]["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn updates_and_deletes_owned_payments() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;
    let (_, created) = app.post("/api/billing", payment_body(asha, "2025-06")).await?;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, res) = app
        .call(
            Method::PUT,
            &format!("/api/billing/{}", id),
            Some(json!({ "paymentMode": "Online", "utrNumber": "UTR-1", "amount": 1800 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["message"], "Payment updated successfully");
    assert_eq!(res["data"]["paymentMode"], "Online");
    assert_eq!(res["data"]["utrNumber"], "UTR-1");
    assert_eq!(res["data"]["paymentTime"], "10:30");

    // switching away from online drops the reference number
    let (_, res) = app
        .call(Method::PUT, &format!("/api/billing/{}", id), Some(json!({ "paymentMode": "Paytm" })))
        .await?;
    assert!(res["data"]["utrNumber"].is_null());

    let other = common::token_for(Uuid::new_v4());
    let (status, _) = app
        .call_with_token(Some(&other), Method::DELETE, &format!("/api/billing/{}", id), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, res) = app.call(Method::DELETE, &format!("/api/billing/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["message"], "Payment deleted successfully");

    let (status, _) = app
        .call(Method::PUT, &format!("/api/billing/{}", id), Some(json!({ "amount": 1 })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::DELETE, "/api/billing/not-a-uuid", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn toggles_billing_management_per_student() -> Result<()> {
    let app = TestApp::at(june(15));
    let asha = app.student("Asha Rao").await;
    app.post("/api/billing", payment_body(asha, "2025-05")).await?;
    app.post("/api/billing", payment_body(asha, "2025-06")).await?;

    let uri = format!("/api/billing/student/{}/toggle", asha);
    let (status, res) = app.call(Method::PATCH, &uri, Some(json!({ "isActive": false }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["isActive"], false);
    assert_eq!(res["data"]["updatedCount"], 2);

    let (_, res) = app.get("/api/billing").await?;
    assert!(res["data"]["billing"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["isActive"] == false));

    let (_, res) = app.call(Method::PATCH, &uri, None).await?;
    assert_eq!(res["data"]["isActive"], true);

    let foreign = app.student_of(Uuid::new_v4(), "Someone Else").await;
    let (status, _) = app
        .call(Method::PATCH, &format!("/api/billing/student/{}/toggle", foreign), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
