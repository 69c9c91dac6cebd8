#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use coachdesk_api::auth::{generate_jwt, Claims};
use coachdesk_api::config::AppConfig;
use coachdesk_api::database::models::Student;
use coachdesk_api::database::{MemoryStore, NotificationStore, PaymentLedger, StoreHealth, StudentDirectory};
use coachdesk_api::services::FixedClock;
use coachdesk_api::types::Period;
use coachdesk_api::{app, AppState};

pub const SECRET: &str = "integration-test-secret";

/// In-process API over a fresh memory store, with a pinned clock and one signed-in operator
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub operator: Uuid,
    pub token: String,
}

/// Noon UTC on the given day of June 2025
pub fn june(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
}

impl TestApp {
    pub fn at(now: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::over(now, store.clone(), store)
    }

    /// Serve from `backend`, which wraps `store`; helpers seed and inspect `store` directly
    pub fn over<S>(now: DateTime<Utc>, backend: Arc<S>, store: Arc<MemoryStore>) -> Self
    where
        S: StudentDirectory + PaymentLedger + NotificationStore + StoreHealth + 'static,
    {
        let mut config = AppConfig::development();
        config.security.jwt_secret = SECRET.to_string();
        config.api.enable_request_logging = false;

        let state = AppState::from_store(backend, Arc::new(config), Arc::new(FixedClock(now)));
        let operator = Uuid::new_v4();

        Self {
            router: app(state),
            store,
            operator,
            token: token_for(operator),
        }
    }

    pub async fn student(&self, name: &str) -> Uuid {
        self.student_of(self.operator, name).await
    }

    pub async fn student_of(&self, owner: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.store
            .insert_student(Student {
                id,
                owner_id: owner,
                full_name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                phone_number: "9876543210".to_string(),
                gender: "Other".to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await;
        id
    }

    /// Request as the default operator
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.call_with_token(Some(&self.token), method, uri, body).await
    }

    pub async fn call_with_token(
        &self,
        token: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| {
                format!("non-JSON body from {}: {}", uri, String::from_utf8_lossy(&bytes))
            })?
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, uri, Some(body)).await
    }
}

pub fn token_for(operator: Uuid) -> String {
    generate_jwt(&Claims::new(operator, Some("owner@example.com".into()), None, 1), SECRET)
        .expect("sign test token")
}

/// Poll the overdue document of `period` until `check` accepts its student ids.
/// Removal after a payment runs detached from the request.
pub async fn wait_for_overdue<F>(app: &TestApp, period: &Period, check: F) -> bool
where
    F: Fn(Option<&[Uuid]>) -> bool,
{
    for _ in 0..100 {
        let doc = app.store.find_overdue(app.operator, period).await.ok().flatten();
        if check(doc.as_ref().map(|n| n.student_ids.as_slice())) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
