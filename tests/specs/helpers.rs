// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: an in-process server over a fake clock.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ft_core::FakeClock;
use ft_server::lifecycle::ServerCtx;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct Harness {
    pub ctx: Arc<ServerCtx<FakeClock>>,
    pub clock: FakeClock,
    // NOTE(lifetime): checkpoint backups live here for the test's duration
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

pub async fn harness() -> Harness {
    let clock = FakeClock::new();
    let store = ft_storage::Store::in_memory().await.expect("store");
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = ServerCtx::build(store, dir.path().join("checkpoints"), clock.clone());
    Harness { ctx, clock, dir }
}

impl Harness {
    fn router(&self) -> Router {
        ft_server::api::router(self.ctx.clone())
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
        };
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
