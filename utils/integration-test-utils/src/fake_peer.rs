/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;

/// How a [`FakePeer`] answers.
#[derive(Clone, Copy, Debug)]
pub struct PeerBehavior {
    /// Requests per path answered with `failure_status` before succeeding.
    pub fail_first: usize,
    pub failure_status: StatusCode,
    pub success_status: StatusCode,
}

impl Default for PeerBehavior {
    fn default() -> Self {
        Self {
            fail_first: 0,
            failure_status: StatusCode::SERVICE_UNAVAILABLE,
            success_status: StatusCode::CREATED,
        }
    }
}

impl PeerBehavior {
    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct PeerState {
    bodies: Mutex<HashMap<String, Vec<serde_json::Value>>>,
}

/// Local HTTP server standing in for a load balancer or the aggregator.
///
/// Every request is recorded per path; bodies that are not JSON are stored as
/// `null`.
pub struct FakePeer {
    addr: SocketAddr,
    state: Arc<PeerState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakePeer {
    pub async fn start(behavior: PeerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake peer");
        let addr = listener.local_addr().expect("fake peer address");
        let state = Arc::new(PeerState::default());

        let app = Router::new().fallback(record).with_state((state.clone(), behavior));
        let (shutdown, signal) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown),
        }
    }

    /// `http://127.0.0.1:<port>`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    pub fn attempts(&self, path: &str) -> usize {
        self.state.bodies.lock().get(path).map_or(0, Vec::len)
    }

    pub fn bodies(&self, path: &str) -> Vec<serde_json::Value> {
        self.state
            .bodies
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_attempts(&self) -> usize {
        self.state.bodies.lock().values().map(Vec::len).sum()
    }

    /// Polls until `path` has seen at least `attempts` requests or `timeout` elapses.
    pub async fn wait_for_attempts(&self, path: &str, attempts: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.attempts(path) >= attempts {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakePeer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn record(
    State((state, behavior)): State<(Arc<PeerState>, PeerBehavior)>,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    let path = uri.path().to_string();
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    let seen = {
        let mut bodies = state.bodies.lock();
        let entries = bodies.entry(path.clone()).or_default();
        entries.push(value);
        entries.len()
    };

    let status = if seen <= behavior.fail_first {
        behavior.failure_status
    } else {
        behavior.success_status
    };
    debug!(path = path.as_str(), seen, status = status.as_u16(), "fake peer answered");
    status
}
