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

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use integration_test_utils::{init_logging, FakePeer, RecordingHostNetwork};
use pfcpiface::{Config, DatapathMode, PfcpIface};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tower::ServiceExt;

pub(crate) const ACCESS_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 5);
pub(crate) const CORE_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 5);
pub(crate) const OWN_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 1);
pub(crate) const ACCESS_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
pub(crate) const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 5);

/// Config with fixed interface addresses, fast backoff and the given peer URLs.
pub(crate) fn test_config(ingress: &str, egress: &str, aggregator: &str) -> Config {
    let mut config = Config::default();
    config.access.ip = Some(ACCESS_IP);
    config.core.ip = Some(CORE_IP);
    config.gateway.ip = Some(OWN_GATEWAY);
    config.cpiface.http_port = 0;
    config.notify.ingress_peer = ingress.to_string();
    config.notify.egress_peer = egress.to_string();
    config.notify.aggregator = aggregator.to_string();
    config.notify.backoff_ms = 10;
    config.notify.request_timeout_ms = 2_000;
    config.notify.workers = 2;
    config.shutdown_grace_secs = 2;
    config
}

/// Config whose peers point at a closed port.
pub(crate) fn offline_config() -> Config {
    test_config(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        "http://127.0.0.1:9/",
    )
}

pub(crate) struct Peers {
    pub(crate) ingress: FakePeer,
    pub(crate) egress: FakePeer,
    pub(crate) aggregator: FakePeer,
}

impl Peers {
    pub(crate) fn config(&self) -> Config {
        test_config(
            &self.ingress.base_url(),
            &self.egress.base_url(),
            &self.aggregator.url("/v1/register/pfcp"),
        )
    }
}

pub(crate) async fn build_iface(
    config: Config,
    host: Arc<RecordingHostNetwork>,
) -> PfcpIface {
    init_logging();
    PfcpIface::new(config, host)
        .await
        .expect("interface should start")
}

pub(crate) fn pipeline(mut config: Config) -> Config {
    config.mode = DatapathMode::ProgrammablePipeline;
    config
}

pub(crate) async fn send_text(
    router: &Router,
    method: Method,
    path: &str,
    body: &str,
) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

pub(crate) async fn send(
    router: &Router,
    method: Method,
    path: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let (status, text) = send_text(router, method, path, body).await;
    let json = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub(crate) async fn register_gw(router: &Router, ip: Ipv4Addr, mac: &str) -> StatusCode {
    let body = format!(r#"{{"gwip":"{ip}","gwmac":"{mac}"}}"#);
    send(router, Method::POST, "/registergw", &body).await.0
}
