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

//! Inbound HTTP surface: slice configuration and gateway registration.

pub mod register_gw;
pub mod slice_config;

use crate::config::GatewayConfig;
use crate::data_plane::notify_pool::NotificationDispatcher;
use crate::datapath::DatapathBackend;
use crate::host_network::HostNetwork;
use crate::observability::events;
use crate::upf_state::UpfState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const COMPONENT: &str = "web";

pub const SLICE_CONFIG_PATH: &str = "/v1/config/network-slices";
pub const REGISTER_GW_PATH: &str = "/registergw";
pub const METRICS_PATH: &str = "/metrics";

pub(crate) const MSG_CREATED: &str = "Status Created";
pub(crate) const MSG_SLICE_FAILED: &str = "Failed to add slice";
pub(crate) const MSG_REGISTER_FAILED: &str = "Failed to register gateway";

/// Malformed inbound request body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid IPv4 address {0:?}")]
    Ipv4(String),
    #[error("invalid MAC address {0:?}")]
    Mac(String),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct WebState {
    pub upf: Arc<UpfState>,
    pub backend: Arc<DatapathBackend>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub host: Arc<dyn HostNetwork>,
    pub gateway: GatewayConfig,
    pub metrics: Registry,
}

/// POST and PUT are accepted on the configuration routes and GET on
/// `/metrics`; any other method gets 405.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route(
            SLICE_CONFIG_PATH,
            post(slice_config::handle).put(slice_config::handle),
        )
        .route(
            REGISTER_GW_PATH,
            post(register_gw::handle).put(register_gw::handle),
        )
        .route(METRICS_PATH, get(export_metrics))
        .with_state(state)
}

async fn export_metrics(State(state): State<WebState>) -> Response {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    match encoder.encode(&state.metrics.gather(), &mut body) {
        Ok(()) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(
                event = events::METRICS_ENCODE_FAILED,
                component = COMPONENT,
                err = %err,
                "failed to encode metrics"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

pub(crate) fn decode_failed(path: &str, err: &DecodeError, text: &str) -> Response {
    warn!(
        event = events::HTTP_DECODE_FAILED,
        component = COMPONENT,
        path,
        err = %err,
        "rejecting malformed request"
    );
    message(StatusCode::BAD_REQUEST, text)
}

/// Serves `router` until `shutdown` fires, then lets in-flight requests finish
/// for at most `grace`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(
            event = events::HTTP_LISTEN,
            component = COMPONENT,
            %addr,
            "HTTP server listening"
        );
    }

    let signal = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = shutdown.cancelled() => {}
    }

    info!(
        event = events::HTTP_SHUTDOWN,
        component = COMPONENT,
        grace_ms = grace.as_millis() as u64,
        "HTTP server draining"
    );
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                event = events::HTTP_SHUTDOWN_TIMEOUT,
                component = COMPONENT,
                "HTTP requests still in flight after grace period"
            );
            Ok(())
        }
    }
}
