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

//! `/registergw`: reconciles a peer gateway into local routes and ARP state.

use crate::config::{GatewayConfig, RouteConfig};
use crate::data_plane::registration_gate::GatewayRole;
use crate::host_network::{HostNetwork, MacAddr, OsCommandError};
use crate::observability::events;
use crate::upf_state::UpfState;
use crate::web::{
    decode_failed, message, DecodeError, WebState, MSG_CREATED, MSG_REGISTER_FAILED,
    REGISTER_GW_PATH,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::{debug, error, info};

const COMPONENT: &str = "register_gw";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GatewayRegisterRequest {
    pub gwip: String,
    pub gwmac: String,
}

/// Decoded registration, classified against the local interfaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GatewayRegistration {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

impl TryFrom<&GatewayRegisterRequest> for GatewayRegistration {
    type Error = DecodeError;

    fn try_from(request: &GatewayRegisterRequest) -> Result<Self, Self::Error> {
        let ip = request
            .gwip
            .parse()
            .map_err(|_| DecodeError::Ipv4(request.gwip.clone()))?;
        let mac = request
            .gwmac
            .parse()
            .map_err(|_| DecodeError::Mac(request.gwmac.clone()))?;
        Ok(Self { ip, mac })
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ClassificationError {
    #[error("gateway {0} shares a third octet with neither access nor core")]
    NoMatchingRole(Ipv4Addr),
}

#[derive(Debug, Error)]
pub enum RegisterGwError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    OsCommand(#[from] OsCommandError),
}

impl RegisterGwError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegisterGwError::Decode(_) => StatusCode::BAD_REQUEST,
            RegisterGwError::OsCommand(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Role of `gateway` by third-octet match; access is checked first.
pub fn classify(
    gateway: Ipv4Addr,
    access_ip: Ipv4Addr,
    core_ip: Ipv4Addr,
) -> Result<GatewayRole, ClassificationError> {
    let octet = gateway.octets()[2];
    if octet == access_ip.octets()[2] {
        Ok(GatewayRole::Access)
    } else if octet == core_ip.octets()[2] {
        Ok(GatewayRole::Core)
    } else {
        Err(ClassificationError::NoMatchingRole(gateway))
    }
}

/// `prefix` with its last octet replaced by the gateway's.
pub fn shadow_gateway(prefix: Ipv4Network, gateway: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = prefix.network().octets();
    Ipv4Addr::new(a, b, c, gateway.octets()[3])
}

fn route_for(gateway: &GatewayConfig, role: GatewayRole) -> RouteConfig {
    match role {
        GatewayRole::Access => gateway.access_route,
        GatewayRole::Core => gateway.core_route,
    }
}

/// Route, then static ARP, then latch. Stops at the first failure and leaves
/// earlier steps in place.
pub async fn register_gateway(
    upf: &UpfState,
    host: &dyn HostNetwork,
    routes: &GatewayConfig,
    registration: GatewayRegistration,
    role: GatewayRole,
) -> Result<(), OsCommandError> {
    let route = route_for(routes, role);
    let via = shadow_gateway(route.shadow_prefix, registration.ip);

    host.replace_route(route.downstream_subnet, via).await?;
    debug!(
        event = events::GW_ROUTE_REPLACED,
        component = COMPONENT,
        role = role.as_str(),
        destination = %route.downstream_subnet,
        %via,
        "route installed"
    );

    let iface = upf.iface_for(role);
    host.add_static_neighbor(registration.ip, registration.mac, iface)
        .await?;
    debug!(
        event = events::GW_NEIGHBOR_ADDED,
        component = COMPONENT,
        gw_ip = %registration.ip,
        gw_mac = %registration.mac,
        iface,
        "static ARP entry applied"
    );

    if upf.gateways().mark_registered(role) {
        info!(
            event = events::GW_LATCH_SET,
            component = COMPONENT,
            role = role.as_str(),
            gw_ip = %registration.ip,
            "gateway registered"
        );
    }
    Ok(())
}

async fn process(state: &WebState, body: &[u8]) -> Result<(), RegisterGwError> {
    let request: GatewayRegisterRequest =
        serde_json::from_slice(body).map_err(DecodeError::from)?;
    let registration = GatewayRegistration::try_from(&request)?;

    info!(
        event = events::GW_REGISTER_REQUEST,
        component = COMPONENT,
        gw_ip = %registration.ip,
        gw_mac = %registration.mac,
        "handling gateway registration"
    );

    let outcome = match classify(registration.ip, state.upf.access_ip, state.upf.core_ip) {
        Ok(role) => {
            register_gateway(
                &state.upf,
                state.host.as_ref(),
                &state.gateway,
                registration,
                role,
            )
            .await
        }
        Err(err) => {
            info!(
                event = events::GW_UNCLASSIFIED,
                component = COMPONENT,
                err = %err,
                "skipping route and ARP installation"
            );
            Ok(())
        }
    };

    if state.upf.gateway_ip() == Some(registration.ip) {
        state
            .dispatcher
            .trigger_self_registration(state.upf.clone(), state.host.clone());
    }

    outcome.map_err(RegisterGwError::from)
}

pub(crate) async fn handle(State(state): State<WebState>, body: Bytes) -> Response {
    match process(&state, &body).await {
        Ok(()) => message(StatusCode::CREATED, MSG_CREATED),
        Err(RegisterGwError::Decode(err)) => {
            decode_failed(REGISTER_GW_PATH, &err, MSG_REGISTER_FAILED)
        }
        Err(err) => {
            error!(
                event = events::GW_REGISTER_FAILED,
                component = COMPONENT,
                err = %err,
                "gateway registration failed"
            );
            message(err.status(), MSG_REGISTER_FAILED)
        }
    }
}
