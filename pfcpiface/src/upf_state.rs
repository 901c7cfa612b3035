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

//! Process-scoped UPF state shared by every handler and backend call.

use crate::data_plane::registration_gate::{GatewayRole, RegistrationGate};
use crate::ip_pool::UeIpPool;
use parking_lot::RwLock;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// UE address pool association of a slice.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UeResource {
    pub pool_id: String,
    pub dnn: String,
}

/// Slice QoS with rates already converted to the backend unit.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SliceInfo {
    pub name: String,
    pub uplink_mbr: u64,
    pub downlink_mbr: u64,
    pub ul_burst_bytes: u64,
    pub dl_burst_bytes: u64,
    pub ue_resources: Vec<UeResource>,
}

/// Whether the datapath accepted the published slice.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceStatus {
    Applied,
    Degraded,
}

#[derive(Clone, Debug)]
pub struct PublishedSlice {
    pub info: Arc<SliceInfo>,
    pub status: SliceStatus,
}

/// Construction parameters for [`UpfState`].
#[derive(Debug, Default)]
pub struct UpfSettings {
    pub access_iface: String,
    pub core_iface: String,
    pub access_ip: Option<Ipv4Addr>,
    pub core_ip: Option<Ipv4Addr>,
    pub node_id: String,
    pub dnn: String,
    pub peers: Vec<String>,
    pub ip_pool: Option<UeIpPool>,
    pub gateway_ip: Option<Ipv4Addr>,
    pub enable_ue_ip_alloc: bool,
    pub enable_end_marker: bool,
    pub enable_flow_measure: bool,
    pub max_req_retries: u32,
}

/// State created once at startup and passed by reference to every consumer.
///
/// Only the published slice and the gateway latches change after construction.
#[derive(Debug)]
pub struct UpfState {
    pub access_iface: String,
    pub core_iface: String,
    pub access_ip: Ipv4Addr,
    pub core_ip: Ipv4Addr,
    pub node_id: String,
    pub dnn: String,
    pub peers: Vec<String>,
    pub ip_pool: Option<UeIpPool>,
    pub enable_ue_ip_alloc: bool,
    pub enable_end_marker: bool,
    pub enable_flow_measure: bool,
    pub max_req_retries: u32,
    gateway_ip: Option<Ipv4Addr>,
    slice: RwLock<Option<PublishedSlice>>,
    gateways: RegistrationGate,
}

impl UpfState {
    pub fn new(settings: UpfSettings) -> Self {
        Self {
            access_iface: settings.access_iface,
            core_iface: settings.core_iface,
            access_ip: settings.access_ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
            core_ip: settings.core_ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
            node_id: settings.node_id,
            dnn: settings.dnn,
            peers: settings.peers,
            ip_pool: settings.ip_pool,
            enable_ue_ip_alloc: settings.enable_ue_ip_alloc,
            enable_end_marker: settings.enable_end_marker,
            enable_flow_measure: settings.enable_flow_measure,
            max_req_retries: settings.max_req_retries,
            gateway_ip: settings.gateway_ip,
            slice: RwLock::new(None),
            gateways: RegistrationGate::new(),
        }
    }

    /// The node's own next hop on the core side.
    pub fn gateway_ip(&self) -> Option<Ipv4Addr> {
        self.gateway_ip
    }

    pub fn iface_for(&self, role: GatewayRole) -> &str {
        match role {
            GatewayRole::Access => &self.access_iface,
            GatewayRole::Core => &self.core_iface,
        }
    }

    pub fn gateways(&self) -> &RegistrationGate {
        &self.gateways
    }

    /// Replaces the published slice wholesale; last write wins.
    pub fn publish_slice(&self, info: SliceInfo) -> Arc<SliceInfo> {
        let info = Arc::new(info);
        *self.slice.write() = Some(PublishedSlice {
            info: info.clone(),
            status: SliceStatus::Applied,
        });
        info
    }

    /// Updates the status of `info` if it is still the published slice.
    pub fn set_slice_status(&self, info: &Arc<SliceInfo>, status: SliceStatus) -> bool {
        let mut slice = self.slice.write();
        match slice.as_mut() {
            Some(published) if Arc::ptr_eq(&published.info, info) => {
                published.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn slice(&self) -> Option<PublishedSlice> {
        self.slice.read().clone()
    }

    pub fn snapshot(&self) -> UpfSnapshot {
        let slice = self.slice();
        UpfSnapshot {
            enable_ue_ip_alloc: self.enable_ue_ip_alloc,
            enable_end_marker: self.enable_end_marker,
            enable_flow_measure: self.enable_flow_measure,
            access_iface: self.access_iface.clone(),
            core_iface: self.core_iface.clone(),
            ippool_cidr: self
                .ip_pool
                .as_ref()
                .map(|pool| pool.network().to_string())
                .unwrap_or_default(),
            access_ip: self.access_ip,
            core_ip: self.core_ip,
            node_id: self.node_id.clone(),
            peers: self.peers.clone(),
            dnn: self.dnn.clone(),
            max_req_retries: self.max_req_retries,
            slice_info: slice.as_ref().map(|s| (*s.info).clone()),
            slice_status: slice.map(|s| s.status),
            access_gw_registered: self.gateways.is_registered(GatewayRole::Access),
            core_gw_registered: self.gateways.is_registered(GatewayRole::Core),
        }
    }
}

/// Wire form of [`UpfState`] sent to the aggregator on self-registration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpfSnapshot {
    #[serde(rename = "EnableUeIPAlloc")]
    pub enable_ue_ip_alloc: bool,
    pub enable_end_marker: bool,
    pub enable_flow_measure: bool,
    pub access_iface: String,
    pub core_iface: String,
    pub ippool_cidr: String,
    #[serde(rename = "AccessIP")]
    pub access_ip: Ipv4Addr,
    #[serde(rename = "CoreIP")]
    pub core_ip: Ipv4Addr,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    pub peers: Vec<String>,
    pub dnn: String,
    pub max_req_retries: u32,
    pub slice_info: Option<SliceInfo>,
    pub slice_status: Option<SliceStatus>,
    pub access_gw_registered: bool,
    pub core_gw_registered: bool,
}
