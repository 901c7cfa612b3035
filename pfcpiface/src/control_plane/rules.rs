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

//! Per-session forwarding rules: PDR, FAR and QER lists.

use crate::control_plane::session_store::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

/// Upper bound on each rule list held by one session.
pub const MAX_ITEMS: usize = 10;

/// Interface a PDR matches traffic on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceInterface {
    #[default]
    Access,
    Core,
}

/// Destination a FAR forwards matched traffic to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationInterface {
    Access,
    #[default]
    Core,
}

/// FAR apply-action flags.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApplyAction {
    pub drop: bool,
    pub forward: bool,
    pub buffer: bool,
    pub notify_cp: bool,
}

impl ApplyAction {
    pub const FORWARD: Self = Self {
        drop: false,
        forward: true,
        buffer: false,
        notify_cp: false,
    };
}

/// Packet Detection Rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pdr {
    pub pdr_id: u32,
    pub precedence: u32,
    pub src_iface: SourceInterface,
    pub tunnel_teid: u32,
    /// UE address matched by this rule; `0.0.0.0` when the rule carries none.
    pub ue_address: Ipv4Addr,
    pub far_id: u32,
    pub qer_ids: Vec<u32>,
}

impl Default for Pdr {
    fn default() -> Self {
        Self {
            pdr_id: 0,
            precedence: 0,
            src_iface: SourceInterface::default(),
            tunnel_teid: 0,
            ue_address: Ipv4Addr::UNSPECIFIED,
            far_id: 0,
            qer_ids: Vec::new(),
        }
    }
}

/// Forwarding Action Rule.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Far {
    pub far_id: u32,
    pub apply_action: ApplyAction,
    pub dst_iface: DestinationInterface,
    pub tunnel_peer: Option<Ipv4Addr>,
    pub tunnel_teid: u32,
}

/// QoS Enforcement Rule. Bit rates in bits per second.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Qer {
    pub qer_id: u32,
    pub qfi: u8,
    pub uplink_mbr: u64,
    pub downlink_mbr: u64,
    pub uplink_gbr: u64,
    pub downlink_gbr: u64,
}

/// Ordered rule lists owned by one session.
///
/// Each list holds at most [`MAX_ITEMS`] entries; the `add_*` methods are
/// the only way in. Duplicate rule ids are prevented by the
/// rule-installation layer and are not re-validated here.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ForwardingRuleSet {
    pdrs: Vec<Pdr>,
    fars: Vec<Far>,
    qers: Vec<Qer>,
}

impl ForwardingRuleSet {
    pub fn new() -> Self {
        Self {
            pdrs: Vec::with_capacity(MAX_ITEMS),
            fars: Vec::with_capacity(MAX_ITEMS),
            qers: Vec::with_capacity(MAX_ITEMS),
        }
    }

    pub fn add_pdr(&mut self, pdr: Pdr) -> Result<(), StoreError> {
        push_bounded(&mut self.pdrs, pdr, "pdrs")
    }

    pub fn add_far(&mut self, far: Far) -> Result<(), StoreError> {
        push_bounded(&mut self.fars, far, "fars")
    }

    pub fn add_qer(&mut self, qer: Qer) -> Result<(), StoreError> {
        push_bounded(&mut self.qers, qer, "qers")
    }

    pub fn pdrs(&self) -> &[Pdr] {
        &self.pdrs
    }

    pub fn fars(&self) -> &[Far] {
        &self.fars
    }

    pub fn qers(&self) -> &[Qer] {
        &self.qers
    }

    /// Distinct specified UE addresses referenced by the PDRs, in first-seen order.
    pub fn ue_addresses(&self) -> Vec<Ipv4Addr> {
        let mut seen = HashSet::with_capacity(self.pdrs.len());
        self.pdrs
            .iter()
            .map(|pdr| pdr.ue_address)
            .filter(|address| !address.is_unspecified())
            .filter(|address| seen.insert(*address))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pdrs.is_empty() && self.fars.is_empty() && self.qers.is_empty()
    }
}

impl Default for ForwardingRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ForwardingRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PDRs={:?}, FARs={:?}, QERs={:?}",
            self.pdrs, self.fars, self.qers
        )
    }
}

fn push_bounded<T>(list: &mut Vec<T>, item: T, list_name: &'static str) -> Result<(), StoreError> {
    if list.len() >= MAX_ITEMS {
        return Err(StoreError::RuleLimitExceeded {
            list: list_name,
            max: MAX_ITEMS,
        });
    }
    list.push(item);
    Ok(())
}
