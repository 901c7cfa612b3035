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

//! `/v1/config/network-slices`: slice QoS descriptors into datapath meters.

use crate::observability::events;
use crate::upf_state::{SliceInfo, SliceStatus, UeResource};
use crate::web::{
    decode_failed, message, DecodeError, WebState, MSG_CREATED, MSG_SLICE_FAILED,
    SLICE_CONFIG_PATH,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const COMPONENT: &str = "slice_config";

const KB: i64 = 1_000;
const MB: i64 = 1_000_000;
const GB: i64 = 1_000_000_000;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkSlice {
    pub slice_name: String,
    pub slice_qos: SliceQos,
    pub ue_resource_info: Vec<UeResourceInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SliceQos {
    pub uplink_mbr: u64,
    pub downlink_mbr: u64,
    pub bitrate_unit: String,
    pub uplink_burst_size: u64,
    pub downlink_burst_size: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UeResourceInfo {
    pub dnn: String,
    pub ue_pool_id: String,
}

/// Converts `mbr` in `unit` to bits per second. Unknown or empty units mean Mbps.
///
/// `bps` passes through untouched; any other product that overflows signed
/// 64-bit or is not positive becomes `i64::MAX`.
pub fn calculate_bit_rates(mbr: u64, unit: &str) -> u64 {
    let multiplier = match unit {
        "bps" => return mbr,
        "Kbps" => KB,
        "Gbps" => GB,
        _ => MB,
    };

    i64::try_from(mbr)
        .ok()
        .and_then(|mbr| mbr.checked_mul(multiplier))
        .filter(|rate| *rate > 0)
        .map_or(i64::MAX as u64, |rate| rate as u64)
}

impl NetworkSlice {
    pub fn to_slice_info(&self) -> SliceInfo {
        let qos = &self.slice_qos;
        SliceInfo {
            name: self.slice_name.clone(),
            uplink_mbr: calculate_bit_rates(qos.uplink_mbr, &qos.bitrate_unit),
            downlink_mbr: calculate_bit_rates(qos.downlink_mbr, &qos.bitrate_unit),
            ul_burst_bytes: qos.uplink_burst_size,
            dl_burst_bytes: qos.downlink_burst_size,
            ue_resources: self
                .ue_resource_info
                .iter()
                .map(|resource| UeResource {
                    pool_id: resource.ue_pool_id.clone(),
                    dnn: resource.dnn.clone(),
                })
                .collect(),
        }
    }
}

pub(crate) async fn handle(State(state): State<WebState>, body: Bytes) -> Response {
    let slice: NetworkSlice = match serde_json::from_slice(&body) {
        Ok(slice) => slice,
        Err(err) => {
            return decode_failed(SLICE_CONFIG_PATH, &DecodeError::from(err), MSG_SLICE_FAILED)
        }
    };

    info!(
        event = events::SLICE_CONFIG_REQUEST,
        component = COMPONENT,
        slice = slice.slice_name.as_str(),
        "handling slice config"
    );

    // Published before the backend call; a rejected slice stays visible as degraded.
    let info = state.upf.publish_slice(slice.to_slice_info());

    match state.backend.add_slice_info(&info) {
        Ok(()) => {
            info!(
                event = events::SLICE_CONFIG_APPLIED,
                component = COMPONENT,
                slice = info.name.as_str(),
                uplink_mbr = info.uplink_mbr,
                downlink_mbr = info.downlink_mbr,
                backend = state.backend.name(),
                "slice applied to datapath"
            );
            message(StatusCode::CREATED, MSG_CREATED)
        }
        Err(err) => {
            state.upf.set_slice_status(&info, SliceStatus::Degraded);
            error!(
                event = events::SLICE_CONFIG_BACKEND_FAILED,
                component = COMPONENT,
                slice = info.name.as_str(),
                backend = state.backend.name(),
                err = %err,
                "adding slice info to datapath failed"
            );
            message(StatusCode::INTERNAL_SERVER_ERROR, MSG_SLICE_FAILED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{calculate_bit_rates, NetworkSlice};

    #[test]
    fn converts_units() {
        assert_eq!(calculate_bit_rates(5, "Mbps"), 5_000_000);
        assert_eq!(calculate_bit_rates(5, "Gbps"), 5_000_000_000);
        assert_eq!(calculate_bit_rates(5, "Kbps"), 5_000);
        assert_eq!(calculate_bit_rates(7, "bps"), 7);
    }

    #[test]
    fn unknown_or_missing_unit_means_mbps() {
        assert_eq!(calculate_bit_rates(3, ""), 3_000_000);
        assert_eq!(calculate_bit_rates(3, "mbps"), 3_000_000);
    }

    #[test]
    fn overflow_clamps_to_max_positive() {
        assert_eq!(calculate_bit_rates(u64::MAX / 2, "Gbps"), i64::MAX as u64);
        assert_eq!(calculate_bit_rates(10_000_000_000, "Gbps"), i64::MAX as u64);
        assert_eq!(calculate_bit_rates(u64::MAX, "Kbps"), i64::MAX as u64);
    }

    #[test]
    fn bps_passes_through_unclamped() {
        assert_eq!(calculate_bit_rates(u64::MAX, "bps"), u64::MAX);
    }

    #[test]
    fn zero_rate_is_not_positive() {
        assert_eq!(calculate_bit_rates(0, "Mbps"), i64::MAX as u64);
        assert_eq!(calculate_bit_rates(0, "bps"), 0);
    }

    #[test]
    fn descriptor_maps_to_slice_info() {
        let slice: NetworkSlice = serde_json::from_str(
            r#"{
                "sliceName": "gold",
                "sliceQos": {
                    "uplinkMbr": 10,
                    "downlinkMbr": 20,
                    "bitrateUnit": "Kbps",
                    "uplinkBurstSize": 1500,
                    "downlinkBurstSize": 3000
                },
                "ueResourceInfo": [{"dnn": "internet", "uePoolId": "pool1"}]
            }"#,
        )
        .unwrap();

        let info = slice.to_slice_info();

        assert_eq!(info.name, "gold");
        assert_eq!(info.uplink_mbr, 10_000);
        assert_eq!(info.downlink_mbr, 20_000);
        assert_eq!(info.ul_burst_bytes, 1500);
        assert_eq!(info.dl_burst_bytes, 3000);
        assert_eq!(info.ue_resources.len(), 1);
        assert_eq!(info.ue_resources[0].pool_id, "pool1");
        assert_eq!(info.ue_resources[0].dnn, "internet");
    }
}
