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


//! Slice rate limits expressed as byte-based token buckets.

use crate::datapath::BackendError;
use crate::upf_state::SliceInfo;

/// Burst used when a slice leaves it unset, as milliseconds at the peak rate.
const DEFAULT_BURST_DURATION_MS: u64 = 10;

/// Token-bucket meter in bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Meter {
    pub peak_bytes_per_sec: u64,
    pub burst_bytes: u64,
}

impl Meter {
    /// Meter for a bit rate; a zero burst defaults to 10 ms worth of traffic.
    pub fn from_bit_rate(bits_per_sec: u64, burst_bytes: u64) -> Self {
        let peak_bytes_per_sec = bits_per_sec / 8;
        let burst_bytes = if burst_bytes == 0 {
            peak_bytes_per_sec.saturating_mul(DEFAULT_BURST_DURATION_MS) / 1000
        } else {
            burst_bytes
        };
        Self {
            peak_bytes_per_sec,
            burst_bytes,
        }
    }
}

/// Uplink and downlink meters programmed for one slice.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SliceMeters {
    pub slice: String,
    pub uplink: Meter,
    pub downlink: Meter,
}

impl SliceMeters {
    pub fn for_slice(slice: &SliceInfo) -> Result<Self, BackendError> {
        if slice.name.is_empty() {
            return Err(BackendError::InvalidSlice("slice name is empty".into()));
        }
        Ok(Self {
            slice: slice.name.clone(),
            uplink: Meter::from_bit_rate(slice.uplink_mbr, slice.ul_burst_bytes),
            downlink: Meter::from_bit_rate(slice.downlink_mbr, slice.dl_burst_bytes),
        })
    }
}
