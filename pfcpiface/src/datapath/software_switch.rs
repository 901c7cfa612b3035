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

//! Software-switch backend: slices become uplink/downlink meters.

use crate::config::Config;
use crate::datapath::meter::SliceMeters;
use crate::datapath::BackendError;
use crate::observability::events;
use crate::upf_state::{SliceInfo, UpfState};
use parking_lot::RwLock;
use std::sync::OnceLock;
use tracing::{info, warn};

pub(crate) const BACKEND: &str = "software_switch";
const COMPONENT: &str = "software_switch";

#[derive(Clone, Debug, Eq, PartialEq)]
struct SwitchWiring {
    endpoint: String,
}

#[derive(Debug, Default)]
pub struct SoftwareSwitch {
    wiring: OnceLock<SwitchWiring>,
    meters: RwLock<Option<SliceMeters>>,
}

impl SoftwareSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.wiring.get().is_some()
    }

    pub fn add_slice_info(&self, slice: &SliceInfo) -> Result<(), BackendError> {
        let Some(wiring) = self.wiring.get() else {
            return Err(BackendError::NotConfigured { backend: BACKEND });
        };
        let meters = SliceMeters::for_slice(slice)?;
        info!(
            event = events::DATAPATH_METERS_INSTALLED,
            component = COMPONENT,
            endpoint = wiring.endpoint.as_str(),
            slice = meters.slice.as_str(),
            uplink_bytes_per_sec = meters.uplink.peak_bytes_per_sec,
            downlink_bytes_per_sec = meters.downlink.peak_bytes_per_sec,
            "installed slice meters"
        );
        *self.meters.write() = Some(meters);
        Ok(())
    }

    /// Meters of the slice currently programmed.
    pub fn active_meters(&self) -> Option<SliceMeters> {
        self.meters.read().clone()
    }

    pub fn set_upf_info(&self, upf: &UpfState, config: &Config) {
        let wiring = SwitchWiring {
            endpoint: config.software_switch.endpoint.clone(),
        };

        match self.wiring.set(wiring) {
            Ok(()) => info!(
                event = events::DATAPATH_WIRED,
                component = COMPONENT,
                endpoint = config.software_switch.endpoint.as_str(),
                access_iface = upf.access_iface.as_str(),
                core_iface = upf.core_iface.as_str(),
                "software switch wired"
            ),
            Err(_) => warn!(
                event = events::DATAPATH_REWIRE_IGNORED,
                component = COMPONENT,
                "software switch already wired, ignoring"
            ),
        }
    }
}
