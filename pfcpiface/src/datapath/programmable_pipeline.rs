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

//! Programmable-pipeline backend: slices become per-slice meters on the
//! pipeline, installed once the controller can reach this UPF.

use crate::config::Config;
use crate::datapath::meter::SliceMeters;
use crate::datapath::BackendError;
use crate::observability::events;
use crate::upf_state::{SliceInfo, UpfState};
use parking_lot::RwLock;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use tracing::{info, warn};

pub(crate) const BACKEND: &str = "programmable_pipeline";
const COMPONENT: &str = "programmable_pipeline";

#[derive(Clone, Debug, Eq, PartialEq)]
struct PipelineWiring {
    endpoint: String,
    access_ip: Ipv4Addr,
}

#[derive(Debug, Default)]
pub struct ProgrammablePipeline {
    wiring: OnceLock<PipelineWiring>,
    meters: RwLock<Option<SliceMeters>>,
}

impl ProgrammablePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connected once wired and given a specified address to reach the UPF on.
    pub fn is_connected(&self, reference_ip: Option<Ipv4Addr>) -> bool {
        self.wiring.get().is_some()
            && reference_ip.is_some_and(|ip| !ip.is_unspecified())
    }

    /// Installs the slice meters; fails until the pipeline is reachable.
    pub fn add_slice_info(&self, slice: &SliceInfo) -> Result<(), BackendError> {
        let Some(wiring) = self
            .wiring
            .get()
            .filter(|wiring| !wiring.access_ip.is_unspecified())
        else {
            return Err(BackendError::NotConfigured { backend: BACKEND });
        };

        let meters = SliceMeters::for_slice(slice)?;
        info!(
            event = events::DATAPATH_METERS_INSTALLED,
            component = COMPONENT,
            endpoint = wiring.endpoint.as_str(),
            access_ip = %wiring.access_ip,
            slice = meters.slice.as_str(),
            uplink_bytes_per_sec = meters.uplink.peak_bytes_per_sec,
            downlink_bytes_per_sec = meters.downlink.peak_bytes_per_sec,
            "installed slice meters on pipeline"
        );
        *self.meters.write() = Some(meters);
        Ok(())
    }

    /// Meters of the slice currently installed.
    pub fn active_meters(&self) -> Option<SliceMeters> {
        self.meters.read().clone()
    }

    pub fn access_ip(&self) -> Option<Ipv4Addr> {
        self.wiring.get().map(|wiring| wiring.access_ip)
    }

    pub fn set_upf_info(&self, upf: &UpfState, config: &Config) {
        let pipeline = &config.programmable_pipeline;
        let wiring = PipelineWiring {
            endpoint: pipeline.endpoint.clone(),
            access_ip: pipeline.access_ip.unwrap_or(upf.access_ip),
        };
        let access_ip = wiring.access_ip;

        if self.wiring.set(wiring).is_ok() {
            info!(
                event = events::DATAPATH_WIRED,
                component = COMPONENT,
                endpoint = pipeline.endpoint.as_str(),
                %access_ip,
                "programmable pipeline wired"
            );
        } else {
            warn!(
                event = events::DATAPATH_REWIRE_IGNORED,
                component = COMPONENT,
                "programmable pipeline already wired, ignoring"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProgrammablePipeline;
    use crate::config::Config;
    use crate::control_plane::pfcp_conn::test_support::upf;
    use crate::datapath::BackendError;
    use crate::upf_state::SliceInfo;
    use std::net::Ipv4Addr;

    fn gold() -> SliceInfo {
        SliceInfo {
            name: "gold".into(),
            uplink_mbr: 80_000_000,
            downlink_mbr: 160_000_000,
            dl_burst_bytes: 3_000,
            ..Default::default()
        }
    }

    #[test]
    fn requires_wiring_and_reference_ip() {
        let pipeline = ProgrammablePipeline::new();
        let reference = Some(Ipv4Addr::new(10, 0, 1, 5));

        assert!(!pipeline.is_connected(reference));

        pipeline.set_upf_info(&upf(), &Config::default());

        assert!(pipeline.is_connected(reference));
        assert!(!pipeline.is_connected(None));
        assert!(!pipeline.is_connected(Some(Ipv4Addr::UNSPECIFIED)));
    }

    #[test]
    fn access_ip_prefers_pipeline_override() {
        let pipeline = ProgrammablePipeline::new();
        let mut config = Config::default();
        config.programmable_pipeline.access_ip = Some(Ipv4Addr::new(172, 16, 0, 9));

        pipeline.set_upf_info(&upf(), &config);

        assert_eq!(pipeline.access_ip(), Some(Ipv4Addr::new(172, 16, 0, 9)));
    }

    #[test]
    fn falls_back_to_upf_access_ip() {
        let pipeline = ProgrammablePipeline::new();

        pipeline.set_upf_info(&upf(), &Config::default());

        assert_eq!(pipeline.access_ip(), Some(Ipv4Addr::new(10, 0, 1, 5)));
    }

    #[test]
    fn installs_slice_meters_once_wired() {
        let pipeline = ProgrammablePipeline::new();
        pipeline.set_upf_info(&upf(), &Config::default());

        pipeline.add_slice_info(&gold()).unwrap();

        let meters = pipeline.active_meters().unwrap();
        assert_eq!(meters.slice, "gold");
        assert_eq!(meters.uplink.peak_bytes_per_sec, 10_000_000);
        assert_eq!(meters.uplink.burst_bytes, 100_000);
        assert_eq!(meters.downlink.peak_bytes_per_sec, 20_000_000);
        assert_eq!(meters.downlink.burst_bytes, 3_000);
    }

    #[test]
    fn slice_is_rejected_while_unreachable() {
        let unwired = ProgrammablePipeline::new();
        assert_eq!(
            unwired.add_slice_info(&gold()),
            Err(BackendError::NotConfigured {
                backend: "programmable_pipeline"
            })
        );

        let unreachable = ProgrammablePipeline::new();
        let mut config = Config::default();
        config.programmable_pipeline.access_ip = Some(Ipv4Addr::UNSPECIFIED);
        unreachable.set_upf_info(&upf(), &config);

        assert!(matches!(
            unreachable.add_slice_info(&gold()),
            Err(BackendError::NotConfigured { .. })
        ));
        assert!(unreachable.active_meters().is_none());
    }

    #[test]
    fn unnamed_slice_is_invalid() {
        let pipeline = ProgrammablePipeline::new();
        pipeline.set_upf_info(&upf(), &Config::default());

        assert!(matches!(
            pipeline.add_slice_info(&SliceInfo::default()),
            Err(BackendError::InvalidSlice(_))
        ));
    }
}
