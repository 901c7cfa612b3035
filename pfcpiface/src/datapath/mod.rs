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

//! Datapath backends. Exactly one variant is chosen from the configured mode
//! at startup and never switched afterwards.

pub mod meter;
pub mod programmable_pipeline;
pub mod software_switch;

use crate::config::{Config, DatapathMode};
use crate::upf_state::{SliceInfo, UpfState};
use std::net::Ipv4Addr;
use thiserror::Error;

pub use meter::{Meter, SliceMeters};
pub use programmable_pipeline::ProgrammablePipeline;
pub use software_switch::SoftwareSwitch;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    #[error("{backend} datapath is not wired yet")]
    NotConfigured { backend: &'static str },
    #[error("invalid slice: {0}")]
    InvalidSlice(String),
}

#[derive(Debug)]
pub enum DatapathBackend {
    SoftwareSwitch(SoftwareSwitch),
    ProgrammablePipeline(ProgrammablePipeline),
}

impl DatapathBackend {
    pub fn for_mode(mode: DatapathMode) -> Self {
        match mode {
            DatapathMode::SoftwareSwitch => Self::SoftwareSwitch(SoftwareSwitch::new()),
            DatapathMode::ProgrammablePipeline => {
                Self::ProgrammablePipeline(ProgrammablePipeline::new())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SoftwareSwitch(_) => software_switch::BACKEND,
            Self::ProgrammablePipeline(_) => programmable_pipeline::BACKEND,
        }
    }

    pub fn is_connected(&self, reference_ip: Option<Ipv4Addr>) -> bool {
        match self {
            Self::SoftwareSwitch(switch) => switch.is_connected(),
            Self::ProgrammablePipeline(pipeline) => pipeline.is_connected(reference_ip),
        }
    }

    pub fn add_slice_info(&self, slice: &SliceInfo) -> Result<(), BackendError> {
        match self {
            Self::SoftwareSwitch(switch) => switch.add_slice_info(slice),
            Self::ProgrammablePipeline(pipeline) => pipeline.add_slice_info(slice),
        }
    }

    /// Meters of the slice the datapath currently enforces.
    pub fn active_meters(&self) -> Option<SliceMeters> {
        match self {
            Self::SoftwareSwitch(switch) => switch.active_meters(),
            Self::ProgrammablePipeline(pipeline) => pipeline.active_meters(),
        }
    }

    /// One-time wiring; later calls are logged and ignored.
    pub fn set_upf_info(&self, upf: &UpfState, config: &Config) {
        match self {
            Self::SoftwareSwitch(switch) => switch.set_upf_info(upf, config),
            Self::ProgrammablePipeline(pipeline) => pipeline.set_upf_info(upf, config),
        }
    }
}
