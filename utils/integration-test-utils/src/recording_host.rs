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

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use pfcpiface::host_network::{HostNetwork, MacAddr, OsCommandError};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

/// One host-network call seen by [`RecordingHostNetwork`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostCall {
    ReplaceRoute {
        destination: Ipv4Network,
        gateway: Ipv4Addr,
    },
    AddStaticNeighbor {
        ip: Ipv4Addr,
        mac: MacAddr,
        iface: String,
    },
}

/// [`HostNetwork`] double that records mutations instead of touching the OS.
pub struct RecordingHostNetwork {
    calls: Mutex<Vec<HostCall>>,
    fail_routes: AtomicBool,
    fail_neighbors: AtomicBool,
    default_gateway: Option<Ipv4Addr>,
    local_ip: Option<Ipv4Addr>,
}

impl RecordingHostNetwork {
    pub fn new(local_ip: Option<Ipv4Addr>, default_gateway: Option<Ipv4Addr>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_routes: AtomicBool::new(false),
            fail_neighbors: AtomicBool::new(false),
            default_gateway,
            local_ip,
        }
    }

    pub fn fail_routes(&self, fail: bool) {
        self.fail_routes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_neighbors(&self, fail: bool) {
        self.fail_neighbors.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    fn failure(command: String) -> OsCommandError {
        OsCommandError::Failed {
            command,
            status: "exit status: 2".to_string(),
            stderr: "simulated failure".to_string(),
        }
    }
}

impl Default for RecordingHostNetwork {
    fn default() -> Self {
        Self::new(Some(Ipv4Addr::new(10, 0, 2, 5)), None)
    }
}

#[async_trait]
impl HostNetwork for RecordingHostNetwork {
    async fn replace_route(
        &self,
        destination: Ipv4Network,
        gateway: Ipv4Addr,
    ) -> Result<(), OsCommandError> {
        if self.fail_routes.load(Ordering::SeqCst) {
            return Err(Self::failure(format!(
                "ip route replace {destination} via {gateway}"
            )));
        }
        self.calls.lock().push(HostCall::ReplaceRoute {
            destination,
            gateway,
        });
        Ok(())
    }

    async fn add_static_neighbor(
        &self,
        ip: Ipv4Addr,
        mac: MacAddr,
        iface: &str,
    ) -> Result<(), OsCommandError> {
        if self.fail_neighbors.load(Ordering::SeqCst) {
            return Err(Self::failure(format!("arp -s {ip} {mac} -i {iface}")));
        }
        self.calls.lock().push(HostCall::AddStaticNeighbor {
            ip,
            mac,
            iface: iface.to_string(),
        });
        Ok(())
    }

    async fn default_gateway(&self, _iface: &str) -> Result<Option<Ipv4Addr>, OsCommandError> {
        Ok(self.default_gateway)
    }

    async fn local_ipv4(&self) -> Result<Option<Ipv4Addr>, OsCommandError> {
        Ok(self.local_ip)
    }
}
