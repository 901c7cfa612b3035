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

//! # pfcpiface
//!
//! Session and forwarding-state manager for a UPF control interface.
//!
//! The crate keeps the PFCP session store and its forwarding rules, pushes UE
//! address assignments to the ingress and egress load balancers, registers the
//! node with an aggregator once both peer gateways are known, and drives one
//! of two datapath backends. PFCP message encoding and the association state
//! machine live outside this crate; they hand sessions in through [`PfcpConn`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use pfcpiface::{Config, IpCommandHostNetwork, PfcpIface};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("upf.json5")?;
//! let iface = PfcpIface::new(config, Arc::new(IpCommandHostNetwork::new())).await?;
//!
//! let conn = iface.connection("smf-1");
//! let session = conn.new_session(1, 100);
//! conn.put_session(session, true)?;
//!
//! iface.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control_plane;
pub mod data_plane;
pub mod datapath;
pub mod host_network;
pub mod ip_pool;
pub mod metrics;
pub mod observability;
mod pfcp_iface;
pub mod runtime;
pub mod upf_state;
pub mod web;

pub use config::{Config, ConfigError, DatapathMode};
pub use control_plane::{
    ForwardingRuleSet, PfcpConn, PfcpSession, SessionStore, StoreError,
};
pub use data_plane::{
    DispatchSettings, GatewayRole, NotificationDispatcher, PeerRole, TransportError,
};
pub use datapath::{BackendError, DatapathBackend};
pub use host_network::{HostNetwork, IpCommandHostNetwork, MacAddr, OsCommandError};
pub use pfcp_iface::{IfaceError, PfcpIface};
pub use upf_state::{SliceInfo, SliceStatus, UpfState};
