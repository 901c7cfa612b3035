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

//! Outbound notification pipeline toward the load-balancer peers and the
//! aggregator, plus the gateway registration gate.

pub mod messages;
pub(crate) mod notify_worker;
pub mod notify_pool;
pub mod peer_client;
pub mod registration_gate;

pub use notify_pool::{
    DispatchError, DispatchSettings, DispatchStats, DispatchStatsSnapshot, NotificationDispatcher,
    NotifyJob, PeerRole, StartError,
};
pub use peer_client::{DeliveryOutcome, PeerClient, RetryPolicy, SuccessPolicy, TransportError};
pub use registration_gate::{GatewayRole, RegistrationGate};
