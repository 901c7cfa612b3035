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

//! Two-phase gate that opens once both gateway roles have registered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const GATEWAY_ROLES: u8 = 2;

/// Side of the UPF a gateway was learned on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayRole {
    Access,
    Core,
}

impl GatewayRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayRole::Access => "access",
            GatewayRole::Core => "core",
        }
    }
}

impl fmt::Display for GatewayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way registration latches plus a count-down from two.
///
/// Each latch flips `false -> true` at most once; the countdown reaches zero
/// exactly when both have flipped, in either order.
#[derive(Debug)]
pub struct RegistrationGate {
    access: AtomicBool,
    core: AtomicBool,
    remaining: watch::Sender<u8>,
}

impl RegistrationGate {
    pub fn new() -> Self {
        let (remaining, _) = watch::channel(GATEWAY_ROLES);
        Self {
            access: AtomicBool::new(false),
            core: AtomicBool::new(false),
            remaining,
        }
    }

    fn latch(&self, role: GatewayRole) -> &AtomicBool {
        match role {
            GatewayRole::Access => &self.access,
            GatewayRole::Core => &self.core,
        }
    }

    /// Sets the latch for `role`. Returns `true` only on the first call per role.
    pub fn mark_registered(&self, role: GatewayRole) -> bool {
        if self.latch(role).swap(true, Ordering::SeqCst) {
            return false;
        }
        self.remaining
            .send_modify(|remaining| *remaining = remaining.saturating_sub(1));
        true
    }

    pub fn is_registered(&self, role: GatewayRole) -> bool {
        self.latch(role).load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        *self.remaining.borrow() == 0
    }

    /// Waits until both roles registered. Returns `false` if `cancel` fired first.
    pub async fn wait_open(&self, cancel: &CancellationToken) -> bool {
        let mut remaining = self.remaining.subscribe();
        let opened = async move { remaining.wait_for(|left| *left == 0).await.is_ok() };

        tokio::select! {
            _ = cancel.cancelled() => false,
            opened = opened => opened,
        }
    }
}

impl Default for RegistrationGate {
    fn default() -> Self {
        Self::new()
    }
}
