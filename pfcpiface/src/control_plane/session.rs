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

//! PFCP session record held by the session store.

use crate::control_plane::rules::ForwardingRuleSet;
use crate::metrics::SessionMetrics;
use std::fmt;
use std::sync::Arc;

/// One PFCP session: endpoint identifiers, installed rules and a metrics handle.
///
/// Clones share the metrics handle, so a session read back from the store
/// retires the same handle the establishment path registered.
#[derive(Clone, Debug)]
pub struct PfcpSession {
    pub local_seid: u64,
    pub remote_seid: u64,
    pub rules: ForwardingRuleSet,
    pub metrics: Arc<SessionMetrics>,
}

impl PfcpSession {
    pub fn new(local_seid: u64, remote_seid: u64, metrics: Arc<SessionMetrics>) -> Self {
        Self {
            local_seid,
            remote_seid,
            rules: ForwardingRuleSet::new(),
            metrics,
        }
    }
}

impl fmt::Display for PfcpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session(local_seid={:#x}, remote_seid={:#x}, {})",
            self.local_seid, self.remote_seid, self.rules
        )
    }
}
