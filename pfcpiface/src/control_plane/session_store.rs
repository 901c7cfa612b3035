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

//! Concurrent session registry keyed by local SEID.

use crate::control_plane::pfcp_conn::PfcpConn;
use crate::control_plane::session::PfcpSession;
use crate::observability::events;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

const COMPONENT: &str = "session_store";

/// Session store and rule-model failures.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("invalid argument {field}: {value}")]
    InvalidArgument { field: &'static str, value: u64 },
    #[error("rule list {list} is full ({max} entries)")]
    RuleLimitExceeded { list: &'static str, max: usize },
}

/// In-memory session registry.
///
/// Backed by a sharded map so sessions with different keys never serialize on
/// a single lock; writes to the same key are serialized by its shard.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<u64, PfcpSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the session under its local SEID.
    ///
    /// With `push_notify`, UE addresses not yet notified on `conn` are claimed and
    /// handed to the notification dispatcher without waiting for delivery.
    pub fn put(
        &self,
        session: PfcpSession,
        conn: &PfcpConn,
        push_notify: bool,
    ) -> Result<(), StoreError> {
        if session.local_seid == 0 {
            warn!(
                event = events::SESSION_PUT_REJECTED,
                component = COMPONENT,
                remote_seid = session.remote_seid,
                "rejecting session with zero local SEID"
            );
            return Err(StoreError::InvalidArgument {
                field: "session.local_seid",
                value: session.local_seid,
            });
        }

        let ue_addresses = push_notify.then(|| session.rules.ue_addresses());
        let local_seid = session.local_seid;

        trace!(
            event = events::SESSION_PUT,
            component = COMPONENT,
            %session,
            "saved PFCP session to local store"
        );
        self.sessions.insert(local_seid, session);

        if let Some(ue_addresses) = ue_addresses {
            conn.notify_ue_addresses(local_seid, &ue_addresses);
        }

        Ok(())
    }

    pub fn get(&self, local_seid: u64) -> Option<PfcpSession> {
        let session = self
            .sessions
            .get(&local_seid)
            .map(|entry| entry.value().clone());
        trace!(
            event = events::SESSION_GET,
            component = COMPONENT,
            local_seid,
            found = session.is_some(),
            "looked up PFCP session"
        );
        session
    }

    /// Removes the session; removing an absent key is not an error.
    pub fn delete(&self, local_seid: u64) -> Result<(), StoreError> {
        let removed = self.sessions.remove(&local_seid).is_some();
        debug!(
            event = events::SESSION_DELETE,
            component = COMPONENT,
            local_seid,
            removed,
            "PFCP session removed from local store"
        );
        Ok(())
    }

    /// Point-in-time copy of every session, one read per key.
    pub fn get_all(&self) -> Vec<PfcpSession> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn delete_all(&self) {
        self.sessions.clear();
        debug!(
            event = events::SESSION_DELETE_ALL,
            component = COMPONENT,
            "all PFCP sessions removed from local store"
        );
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
