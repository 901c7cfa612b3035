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

//! Per-association handle tying sessions to the shared store, dispatcher and
//! metrics collector.

use crate::control_plane::notified_set::NotifiedAddressSet;
use crate::control_plane::session::PfcpSession;
use crate::control_plane::session_store::{SessionStore, StoreError};
use crate::data_plane::notify_pool::{DispatchError, NotificationDispatcher};
use crate::ip_pool::PoolError;
use crate::metrics::{SessionCollector, SessionMetrics};
use crate::observability::{events, fields};
use crate::upf_state::UpfState;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "pfcp_conn";

/// One PFCP association with a remote control-plane node.
///
/// The notified-address set lives exactly as long as this value, so a new
/// association re-notifies every address it installs.
pub struct PfcpConn {
    remote_node_id: String,
    notified: NotifiedAddressSet,
    upf: Arc<UpfState>,
    store: Arc<SessionStore>,
    dispatcher: Arc<NotificationDispatcher>,
    collector: Arc<SessionCollector>,
}

impl PfcpConn {
    pub fn new(
        remote_node_id: impl Into<String>,
        upf: Arc<UpfState>,
        store: Arc<SessionStore>,
        dispatcher: Arc<NotificationDispatcher>,
        collector: Arc<SessionCollector>,
    ) -> Self {
        Self {
            remote_node_id: remote_node_id.into(),
            notified: NotifiedAddressSet::new(),
            upf,
            store,
            dispatcher,
            collector,
        }
    }

    pub fn remote_node_id(&self) -> &str {
        &self.remote_node_id
    }

    pub fn notified_addresses(&self) -> &NotifiedAddressSet {
        &self.notified
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Builds a session with a fresh metrics handle registered with the collector.
    pub fn new_session(&self, local_seid: u64, remote_seid: u64) -> PfcpSession {
        let metrics = Arc::new(SessionMetrics::new(self.remote_node_id.as_str()));
        self.collector.save(&metrics);
        PfcpSession::new(local_seid, remote_seid, metrics)
    }

    /// Allocates a UE address when the UPF owns UE address assignment.
    pub fn allocate_ue_address(&self, local_seid: u64) -> Result<Option<Ipv4Addr>, PoolError> {
        match (&self.upf.ip_pool, self.upf.enable_ue_ip_alloc) {
            (Some(pool), true) => pool.allocate(local_seid).map(Some),
            _ => Ok(None),
        }
    }

    pub fn put_session(&self, session: PfcpSession, push_notify: bool) -> Result<(), StoreError> {
        self.store.put(session, self, push_notify)
    }

    /// Retires the session's metrics, returns its UE address and drops it from the store.
    pub fn remove_session(&self, session: &PfcpSession) {
        session.metrics.retire();
        self.collector.save(&session.metrics);

        if let Some(pool) = self.upf.ip_pool.as_ref() {
            pool.deallocate(session.local_seid);
        }

        if let Err(err) = self.store.delete(session.local_seid) {
            warn!(
                event = events::SESSION_REMOVE_FAILED,
                component = COMPONENT,
                local_seid = session.local_seid,
                err = %err,
                "failed to remove session from store"
            );
        }
    }

    /// Claims the addresses not yet notified on this connection and enqueues a push.
    ///
    /// Never blocks; if the queue refuses the job the claim is released so a
    /// later put can retry.
    pub(crate) fn notify_ue_addresses(&self, local_seid: u64, ue_addresses: &[Ipv4Addr]) {
        let claimed = self.notified.claim_new(ue_addresses);
        if claimed.is_empty() {
            return;
        }

        debug!(
            event = events::UE_ADDRESSES_CLAIMED,
            component = COMPONENT,
            local_seid,
            remote_node = self.remote_node_id.as_str(),
            ue_addresses = fields::format_addresses(&claimed).as_str(),
            "claimed UE addresses for peer notification"
        );

        if let Err(err) = self
            .dispatcher
            .push_rules(self.upf.gateway_ip(), &claimed)
        {
            self.notified.release(&claimed);
            let event = match err {
                DispatchError::QueueFull => events::NOTIFY_QUEUE_FULL,
                DispatchError::QueueClosed => events::NOTIFY_QUEUE_CLOSED,
            };
            warn!(
                event,
                component = COMPONENT,
                local_seid,
                ue_addresses = fields::format_addresses(&claimed).as_str(),
                err = %err,
                "dropping UE address notification"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::PfcpConn;
    use crate::control_plane::session_store::SessionStore;
    use crate::data_plane::notify_pool::{DispatchSettings, NotificationDispatcher, NotifyJob};
    use crate::ip_pool::UeIpPool;
    use crate::metrics::SessionCollector;
    use crate::runtime::BackgroundTasks;
    use crate::upf_state::{UpfSettings, UpfState};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    pub(crate) fn upf() -> UpfState {
        UpfState::new(UpfSettings {
            access_iface: "access".into(),
            core_iface: "core".into(),
            access_ip: Some(Ipv4Addr::new(10, 0, 1, 5)),
            core_ip: Some(Ipv4Addr::new(10, 0, 2, 5)),
            node_id: "upf-0".into(),
            gateway_ip: Some(Ipv4Addr::new(10, 0, 2, 1)),
            ip_pool: Some(UeIpPool::new("10.250.0.0/24").unwrap()),
            enable_ue_ip_alloc: true,
            max_req_retries: 5,
            ..Default::default()
        })
    }

    /// Connection whose dispatcher has no workers; queued jobs land in the receiver.
    pub(crate) fn detached_conn_with_queue(
        queue_size: usize,
    ) -> (PfcpConn, mpsc::Receiver<NotifyJob>) {
        let (dispatcher, jobs) = NotificationDispatcher::detached(
            DispatchSettings {
                queue_size,
                ..Default::default()
            },
            BackgroundTasks::new(),
        )
        .unwrap();
        let conn = PfcpConn::new(
            "smf-1",
            Arc::new(upf()),
            Arc::new(SessionStore::new()),
            Arc::new(dispatcher),
            Arc::new(SessionCollector::new().unwrap()),
        );
        (conn, jobs)
    }

    pub(crate) fn detached_conn() -> (PfcpConn, mpsc::Receiver<NotifyJob>) {
        detached_conn_with_queue(64)
    }
}
