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

//! Notification dispatcher: bounded rule-push queue, retry worker pool and
//! one-shot registration tasks.

use crate::data_plane::messages::{RegisterRequest, RuleRequest, SelfRegistration};
use crate::data_plane::notify_worker::NotifyWorker;
use crate::data_plane::peer_client::{
    DeliveryOutcome, PeerClient, RetryPolicy, SuccessPolicy, TransportError,
};
use crate::host_network::HostNetwork;
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::BackgroundTasks;
use crate::upf_state::UpfState;
use std::net::Ipv4Addr;
use prometheus::{IntCounter, Registry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "notify_pool";

/// Load-balancer role of a downstream peer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PeerRole {
    Ingress,
    Egress,
}

impl PeerRole {
    pub const ALL: [PeerRole; 2] = [PeerRole::Ingress, PeerRole::Egress];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerRole::Ingress => "ingress",
            PeerRole::Egress => "egress",
        }
    }
}

/// One queued rule push for one peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifyJob {
    pub peer: PeerRole,
    pub url: String,
    pub request: RuleRequest,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DispatchError {
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    QueueClosed,
}

impl<T> From<TrySendError<T>> for DispatchError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::QueueClosed,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DispatchSettings {
    /// Base URL of the ingress load balancer, without a trailing path.
    pub ingress_peer: String,
    pub egress_peer: String,
    /// Full URL the self-registration body is posted to.
    pub aggregator: String,
    pub request_timeout: Duration,
    pub backoff: Duration,
    /// Attempt budget for one rule push.
    pub max_req_retries: u32,
    pub queue_size: usize,
    pub workers: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ingress_peer: "http://enterlb:8080".to_string(),
            egress_peer: "http://exitlb:8080".to_string(),
            aggregator: "http://upf-http:8081/".to_string(),
            request_timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(1),
            max_req_retries: 5,
            queue_size: 1024,
            workers: 4,
        }
    }
}

impl DispatchSettings {
    pub fn peer_base(&self, peer: PeerRole) -> &str {
        match peer {
            PeerRole::Ingress => &self.ingress_peer,
            PeerRole::Egress => &self.egress_peer,
        }
    }

    pub fn peer_url(&self, peer: PeerRole, path: &str) -> String {
        format!("{}/{}", self.peer_base(peer).trim_end_matches('/'), path)
    }

    fn rule_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.max_req_retries, self.backoff)
    }

    fn registration_policy(&self) -> RetryPolicy {
        RetryPolicy::unbounded(self.backoff)
    }
}

/// Delivery counters, updated as each retry loop ends.
#[derive(Clone)]
pub struct DispatchStats {
    attempts: IntCounter,
    delivered: IntCounter,
    failed: IntCounter,
    cancelled: IntCounter,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchStatsSnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl DispatchStats {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            attempts: IntCounter::new(
                "upf_notify_attempts_total",
                "HTTP attempts made towards peers and the aggregator",
            )?,
            delivered: IntCounter::new(
                "upf_notify_delivered_total",
                "Notifications accepted by their receiver",
            )?,
            failed: IntCounter::new(
                "upf_notify_failed_total",
                "Notifications dropped after exhausting their retries",
            )?,
            cancelled: IntCounter::new(
                "upf_notify_cancelled_total",
                "Notifications abandoned on shutdown",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        for counter in [&self.attempts, &self.delivered, &self.failed, &self.cancelled] {
            registry.register(Box::new(counter.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn record(&self, outcome: &DeliveryOutcome) {
        self.attempts.inc_by(u64::from(outcome.attempts()));
        match outcome {
            DeliveryOutcome::Delivered { .. } => self.delivered.inc(),
            DeliveryOutcome::Exhausted { .. } => self.failed.inc(),
            DeliveryOutcome::Cancelled { .. } => self.cancelled.inc(),
        }
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            attempts: self.attempts.get(),
            delivered: self.delivered.get(),
            failed: self.failed.get(),
            cancelled: self.cancelled.get(),
        }
    }
}

/// Failure to bring up the dispatcher.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to create dispatch metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Pushes UE address assignments and registrations to the downstream peers.
///
/// Rule pushes go through a bounded queue drained by `workers` retry loops;
/// registrations run as their own background tasks. Every loop stops when the
/// shared [`BackgroundTasks`] token is cancelled.
pub struct NotificationDispatcher {
    settings: DispatchSettings,
    client: PeerClient,
    jobs: mpsc::Sender<NotifyJob>,
    tasks: BackgroundTasks,
    stats: Arc<DispatchStats>,
    self_registration_triggered: AtomicBool,
}

impl NotificationDispatcher {
    /// Creates the queue and spawns the worker pool on `tasks`.
    pub fn start(
        settings: DispatchSettings,
        tasks: BackgroundTasks,
    ) -> Result<Self, StartError> {
        let (dispatcher, receiver) = Self::detached(settings, tasks)?;
        let worker = NotifyWorker {
            jobs: Arc::new(Mutex::new(receiver)),
            client: dispatcher.client.clone(),
            policy: dispatcher.settings.rule_policy(),
            stats: dispatcher.stats.clone(),
            cancel: dispatcher.tasks.token(),
        };

        for worker_index in 0..dispatcher.settings.workers.max(1) {
            let worker = worker.clone();
            dispatcher.tasks.spawn(
                "notify-worker",
                worker.run(WorkerContext::new(worker_index)),
            );
        }

        Ok(dispatcher)
    }

    /// Builds the dispatcher without workers and hands back the queue's receiving end.
    pub(crate) fn detached(
        settings: DispatchSettings,
        tasks: BackgroundTasks,
    ) -> Result<(Self, mpsc::Receiver<NotifyJob>), StartError> {
        let client = PeerClient::new(settings.request_timeout)?;
        let (jobs, receiver) = mpsc::channel(settings.queue_size.max(1));
        Ok((
            Self {
                settings,
                client,
                jobs,
                tasks,
                stats: Arc::new(DispatchStats::new()?),
                self_registration_triggered: AtomicBool::new(false),
            },
            receiver,
        ))
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Exposes the delivery counters through `registry`.
    pub fn register_metrics(&self, registry: &Registry) -> prometheus::Result<()> {
        self.stats.register(registry)
    }

    /// Enqueues one `/addrule` push per peer without waiting for delivery.
    ///
    /// Both jobs are enqueued or neither is.
    pub fn push_rules(
        &self,
        gateway_ip: Option<Ipv4Addr>,
        ue_addresses: &[Ipv4Addr],
    ) -> Result<(), DispatchError> {
        if ue_addresses.is_empty() {
            return Ok(());
        }

        let request = RuleRequest::new(gateway_ip, ue_addresses);
        let ingress = self.jobs.try_reserve()?;
        let egress = self.jobs.try_reserve()?;

        for (permit, peer) in [ingress, egress].into_iter().zip(PeerRole::ALL) {
            permit.send(NotifyJob {
                peer,
                url: self.settings.peer_url(peer, "addrule"),
                request: request.clone(),
            });
        }

        debug!(
            event = events::NOTIFY_ENQUEUED,
            component = COMPONENT,
            ue_addresses = fields::format_addresses(ue_addresses).as_str(),
            "rule push enqueued for both peers"
        );
        Ok(())
    }

    /// Starts one `/register` task per peer, retried until accepted or shutdown.
    pub fn register_with_peers(&self, request: RegisterRequest) {
        let request = Arc::new(request);
        for peer in PeerRole::ALL {
            let url = self.settings.peer_url(peer, "register");
            let client = self.client.clone();
            let policy = self.settings.registration_policy();
            let stats = self.stats.clone();
            let cancel = self.tasks.token();
            let request = request.clone();

            info!(
                event = events::PEER_REGISTER_START,
                component = COMPONENT,
                peer = peer.as_str(),
                url = url.as_str(),
                "registering with peer"
            );
            self.tasks.spawn("peer-register", async move {
                let outcome = client
                    .deliver_with_retry(
                        peer.as_str(),
                        &url,
                        request.as_ref(),
                        SuccessPolicy::Created,
                        &policy,
                        &cancel,
                    )
                    .await;
                stats.record(&outcome);
            });
        }
    }

    /// Starts the gated self-registration task. Later calls are no-ops.
    ///
    /// The task waits until both gateway roles have registered, then posts the
    /// local address and a snapshot of `upf` to the aggregator once.
    pub fn trigger_self_registration(
        &self,
        upf: Arc<UpfState>,
        host: Arc<dyn HostNetwork>,
    ) -> bool {
        if self.self_registration_triggered.swap(true, Ordering::SeqCst) {
            debug!(
                event = events::SELF_REGISTER_DUPLICATE_TRIGGER,
                component = COMPONENT,
                "self-registration already triggered"
            );
            return false;
        }

        let url = self.settings.aggregator.clone();
        let client = self.client.clone();
        let policy = self.settings.registration_policy();
        let stats = self.stats.clone();
        let cancel = self.tasks.token();

        self.tasks.spawn("self-register", async move {
            info!(
                event = events::SELF_REGISTER_WAITING,
                component = COMPONENT,
                "waiting for access and core gateways"
            );
            if !upf.gateways().wait_open(&cancel).await {
                return;
            }
            info!(
                event = events::SELF_REGISTER_GATE_OPEN,
                component = COMPONENT,
                "both gateways registered"
            );

            let ip = match host.local_ipv4().await {
                Ok(Some(ip)) => ip,
                Ok(None) => {
                    warn!(
                        event = events::SELF_REGISTER_NO_LOCAL_IP,
                        component = COMPONENT,
                        "no non-loopback IPv4 address, skipping self-registration"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        event = events::SELF_REGISTER_NO_LOCAL_IP,
                        component = COMPONENT,
                        err = %err,
                        "local address lookup failed, skipping self-registration"
                    );
                    return;
                }
            };

            let body = SelfRegistration {
                ip: ip.to_string(),
                upf: upf.snapshot(),
            };
            let outcome = client
                .deliver_with_retry(
                    "aggregator",
                    &url,
                    &body,
                    SuccessPolicy::AnySuccess,
                    &policy,
                    &cancel,
                )
                .await;
            stats.record(&outcome);
        });
        true
    }

    pub fn self_registration_triggered(&self) -> bool {
        self.self_registration_triggered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DispatchError, DispatchSettings, DispatchStats, NotificationDispatcher, PeerRole,
    };
    use crate::data_plane::peer_client::DeliveryOutcome;
    use crate::runtime::BackgroundTasks;
    use prometheus::Registry;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn settings(queue_size: usize) -> DispatchSettings {
        DispatchSettings {
            ingress_peer: "http://enterlb:8080/".into(),
            egress_peer: "http://exitlb:8080".into(),
            queue_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn push_rules_enqueues_one_job_per_peer() {
        let (dispatcher, mut jobs) =
            NotificationDispatcher::detached(settings(8), BackgroundTasks::new()).unwrap();
        let ue = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];

        dispatcher
            .push_rules(Some(Ipv4Addr::new(192, 168, 250, 1)), &ue)
            .unwrap();

        let ingress = jobs.try_recv().unwrap();
        let egress = jobs.try_recv().unwrap();
        assert!(jobs.try_recv().is_err());

        assert_eq!(ingress.peer, PeerRole::Ingress);
        assert_eq!(ingress.url, "http://enterlb:8080/addrule");
        assert_eq!(egress.peer, PeerRole::Egress);
        assert_eq!(egress.url, "http://exitlb:8080/addrule");
        assert_eq!(ingress.request, egress.request);
        assert_eq!(ingress.request.gwip, "192.168.250.1");
        assert_eq!(ingress.request.ip, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn push_rules_with_no_addresses_enqueues_nothing() {
        let (dispatcher, mut jobs) =
            NotificationDispatcher::detached(settings(8), BackgroundTasks::new()).unwrap();

        dispatcher.push_rules(None, &[]).unwrap();

        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn push_rules_is_all_or_nothing_when_queue_is_full() {
        let (dispatcher, mut jobs) =
            NotificationDispatcher::detached(settings(3), BackgroundTasks::new()).unwrap();
        let ue = [Ipv4Addr::new(10, 0, 0, 1)];

        dispatcher.push_rules(None, &ue).unwrap();
        assert_eq!(dispatcher.push_rules(None, &ue), Err(DispatchError::QueueFull));

        assert!(jobs.try_recv().is_ok());
        assert!(jobs.try_recv().is_ok());
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn push_rules_reports_closed_queue() {
        let (dispatcher, jobs) =
            NotificationDispatcher::detached(settings(8), BackgroundTasks::new()).unwrap();
        drop(jobs);

        assert_eq!(
            dispatcher.push_rules(None, &[Ipv4Addr::new(10, 0, 0, 1)]),
            Err(DispatchError::QueueClosed)
        );
    }

    #[test]
    fn stats_accumulate_attempts_per_outcome() {
        let stats = DispatchStats::new().unwrap();

        stats.record(&DeliveryOutcome::Delivered { attempts: 3 });
        stats.record(&DeliveryOutcome::Exhausted { attempts: 5 });
        stats.record(&DeliveryOutcome::Cancelled { attempts: 1 });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempts, 9);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.cancelled, 1);
    }

    #[tokio::test]
    async fn registered_counters_follow_recorded_outcomes() {
        let registry = Registry::new();
        let (dispatcher, _jobs) =
            NotificationDispatcher::detached(settings(8), BackgroundTasks::new()).unwrap();
        dispatcher.register_metrics(&registry).unwrap();

        dispatcher
            .stats
            .record(&DeliveryOutcome::Exhausted { attempts: 5 });

        let families = registry.gather();
        let value = |name: &str| {
            families
                .iter()
                .find(|family| family.get_name() == name)
                .map(|family| family.get_metric()[0].get_counter().get_value())
        };
        assert_eq!(value("upf_notify_attempts_total"), Some(5.0));
        assert_eq!(value("upf_notify_failed_total"), Some(1.0));
        assert_eq!(value("upf_notify_delivered_total"), Some(0.0));
    }

    #[tokio::test]
    async fn workers_stop_on_shutdown() {
        let tasks = BackgroundTasks::new();
        let dispatcher = NotificationDispatcher::start(
            DispatchSettings {
                workers: 3,
                ..settings(8)
            },
            tasks.clone(),
        )
        .unwrap();

        assert_eq!(tasks.len(), 3);
        assert!(tasks.shutdown(Duration::from_secs(1)).await);
        assert_eq!(
            dispatcher.push_rules(None, &[Ipv4Addr::new(10, 0, 0, 1)]),
            Err(DispatchError::QueueClosed)
        );
    }
}
