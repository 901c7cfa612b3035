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

//! Retry worker that drains the shared rule-push queue.

use crate::data_plane::notify_pool::{DispatchStats, NotifyJob};
use crate::data_plane::peer_client::{
    DeliveryOutcome, PeerClient, RetryPolicy, SuccessPolicy,
};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const COMPONENT: &str = "notify_worker";

pub(crate) type SharedJobReceiver = Arc<Mutex<mpsc::Receiver<NotifyJob>>>;

/// Everything one worker needs; cloned per worker from the dispatcher.
#[derive(Clone)]
pub(crate) struct NotifyWorker {
    pub(crate) jobs: SharedJobReceiver,
    pub(crate) client: PeerClient,
    pub(crate) policy: RetryPolicy,
    pub(crate) stats: Arc<DispatchStats>,
    pub(crate) cancel: CancellationToken,
}

impl NotifyWorker {
    /// Pulls jobs until the queue closes or shutdown begins.
    pub(crate) async fn run(self, worker_context: WorkerContext) {
        debug!(
            event = events::NOTIFY_WORKER_START,
            component = COMPONENT,
            worker_id = worker_context.worker_id.as_str(),
            worker_index = worker_context.worker_index,
            "notification worker started"
        );

        let reason = loop {
            let next_job = async { self.jobs.lock().await.recv().await };
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break fields::REASON_SHUTDOWN,
                job = next_job => match job {
                    Some(job) => job,
                    None => break fields::REASON_QUEUE_CLOSED,
                },
            };

            let outcome = self
                .client
                .deliver_with_retry(
                    job.peer.as_str(),
                    &job.url,
                    &job.request,
                    SuccessPolicy::Created,
                    &self.policy,
                    &self.cancel,
                )
                .await;
            self.stats.record(&outcome);

            if let DeliveryOutcome::Exhausted { attempts } = outcome {
                error!(
                    event = events::NOTIFY_SEND_EXHAUSTED,
                    component = COMPONENT,
                    worker_id = worker_context.worker_id.as_str(),
                    peer = job.peer.as_str(),
                    attempts,
                    ue_addresses = job.request.ip.join(",").as_str(),
                    "rule push abandoned"
                );
            }
        };

        debug!(
            event = events::NOTIFY_WORKER_STOP,
            component = COMPONENT,
            worker_id = worker_context.worker_id.as_str(),
            worker_index = worker_context.worker_index,
            reason,
            "notification worker stopped"
        );
    }
}
