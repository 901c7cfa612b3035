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

//! Tracked, cancellable background tasks.

use crate::observability::events;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const COMPONENT: &str = "background_tasks";

/// Shared owner of every long-lived task spawned by the interface.
///
/// Cloning is cheap and every clone observes the same shutdown token, so
/// handlers can spawn work that is still drained by [`BackgroundTasks::shutdown`].
#[derive(Clone, Debug)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token every retry loop must observe.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns a tracked task. The future is responsible for observing [`Self::token`].
    pub fn spawn<F>(&self, name: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(component = COMPONENT, task = name, "spawning background task");
        self.tracker.spawn(task)
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Cancels every task and waits up to `grace` for them to finish.
    ///
    /// Returns `true` when all tasks completed within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!(
                    event = events::TASKS_DRAINED,
                    component = COMPONENT,
                    "background tasks drained"
                );
                true
            }
            Err(_) => {
                warn!(
                    event = events::TASKS_DRAIN_TIMEOUT,
                    component = COMPONENT,
                    remaining = self.tracker.len(),
                    grace_ms = grace.as_millis() as u64,
                    "background tasks still running after grace period"
                );
                false
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::BackgroundTasks;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_waits_for_tasks_that_observe_the_token() {
        let tasks = BackgroundTasks::new();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = finished.clone();
        let token = tasks.token();

        tasks.spawn("sleeper", async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(3600)) => {
                    finished_clone.store(true, Ordering::SeqCst);
                }
            }
        });

        assert!(tasks.shutdown(Duration::from_secs(1)).await);
        assert!(!finished.load(Ordering::SeqCst));
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn shutdown_reports_tasks_that_ignore_the_token() {
        let tasks = BackgroundTasks::new();

        tasks.spawn("stubborn", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        assert!(!tasks.shutdown(Duration::from_millis(20)).await);
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_the_shutdown_token() {
        let tasks = BackgroundTasks::new();
        let clone = tasks.clone();

        tasks.shutdown(Duration::from_millis(10)).await;

        assert!(clone.token().is_cancelled());
    }
}
