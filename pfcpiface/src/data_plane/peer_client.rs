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

//! HTTP client for peer notifications with a fixed-backoff retry loop.

use crate::observability::{events, fields};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "peer_client";

/// Outbound call failure. Always retried by [`PeerClient::deliver_with_retry`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    UnexpectedStatus { url: String, status: u16 },
}

/// Which response statuses count as delivered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuccessPolicy {
    /// Only `201 Created`.
    Created,
    /// Any `2xx`.
    AnySuccess,
}

impl SuccessPolicy {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            SuccessPolicy::Created => status == StatusCode::CREATED,
            SuccessPolicy::AnySuccess => status.is_success(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts; `None` retries until cancelled.
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff,
        }
    }

    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match *self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Exhausted { attempts }
            | DeliveryOutcome::Cancelled { attempts } => attempts,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    /// Builds a client whose every request is bounded by `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { http })
    }

    /// Posts `body` once.
    pub async fn post_json<T>(
        &self,
        url: &str,
        body: &T,
        success: SuccessPolicy,
    ) -> Result<u16, TransportError>
    where
        T: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if success.accepts(status) {
            Ok(status.as_u16())
        } else {
            Err(TransportError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// Posts `body` until accepted, the attempt budget runs out or `cancel` fires.
    ///
    /// Failures never escape; the outcome reports how the loop ended.
    pub async fn deliver_with_retry<T>(
        &self,
        peer: &str,
        url: &str,
        body: &T,
        success: SuccessPolicy,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome
    where
        T: Serialize + Sync + ?Sized,
    {
        let max_attempts = fields::format_max_attempts(policy.max_attempts);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(
                event = events::NOTIFY_SEND_ATTEMPT,
                component = COMPONENT,
                peer,
                url,
                attempt = attempts,
                max_attempts = max_attempts.as_str(),
                "posting to peer"
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(
                        event = events::NOTIFY_SEND_CANCELLED,
                        component = COMPONENT,
                        peer,
                        url,
                        attempt = attempts,
                        reason = fields::REASON_SHUTDOWN,
                        "peer delivery cancelled"
                    );
                    return DeliveryOutcome::Cancelled { attempts };
                }
                result = self.post_json(url, body, success) => result,
            };

            let err = match result {
                Ok(status) => {
                    info!(
                        event = events::NOTIFY_SEND_OK,
                        component = COMPONENT,
                        peer,
                        url,
                        attempt = attempts,
                        status,
                        "peer accepted notification"
                    );
                    return DeliveryOutcome::Delivered { attempts };
                }
                Err(err) => err,
            };

            if policy.exhausted(attempts) {
                error!(
                    event = events::NOTIFY_SEND_EXHAUSTED,
                    component = COMPONENT,
                    peer,
                    url,
                    attempts,
                    err = %err,
                    "giving up on peer notification"
                );
                return DeliveryOutcome::Exhausted { attempts };
            }

            warn!(
                event = events::NOTIFY_SEND_RETRY,
                component = COMPONENT,
                peer,
                url,
                attempt = attempts,
                max_attempts = max_attempts.as_str(),
                backoff_ms = policy.backoff.as_millis() as u64,
                err = %err,
                "peer notification failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(
                        event = events::NOTIFY_SEND_CANCELLED,
                        component = COMPONENT,
                        peer,
                        url,
                        attempt = attempts,
                        reason = fields::REASON_SHUTDOWN,
                        "peer delivery cancelled during backoff"
                    );
                    return DeliveryOutcome::Cancelled { attempts };
                }
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeliveryOutcome, PeerClient, RetryPolicy, SuccessPolicy};
    use reqwest::StatusCode;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn success_policies() {
        assert!(SuccessPolicy::Created.accepts(StatusCode::CREATED));
        assert!(!SuccessPolicy::Created.accepts(StatusCode::OK));
        assert!(SuccessPolicy::AnySuccess.accepts(StatusCode::OK));
        assert!(SuccessPolicy::AnySuccess.accepts(StatusCode::NO_CONTENT));
        assert!(!SuccessPolicy::AnySuccess.accepts(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn bounded_policy_exhausts_at_max() {
        let policy = RetryPolicy::bounded(3, Duration::ZERO);

        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
        assert!(!RetryPolicy::unbounded(Duration::ZERO).exhausted(u32::MAX));
    }

    #[tokio::test]
    async fn unreachable_peer_exhausts_bounded_budget() {
        let client = PeerClient::new(Duration::from_millis(200)).unwrap();
        let policy = RetryPolicy::bounded(2, Duration::from_millis(1));

        // Port 9 on loopback refuses connections.
        let outcome = client
            .deliver_with_retry(
                "ingress",
                "http://127.0.0.1:9/addrule",
                &serde_json::json!({}),
                SuccessPolicy::Created,
                &policy,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 2 });
    }

    #[tokio::test]
    async fn cancelled_token_stops_unbounded_retry() {
        let client = PeerClient::new(Duration::from_millis(200)).unwrap();
        let cancel = CancellationToken::new();
        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let outcome = client
            .deliver_with_retry(
                "aggregator",
                "http://127.0.0.1:9/",
                &serde_json::json!({}),
                SuccessPolicy::AnySuccess,
                &RetryPolicy::unbounded(Duration::from_millis(5)),
                &cancel,
            )
            .await;
        stopper.await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Cancelled { attempts } if attempts >= 1));
    }
}
