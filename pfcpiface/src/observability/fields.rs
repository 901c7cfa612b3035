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

//! Canonical structured field values and value-format helpers.

use std::net::Ipv4Addr;

pub const NONE: &str = "none";
pub const UNLIMITED: &str = "unlimited";
pub const REASON_SHUTDOWN: &str = "shutdown";
pub const REASON_QUEUE_CLOSED: &str = "queue_closed";

/// Identity of one background worker for log correlation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub worker_index: usize,
}

impl WorkerContext {
    pub fn new(worker_index: usize) -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().hyphenated().to_string(),
            worker_index,
        }
    }
}

/// Renders a UE address list as a compact comma separated value.
pub fn format_addresses(addresses: &[Ipv4Addr]) -> String {
    if addresses.is_empty() {
        return NONE.to_string();
    }
    addresses
        .iter()
        .map(Ipv4Addr::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders an attempt bound, where `None` means retry until cancelled.
pub fn format_max_attempts(max_attempts: Option<u32>) -> String {
    max_attempts
        .map(|max| max.to_string())
        .unwrap_or_else(|| UNLIMITED.to_string())
}

#[cfg(test)]
mod tests {
    use super::{format_addresses, format_max_attempts, WorkerContext, NONE, UNLIMITED};
    use std::net::Ipv4Addr;

    #[test]
    fn format_addresses_joins_in_order() {
        let addresses = [Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1)];

        assert_eq!(format_addresses(&addresses), "10.0.0.2,10.0.0.1");
    }

    #[test]
    fn format_addresses_returns_none_when_empty() {
        assert_eq!(format_addresses(&[]), NONE);
    }

    #[test]
    fn format_max_attempts_marks_unbounded_loops() {
        assert_eq!(format_max_attempts(Some(3)), "3");
        assert_eq!(format_max_attempts(None), UNLIMITED);
    }

    #[test]
    fn worker_context_ids_are_unique() {
        let first = WorkerContext::new(0);
        let second = WorkerContext::new(0);

        assert_ne!(first.worker_id, second.worker_id);
        assert_eq!(first.worker_index, second.worker_index);
    }
}
