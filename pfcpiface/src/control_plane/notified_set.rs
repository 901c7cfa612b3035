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

//! Per-connection record of UE addresses already pushed to the load-balancer peers.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Deduplication set scoped to one PFCP connection.
///
/// Only used to avoid redundant pushes; losing it (reconnect, restart) causes
/// duplicate notifications, which peers tolerate.
#[derive(Debug, Default)]
pub struct NotifiedAddressSet {
    addresses: Mutex<HashSet<Ipv4Addr>>,
}

impl NotifiedAddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks every not-yet-notified address and returns those, in input order.
    ///
    /// Concurrent callers never both claim the same address.
    pub fn claim_new(&self, candidates: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        let mut addresses = self.addresses.lock();
        candidates
            .iter()
            .copied()
            .filter(|address| addresses.insert(*address))
            .collect()
    }

    /// Forgets previously claimed addresses so a later put notifies them again.
    pub fn release(&self, claimed: &[Ipv4Addr]) {
        let mut addresses = self.addresses.lock();
        for address in claimed {
            addresses.remove(address);
        }
    }

    pub fn contains(&self, address: &Ipv4Addr) -> bool {
        self.addresses.lock().contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::NotifiedAddressSet;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    #[test]
    fn claim_new_returns_only_unseen_addresses() {
        let set = NotifiedAddressSet::new();
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);

        assert_eq!(set.claim_new(&[a, b, a]), vec![a, b]);
        assert!(set.claim_new(&[a, b]).is_empty());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn release_allows_reclaiming() {
        let set = NotifiedAddressSet::new();
        let a = Ipv4Addr::new(10, 0, 0, 1);
        set.claim_new(&[a]);

        set.release(&[a]);

        assert!(!set.contains(&a));
        assert_eq!(set.claim_new(&[a]), vec![a]);
    }

    #[test]
    fn concurrent_claims_hand_out_each_address_once() {
        let set = Arc::new(NotifiedAddressSet::new());
        let candidates: Vec<Ipv4Addr> = (1..=200u8).map(|i| Ipv4Addr::new(10, 1, 0, i)).collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = set.clone();
                let candidates = candidates.clone();
                std::thread::spawn(move || set.claim_new(&candidates))
            })
            .collect();

        let total: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread panicked").len())
            .sum();

        assert_eq!(total, candidates.len());
    }
}
