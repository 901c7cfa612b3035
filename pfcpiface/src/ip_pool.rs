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

//! UE address pool used when the UPF allocates UE IPs itself.

use crate::config::MIN_UE_POOL_PREFIX;
use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PoolError {
    #[error("invalid UE pool CIDR {0:?}")]
    InvalidCidr(String),
    #[error("UE pool {0} has no free address")]
    Exhausted(Ipv4Network),
}

#[derive(Debug)]
struct PoolState {
    // Next never-used host offset inside the network.
    next_offset: u32,
    released: Vec<Ipv4Addr>,
    by_seid: HashMap<u64, Ipv4Addr>,
}

/// Allocator over the host addresses of one IPv4 network.
#[derive(Debug)]
pub struct UeIpPool {
    network: Ipv4Network,
    state: Mutex<PoolState>,
}

impl UeIpPool {
    pub fn new(cidr: &str) -> Result<Self, PoolError> {
        let network: Ipv4Network = cidr
            .parse()
            .map_err(|_| PoolError::InvalidCidr(cidr.to_string()))?;
        if network.prefix() < MIN_UE_POOL_PREFIX {
            return Err(PoolError::InvalidCidr(cidr.to_string()));
        }
        Ok(Self {
            network,
            state: Mutex::new(PoolState {
                next_offset: 1,
                released: Vec::new(),
                by_seid: HashMap::new(),
            }),
        })
    }

    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    /// Number of usable host addresses (network and broadcast excluded).
    pub fn capacity(&self) -> u32 {
        self.network.size().saturating_sub(2)
    }

    /// Allocates an address for `seid`; a SEID that already holds one gets it back.
    pub fn allocate(&self, seid: u64) -> Result<Ipv4Addr, PoolError> {
        let mut state = self.state.lock();
        if let Some(address) = state.by_seid.get(&seid) {
            return Ok(*address);
        }

        let address = match state.released.pop() {
            Some(address) => address,
            None => {
                if state.next_offset > self.capacity() {
                    return Err(PoolError::Exhausted(self.network));
                }
                let address = self
                    .network
                    .nth(state.next_offset)
                    .ok_or(PoolError::Exhausted(self.network))?;
                state.next_offset += 1;
                address
            }
        };

        state.by_seid.insert(seid, address);
        Ok(address)
    }

    /// Returns the address held by `seid` to the pool.
    pub fn deallocate(&self, seid: u64) -> Option<Ipv4Addr> {
        let mut state = self.state.lock();
        let address = state.by_seid.remove(&seid)?;
        state.released.push(address);
        Some(address)
    }

    pub fn allocated(&self) -> usize {
        self.state.lock().by_seid.len()
    }
}
