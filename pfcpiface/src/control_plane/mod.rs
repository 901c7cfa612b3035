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

//! Session state: rule model, session records, the concurrent store and the
//! per-association connection handle.

pub mod notified_set;
pub mod pfcp_conn;
pub mod rules;
pub mod session;
pub mod session_store;

pub use notified_set::NotifiedAddressSet;
pub use pfcp_conn::PfcpConn;
pub use rules::{Far, ForwardingRuleSet, Pdr, Qer, MAX_ITEMS};
pub use session::PfcpSession;
pub use session_store::{SessionStore, StoreError};
