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

mod support;

use integration_test_utils::{FakePeer, PeerBehavior, RecordingHostNetwork};
use pfcpiface::control_plane::{Pdr, PfcpSession};
use pfcpiface::{PfcpConn, StoreError};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use axum::http::{Method, StatusCode};
use support::{build_iface, offline_config, send_text, Peers};

const A: Ipv4Addr = Ipv4Addr::new(10, 250, 0, 1);
const B: Ipv4Addr = Ipv4Addr::new(10, 250, 0, 2);
const C: Ipv4Addr = Ipv4Addr::new(10, 250, 0, 3);

fn session_with(conn: &PfcpConn, local_seid: u64, addresses: &[Ipv4Addr]) -> PfcpSession {
    let mut session = conn.new_session(local_seid, local_seid + 1000);
    for (index, address) in addresses.iter().enumerate() {
        session
            .rules
            .add_pdr(Pdr {
                pdr_id: index as u32 + 1,
                ue_address: *address,
                ..Default::default()
            })
            .unwrap();
    }
    session
}

async fn peers() -> Peers {
    Peers {
        ingress: FakePeer::start(PeerBehavior::default()).await,
        egress: FakePeer::start(PeerBehavior::default()).await,
        aggregator: FakePeer::start(PeerBehavior::default()).await,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn both_peers_receive_each_distinct_address_once() {
    let peers = peers().await;
    let iface = build_iface(peers.config(), Arc::new(RecordingHostNetwork::default())).await;
    let conn = iface.connection("smf-1");

    conn.put_session(session_with(&conn, 1, &[A, B, A, C]), true)
        .unwrap();

    for peer in [&peers.ingress, &peers.egress] {
        assert!(
            peer.wait_for_attempts("/addrule", 1, Duration::from_secs(3))
                .await
        );
        let bodies = peer.bodies("/addrule");
        let addresses: Vec<&str> = bodies[0]["ip"]
            .as_array()
            .unwrap()
            .iter()
            .map(|ip| ip.as_str().unwrap())
            .collect();
        assert_eq!(addresses, vec!["10.250.0.1", "10.250.0.2", "10.250.0.3"]);
    }

    conn.put_session(session_with(&conn, 1, &[A, B, C]), true)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(peers.ingress.attempts("/addrule"), 1);
    assert_eq!(peers.egress.attempts("/addrule"), 1);
    iface.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_connection_notifies_again() {
    let peers = peers().await;
    let iface = build_iface(peers.config(), Arc::new(RecordingHostNetwork::default())).await;

    for _ in 0..2 {
        let conn = iface.connection("smf-1");
        conn.put_session(session_with(&conn, 1, &[A]), true).unwrap();
    }

    assert!(
        peers
            .ingress
            .wait_for_attempts("/addrule", 2, Duration::from_secs(3))
            .await
    );
    iface.stop().await;
}

#[tokio::test]
async fn store_lifecycle_through_connection() {
    let iface = build_iface(offline_config(), Arc::new(RecordingHostNetwork::default())).await;
    let conn = iface.connection("smf-1");

    assert_eq!(
        conn.put_session(conn.new_session(0, 1), false),
        Err(StoreError::InvalidArgument {
            field: "session.local_seid",
            value: 0
        })
    );
    assert!(iface.store().is_empty());

    for seid in 1..=10 {
        conn.put_session(session_with(&conn, seid, &[]), false).unwrap();
    }
    let seids: HashSet<u64> = iface
        .store()
        .get_all()
        .iter()
        .map(|session| session.local_seid)
        .collect();
    assert_eq!(seids, (1..=10).collect());
    assert_eq!(iface.collector().node_stats("smf-1").active, 11);

    let session = iface.store().get(4).unwrap();
    conn.remove_session(&session);
    conn.remove_session(&session);
    assert!(iface.store().get(4).is_none());
    let stats = iface.collector().node_stats("smf-1");
    assert_eq!(stats.deleted_total, 1);
    assert_eq!(stats.active, 10);

    iface.store().delete_all();
    assert!(iface.store().get_all().is_empty());
    iface.stop().await;
}

#[tokio::test]
async fn metrics_route_exports_session_and_delivery_series() {
    let iface = build_iface(offline_config(), Arc::new(RecordingHostNetwork::default())).await;
    let conn = iface.connection("smf-1");
    conn.put_session(session_with(&conn, 7, &[]), false).unwrap();
    let retired = session_with(&conn, 8, &[]);
    conn.put_session(retired.clone(), false).unwrap();
    conn.remove_session(&retired);

    let (status, text) = send_text(&iface.router(), Method::GET, "/metrics", "").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(r#"pfcp_sessions_active{node_id="smf-1"} 1"#), "{text}");
    assert!(text.contains(r#"pfcp_sessions_created_total{node_id="smf-1"} 2"#), "{text}");
    assert!(text.contains(r#"pfcp_sessions_deleted_total{node_id="smf-1"} 1"#), "{text}");
    assert!(text.contains(r#"pfcp_session_lifetime_seconds_count{node_id="smf-1"} 1"#), "{text}");
    assert!(text.contains("upf_notify_attempts_total"), "{text}");

    let (status, _) = send_text(&iface.router(), Method::POST, "/metrics", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    iface.stop().await;
}
