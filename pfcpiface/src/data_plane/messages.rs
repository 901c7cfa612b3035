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

//! JSON bodies exchanged with the load-balancer peers and the aggregator.

use crate::upf_state::UpfSnapshot;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// `POST /addrule` body.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RuleRequest {
    pub gwip: String,
    pub ip: Vec<String>,
}

impl RuleRequest {
    pub fn new(gateway_ip: Option<Ipv4Addr>, ue_addresses: &[Ipv4Addr]) -> Self {
        Self {
            gwip: gateway_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            ip: ue_addresses.iter().map(Ipv4Addr::to_string).collect(),
        }
    }
}

/// `POST /register` body.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub gwip: String,
    pub coremac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessmac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// One-time self-registration body posted to the aggregator.
#[derive(Clone, Debug, Serialize)]
pub struct SelfRegistration {
    pub ip: String,
    pub upf: UpfSnapshot,
}

#[cfg(test)]
mod tests {
    use super::{RegisterRequest, RuleRequest};
    use serde_json::json;
    use std::net::Ipv4Addr;

    #[test]
    fn rule_request_uses_dotted_strings() {
        let request = RuleRequest::new(
            Some(Ipv4Addr::new(192, 168, 250, 1)),
            &[Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)],
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"gwip": "192.168.250.1", "ip": ["10.0.0.1", "10.0.0.2"]})
        );
    }

    #[test]
    fn rule_request_without_gateway_sends_empty_gwip() {
        let request = RuleRequest::new(None, &[]);

        assert_eq!(request.gwip, "");
        assert!(request.ip.is_empty());
    }

    #[test]
    fn register_request_omits_absent_optionals() {
        let request = RegisterRequest {
            gwip: "192.168.250.1".into(),
            coremac: "0a:00:00:00:00:01".into(),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"gwip": "192.168.250.1", "coremac": "0a:00:00:00:00:01"})
        );
    }
}
