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

//! JSON5 configuration document.

use crate::data_plane::notify_pool::DispatchSettings;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Widest accepted `cpiface.ue_ip_pool` prefix length.
pub const MIN_UE_POOL_PREFIX: u8 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("interface {iface}: {reason}")]
    Interface { iface: String, reason: String },
    #[error("failed to resolve {what}: {reason}")]
    Resolve { what: &'static str, reason: String },
}

/// Datapath backend selected at startup.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DatapathMode {
    #[default]
    SoftwareSwitch,
    ProgrammablePipeline,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub mode: DatapathMode,
    pub access: InterfaceConfig,
    pub core: InterfaceConfig,
    pub cpiface: CpIfaceConfig,
    pub enable_end_marker: bool,
    pub enable_flow_measure: bool,
    pub notify: NotifyConfig,
    pub gateway: GatewayConfig,
    pub software_switch: SoftwareSwitchConfig,
    pub programmable_pipeline: ProgrammablePipelineConfig,
    /// Grace period for the HTTP listener and background task drain.
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: DatapathMode::default(),
            access: InterfaceConfig::default(),
            core: InterfaceConfig::default(),
            cpiface: CpIfaceConfig::default(),
            enable_end_marker: false,
            enable_flow_measure: false,
            notify: NotifyConfig::default(),
            gateway: GatewayConfig::default(),
            software_switch: SoftwareSwitchConfig::default(),
            programmable_pipeline: ProgrammablePipelineConfig::default(),
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    /// Empty means the role's default name (`access` / `core`).
    #[serde(default)]
    pub ifname: String,
    /// Overrides the address read from the interface.
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct CpIfaceConfig {
    pub node_id: Option<String>,
    /// Advertise the host's FQDN instead of the access address as node id.
    pub use_fqdn: bool,
    pub dnn: String,
    pub ue_ip_pool: Option<String>,
    pub enable_ue_ip_alloc: bool,
    pub http_port: u16,
    pub peers: Vec<String>,
}

impl Default for CpIfaceConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            use_fqdn: false,
            dnn: "internet".to_string(),
            ue_ip_pool: None,
            enable_ue_ip_alloc: false,
            http_port: 8080,
            peers: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub ingress_peer: String,
    pub egress_peer: String,
    pub aggregator: String,
    pub request_timeout_ms: u64,
    pub backoff_ms: u64,
    pub max_req_retries: u32,
    pub queue_size: usize,
    pub workers: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        let settings = DispatchSettings::default();
        Self {
            ingress_peer: settings.ingress_peer,
            egress_peer: settings.egress_peer,
            aggregator: settings.aggregator,
            request_timeout_ms: settings.request_timeout.as_millis() as u64,
            backoff_ms: settings.backoff.as_millis() as u64,
            max_req_retries: settings.max_req_retries,
            queue_size: settings.queue_size,
            workers: settings.workers,
        }
    }
}

impl NotifyConfig {
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            ingress_peer: self.ingress_peer.clone(),
            egress_peer: self.egress_peer.clone(),
            aggregator: self.aggregator.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            backoff: Duration::from_millis(self.backoff_ms),
            max_req_retries: self.max_req_retries,
            queue_size: self.queue_size,
            workers: self.workers,
        }
    }
}

/// Routes installed when a peer gateway registers for one role.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// /24 whose last octet is replaced by the gateway's to form the shadow next hop.
    pub shadow_prefix: Ipv4Network,
    pub downstream_subnet: Ipv4Network,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Own gateway; read from the core interface's default route when absent.
    pub ip: Option<Ipv4Addr>,
    pub access_route: RouteConfig,
    pub core_route: RouteConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ip: None,
            access_route: RouteConfig {
                shadow_prefix: slash24(192, 168, 252),
                downstream_subnet: slash24(192, 168, 251),
            },
            core_route: RouteConfig {
                shadow_prefix: slash24(192, 168, 250),
                downstream_subnet: slash24(192, 168, 200),
            },
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SoftwareSwitchConfig {
    pub endpoint: String,
}

impl Default for SoftwareSwitchConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:10514".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ProgrammablePipelineConfig {
    pub endpoint: String,
    /// Address the pipeline reaches this UPF on; required to report connected.
    pub access_ip: Option<Ipv4Addr>,
}

impl Default for ProgrammablePipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "onos:51001".to_string(),
            access_ip: None,
        }
    }
}

impl Config {
    /// Reads, parses and validates the JSON5 document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn access_ifname(&self) -> &str {
        non_empty_or(&self.access.ifname, "access")
    }

    pub fn core_ifname(&self) -> &str {
        non_empty_or(&self.core.ifname, "core")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let notify = &self.notify;
        if notify.max_req_retries == 0 {
            return Err(ConfigError::Invalid(
                "notify.max_req_retries must be at least 1".into(),
            ));
        }
        if notify.workers == 0 {
            return Err(ConfigError::Invalid(
                "notify.workers must be at least 1".into(),
            ));
        }
        if notify.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "notify.queue_size must be at least 1".into(),
            ));
        }

        for (name, route) in [
            ("gateway.access_route", &self.gateway.access_route),
            ("gateway.core_route", &self.gateway.core_route),
        ] {
            for (field, network) in [
                ("shadow_prefix", route.shadow_prefix),
                ("downstream_subnet", route.downstream_subnet),
            ] {
                if network.prefix() != 24 {
                    return Err(ConfigError::Invalid(format!(
                        "{name}.{field} must be a /24, got {network}"
                    )));
                }
            }
        }

        if let Some(cidr) = self.cpiface.ue_ip_pool.as_deref() {
            let pool = cidr.parse::<Ipv4Network>().map_err(|err| {
                ConfigError::Invalid(format!("cpiface.ue_ip_pool {cidr:?}: {err}"))
            })?;
            if pool.prefix() < MIN_UE_POOL_PREFIX {
                return Err(ConfigError::Invalid(format!(
                    "cpiface.ue_ip_pool {cidr:?} must be /{MIN_UE_POOL_PREFIX} or narrower"
                )));
            }
        }
        Ok(())
    }
}

fn slash24(a: u8, b: u8, c: u8) -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(a, b, c, 0), 24).expect("/24 is valid")
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, DatapathMode};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::parse("{}").unwrap();

        assert_eq!(config.mode, DatapathMode::SoftwareSwitch);
        assert_eq!(config.access_ifname(), "access");
        assert_eq!(config.core_ifname(), "core");
        assert_eq!(config.cpiface.dnn, "internet");
        assert_eq!(config.cpiface.http_port, 8080);
        assert_eq!(config.notify.max_req_retries, 5);
        assert_eq!(config.notify.ingress_peer, "http://enterlb:8080");
        assert_eq!(config.notify.egress_peer, "http://exitlb:8080");
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(
            config.gateway.core_route.downstream_subnet.to_string(),
            "192.168.200.0/24"
        );
        assert_eq!(
            config.gateway.access_route.shadow_prefix.to_string(),
            "192.168.252.0/24"
        );
    }

    #[test]
    fn parses_json5_with_comments_and_overrides() {
        let config = Config::parse(
            r#"{
                // pipeline deployment
                mode: "programmable_pipeline",
                access: { ifname: "ens1", ip: "10.0.1.5" },
                notify: { max_req_retries: 3, backoff_ms: 250 },
                programmable_pipeline: { access_ip: "10.0.1.5" },
                shutdown_grace_secs: 2,
            }"#,
        )
        .unwrap();

        assert_eq!(config.mode, DatapathMode::ProgrammablePipeline);
        assert_eq!(config.access_ifname(), "ens1");
        assert_eq!(config.access.ip, Some(Ipv4Addr::new(10, 0, 1, 5)));
        let settings = config.notify.dispatch_settings();
        assert_eq!(settings.max_req_retries, 3);
        assert_eq!(settings.backoff, Duration::from_millis(250));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(2));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            Config::parse("{ notify: { retries: 3 } }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_zero_retry_budget() {
        assert!(matches!(
            Config::parse("{ notify: { max_req_retries: 0 } }"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_non_24_route_prefix() {
        let result = Config::parse(
            r#"{ gateway: { access_route: {
                shadow_prefix: "192.168.0.0/16",
                downstream_subnet: "192.168.251.0/24"
            } } }"#,
        );

        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("shadow_prefix")));
    }

    #[test]
    fn rejects_malformed_ue_pool() {
        assert!(matches!(
            Config::parse(r#"{ cpiface: { ue_ip_pool: "10.250.0.0/99" } }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_ue_pool_wider_than_slash8() {
        for cidr in ["0.0.0.0/0", "16.0.0.0/4"] {
            let document = format!(r#"{{ cpiface: {{ ue_ip_pool: "{cidr}" }} }}"#);
            assert!(
                matches!(Config::parse(&document), Err(ConfigError::Invalid(msg)) if msg.contains("/8")),
                "{cidr} accepted"
            );
        }

        let config = Config::parse(r#"{ cpiface: { ue_ip_pool: "10.250.0.0/16" } }"#).unwrap();
        assert_eq!(config.cpiface.ue_ip_pool.as_deref(), Some("10.250.0.0/16"));
    }
}
