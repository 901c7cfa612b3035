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

//! Top-level UPF control interface: wires state, backend, dispatcher and the
//! HTTP surface, and owns their shutdown.

use crate::config::{Config, ConfigError};
use crate::control_plane::{PfcpConn, SessionStore};
use crate::data_plane::messages::RegisterRequest;
use crate::data_plane::notify_pool::{NotificationDispatcher, StartError};
use crate::datapath::DatapathBackend;
use crate::host_network::{self, HostNetwork};
use crate::ip_pool::UeIpPool;
use crate::metrics::SessionCollector;
use crate::observability::events;
use crate::runtime::BackgroundTasks;
use crate::upf_state::{UpfSettings, UpfState};
use crate::web::{self, WebState};
use axum::Router;
use prometheus::Registry;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const COMPONENT: &str = "pfcp_iface";

#[derive(Debug, Error)]
pub enum IfaceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatcher(#[from] StartError),
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct PfcpIface {
    config: Config,
    upf: Arc<UpfState>,
    store: Arc<SessionStore>,
    collector: Arc<SessionCollector>,
    metrics: Registry,
    dispatcher: Arc<NotificationDispatcher>,
    backend: Arc<DatapathBackend>,
    host: Arc<dyn HostNetwork>,
    tasks: BackgroundTasks,
    registration: RegisterRequest,
}

impl PfcpIface {
    /// Resolves node identity and interface addresses, wires the datapath and
    /// starts the notification workers.
    pub async fn new(config: Config, host: Arc<dyn HostNetwork>) -> Result<Self, IfaceError> {
        config.validate()?;

        let access_iface = config.access_ifname().to_string();
        let core_iface = config.core_ifname().to_string();
        let access_ip = resolve_interface_ip(&access_iface, config.access.ip)?;
        let core_ip = resolve_interface_ip(&core_iface, config.core.ip)?;
        let node_id = resolve_node_id(&config).await?;
        let gateway_ip = resolve_gateway_ip(&config, host.as_ref(), &core_iface).await;

        let ip_pool = match (&config.cpiface.ue_ip_pool, config.cpiface.enable_ue_ip_alloc) {
            (Some(cidr), true) => Some(
                UeIpPool::new(cidr).map_err(|err| ConfigError::Invalid(err.to_string()))?,
            ),
            (None, true) => {
                return Err(ConfigError::Invalid(
                    "cpiface.enable_ue_ip_alloc requires cpiface.ue_ip_pool".into(),
                )
                .into())
            }
            _ => None,
        };

        let upf = Arc::new(UpfState::new(UpfSettings {
            access_iface: access_iface.clone(),
            core_iface: core_iface.clone(),
            access_ip: Some(access_ip),
            core_ip: Some(core_ip),
            node_id,
            dnn: config.cpiface.dnn.clone(),
            peers: config.cpiface.peers.clone(),
            ip_pool,
            gateway_ip,
            enable_ue_ip_alloc: config.cpiface.enable_ue_ip_alloc,
            enable_end_marker: config.enable_end_marker,
            enable_flow_measure: config.enable_flow_measure,
            max_req_retries: config.notify.max_req_retries,
        }));

        let backend = Arc::new(DatapathBackend::for_mode(config.mode));
        backend.set_upf_info(&upf, &config);

        let tasks = BackgroundTasks::new();
        let dispatcher = Arc::new(NotificationDispatcher::start(
            config.notify.dispatch_settings(),
            tasks.clone(),
        )?);

        let metrics = Registry::new();
        let collector = Arc::new(SessionCollector::new()?);
        collector.register(&metrics)?;
        dispatcher.register_metrics(&metrics)?;

        let registration = RegisterRequest {
            gwip: gateway_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            coremac: interface_mac_text(&core_iface).unwrap_or_default(),
            accessmac: interface_mac_text(&access_iface),
            hostname: hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok()),
        };

        info!(
            event = events::IFACE_START,
            component = COMPONENT,
            node_id = upf.node_id.as_str(),
            dnn = upf.dnn.as_str(),
            %access_ip,
            %core_ip,
            gateway_ip = gateway_ip.map(|ip| ip.to_string()).unwrap_or_default().as_str(),
            backend = backend.name(),
            connected = backend.is_connected(Some(access_ip)),
            "UPF control interface initialised"
        );

        Ok(Self {
            config,
            upf,
            store: Arc::new(SessionStore::new()),
            collector,
            metrics,
            dispatcher,
            backend,
            host,
            tasks,
            registration,
        })
    }

    pub fn upf(&self) -> &Arc<UpfState> {
        &self.upf
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn collector(&self) -> &Arc<SessionCollector> {
        &self.collector
    }

    /// Registry behind the `/metrics` route.
    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    pub fn backend(&self) -> &Arc<DatapathBackend> {
        &self.backend
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn registration(&self) -> &RegisterRequest {
        &self.registration
    }

    /// Whether the datapath can be reached through the access address.
    pub fn is_connected(&self) -> bool {
        self.backend.is_connected(Some(self.upf.access_ip))
    }

    /// Connection handle for a newly associated control-plane node.
    pub fn connection(&self, remote_node_id: impl Into<String>) -> PfcpConn {
        PfcpConn::new(
            remote_node_id,
            self.upf.clone(),
            self.store.clone(),
            self.dispatcher.clone(),
            self.collector.clone(),
        )
    }

    pub fn router(&self) -> Router {
        web::router(WebState {
            upf: self.upf.clone(),
            backend: self.backend.clone(),
            dispatcher: self.dispatcher.clone(),
            host: self.host.clone(),
            gateway: self.config.gateway.clone(),
            metrics: self.metrics.clone(),
        })
    }

    /// Binds the configured HTTP port and runs until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), IfaceError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.cpiface.http_port));
        let listener = TcpListener::bind(addr).await?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Registers with both peers, serves HTTP on `listener`, then drains
    /// background work once `shutdown` fires.
    pub async fn run_with_listener(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), IfaceError> {
        self.dispatcher
            .register_with_peers(self.registration.clone());

        let served = web::serve(
            listener,
            self.router(),
            shutdown,
            self.config.shutdown_grace(),
        )
        .await;

        self.stop().await;
        served.map_err(IfaceError::from)
    }

    /// Cancels every retry loop and waits for the workers to finish.
    pub async fn stop(&self) -> bool {
        let drained = self.tasks.shutdown(self.config.shutdown_grace()).await;
        info!(
            event = events::IFACE_STOP,
            component = COMPONENT,
            drained,
            sessions = self.store.len(),
            "UPF control interface stopped"
        );
        drained
    }
}

fn resolve_interface_ip(
    iface: &str,
    configured: Option<Ipv4Addr>,
) -> Result<Ipv4Addr, ConfigError> {
    if let Some(ip) = configured {
        return Ok(ip);
    }
    host_network::interface_ipv4(iface)
        .map_err(|err| ConfigError::Interface {
            iface: iface.to_string(),
            reason: err.to_string(),
        })?
        .ok_or_else(|| ConfigError::Interface {
            iface: iface.to_string(),
            reason: "no IPv4 address assigned".into(),
        })
}

fn interface_mac_text(iface: &str) -> Option<String> {
    match host_network::interface_mac(iface) {
        Ok(mac) => mac.map(|mac| mac.to_string()),
        Err(err) => {
            warn!(component = COMPONENT, iface, err = %err, "failed to read interface MAC");
            None
        }
    }
}

/// Node id from config, or the host name with `use_fqdn`, resolved to an address.
async fn resolve_node_id(config: &Config) -> Result<String, ConfigError> {
    let mut node_id = config.cpiface.node_id.clone().unwrap_or_default();
    if node_id.is_empty() && config.cpiface.use_fqdn {
        node_id = hostname::get()
            .map_err(|err| ConfigError::Resolve {
                what: "hostname",
                reason: err.to_string(),
            })?
            .to_string_lossy()
            .into_owned();
    }
    if node_id.is_empty() {
        return Ok(node_id);
    }

    let mut addrs = tokio::net::lookup_host((node_id.as_str(), 0))
        .await
        .map_err(|err| ConfigError::Resolve {
            what: "node id",
            reason: format!("{node_id}: {err}"),
        })?;
    addrs
        .find(SocketAddr::is_ipv4)
        .map(|addr| addr.ip().to_string())
        .ok_or_else(|| ConfigError::Resolve {
            what: "node id",
            reason: format!("{node_id} has no IPv4 address"),
        })
}

async fn resolve_gateway_ip(
    config: &Config,
    host: &dyn HostNetwork,
    core_iface: &str,
) -> Option<Ipv4Addr> {
    if let Some(ip) = config.gateway.ip {
        return Some(ip);
    }
    match host.default_gateway(core_iface).await {
        Ok(gateway) => gateway,
        Err(err) => {
            warn!(
                component = COMPONENT,
                iface = core_iface,
                err = %err,
                "failed to read default gateway"
            );
            None
        }
    }
}
