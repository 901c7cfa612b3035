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

//! Host routing and neighbor-table side effects.
//!
//! Everything that touches the OS goes through [`HostNetwork`] so the gateway
//! registrar can be driven against a recording double in tests.

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::net::Ipv4Addr;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const COMPONENT: &str = "host_network";

pub use pnet::util::MacAddr;

/// Failure of an OS networking command.
#[derive(Debug, Error)]
pub enum OsCommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("interface lookup failed: {0}")]
    Interfaces(#[from] nix::Error),
}

#[async_trait]
pub trait HostNetwork: Send + Sync {
    /// Installs or replaces the route `destination via gateway`.
    async fn replace_route(
        &self,
        destination: Ipv4Network,
        gateway: Ipv4Addr,
    ) -> Result<(), OsCommandError>;

    /// Installs a permanent neighbor entry `ip -> mac` on `iface`.
    async fn add_static_neighbor(
        &self,
        ip: Ipv4Addr,
        mac: MacAddr,
        iface: &str,
    ) -> Result<(), OsCommandError>;

    /// Default-route next hop through `iface`, if one is configured.
    async fn default_gateway(&self, iface: &str) -> Result<Option<Ipv4Addr>, OsCommandError>;

    /// First non-loopback IPv4 address on the host.
    async fn local_ipv4(&self) -> Result<Option<Ipv4Addr>, OsCommandError>;
}

/// Production [`HostNetwork`] built on the `ip` and `arp` tools.
#[derive(Clone, Debug, Default)]
pub struct IpCommandHostNetwork;

impl IpCommandHostNetwork {
    pub fn new() -> Self {
        Self
    }

    async fn run(program: &str, args: &[String]) -> Result<String, OsCommandError> {
        let command = format!("{program} {}", args.join(" "));
        debug!(component = COMPONENT, command = %command, "running host command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| OsCommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OsCommandError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl HostNetwork for IpCommandHostNetwork {
    async fn replace_route(
        &self,
        destination: Ipv4Network,
        gateway: Ipv4Addr,
    ) -> Result<(), OsCommandError> {
        let args = [
            "route".to_string(),
            "replace".to_string(),
            destination.to_string(),
            "via".to_string(),
            gateway.to_string(),
        ];
        Self::run("ip", &args).await.map(|_| ())
    }

    async fn add_static_neighbor(
        &self,
        ip: Ipv4Addr,
        mac: MacAddr,
        iface: &str,
    ) -> Result<(), OsCommandError> {
        let args = [
            "-s".to_string(),
            ip.to_string(),
            mac.to_string(),
            "-i".to_string(),
            iface.to_string(),
        ];
        Self::run("arp", &args).await.map(|_| ())
    }

    async fn default_gateway(&self, iface: &str) -> Result<Option<Ipv4Addr>, OsCommandError> {
        let args = [
            "route".to_string(),
            "show".to_string(),
            "default".to_string(),
            "dev".to_string(),
            iface.to_string(),
        ];
        let output = Self::run("ip", &args).await?;
        Ok(parse_gateway_ip(&output))
    }

    async fn local_ipv4(&self) -> Result<Option<Ipv4Addr>, OsCommandError> {
        Ok(local_ipv4()?)
    }
}

/// Extracts the next hop from `ip route show` output (`default via <ip> ...`).
pub fn parse_gateway_ip(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [_, "via", gateway, ..] => gateway.parse().ok(),
            _ => None,
        }
    })
}

/// IPv4 address assigned to `iface`.
pub fn interface_ipv4(iface: &str) -> Result<Option<Ipv4Addr>, nix::Error> {
    Ok(getifaddrs()?
        .filter(|ifaddr| ifaddr.interface_name == iface)
        .find_map(|ifaddr| {
            let address = ifaddr.address?;
            address.as_sockaddr_in().map(|sin| Ipv4Addr::from(sin.ip()))
        }))
}

/// Hardware address of `iface`.
pub fn interface_mac(iface: &str) -> Result<Option<MacAddr>, nix::Error> {
    Ok(getifaddrs()?
        .filter(|ifaddr| ifaddr.interface_name == iface)
        .find_map(|ifaddr| {
            let address = ifaddr.address?;
            let [a, b, c, d, e, f] = address.as_link_addr()?.addr()?;
            Some(MacAddr::new(a, b, c, d, e, f))
        }))
}

/// First IPv4 address on a non-loopback interface.
pub fn local_ipv4() -> Result<Option<Ipv4Addr>, nix::Error> {
    Ok(getifaddrs()?
        .filter(|ifaddr| !ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK))
        .find_map(|ifaddr| {
            let address = ifaddr.address?;
            let ip = Ipv4Addr::from(address.as_sockaddr_in()?.ip());
            (!ip.is_loopback()).then_some(ip)
        }))
}

#[cfg(test)]
mod tests {
    use super::{parse_gateway_ip, MacAddr};
    use std::net::Ipv4Addr;

    #[test]
    fn mac_renders_lowercase_for_arp() {
        let mac: MacAddr = "0A:1b:2c:3D:4e:5f".parse().unwrap();

        assert_eq!(mac, MacAddr::new(0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f));
        assert_eq!(mac.to_string(), "0a:1b:2c:3d:4e:5f");
    }

    #[test]
    fn rejects_malformed_mac() {
        for text in ["", "0a:1b:2c:3d:4e", "0a:1b:2c:3d:4e:5f:60", "zz:1b:2c:3d:4e:5f"] {
            assert!(text.parse::<MacAddr>().is_err(), "{text}");
        }
    }

    #[test]
    fn gateway_is_taken_from_via_field() {
        let output = "default via 192.168.250.1 proto static metric 100\n";

        assert_eq!(
            parse_gateway_ip(output),
            Some(Ipv4Addr::new(192, 168, 250, 1))
        );
    }

    #[test]
    fn gateway_is_none_without_via() {
        assert_eq!(parse_gateway_ip(""), None);
        assert_eq!(parse_gateway_ip("default dev core scope link\n"), None);
    }
}
