// cpe-insight - CLI for the CPE Insight API
// Copyright (C) 2024 cpe-insight contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Named API endpoints and their path templates.

use crate::identity::DeviceIdentity;
use std::io::{self, Write};
use thiserror::Error;

pub const API_VERSION: &str = "42.4242";

/// Replaced with the device reference when resolving a template.
pub const IDENTITY_PLACEHOLDER: &str = "${t}";

/// Read-only name -> path template lookup.
pub trait EndpointTable {
    fn lookup(&self, name: &str) -> Option<&str>;

    /// Every known name, in a stable order.
    fn names(&self) -> Vec<&str>;
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown endpoint `{0}`; run with --list to see available endpoints")]
pub struct NotFoundError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy)]
pub struct StaticEndpoints(&'static [(&'static str, &'static str)]);

impl StaticEndpoints {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.0
    }
}

impl Default for StaticEndpoints {
    fn default() -> Self {
        Self(API_ENDPOINTS)
    }
}

impl EndpointTable for StaticEndpoints {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, template)| *template)
    }

    fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(key, _)| *key).collect()
    }
}

pub fn resolve(
    table: &dyn EndpointTable,
    name: &str,
    identity: &DeviceIdentity,
) -> Result<ResolvedEndpoint, NotFoundError> {
    let template = table
        .lookup(name)
        .ok_or_else(|| NotFoundError(name.to_string()))?;

    Ok(ResolvedEndpoint {
        name: name.to_string(),
        path: template.replace(IDENTITY_PLACEHOLDER, &identity.reference_id),
    })
}

/// Writes the NAME/ENDPOINT listing, sorted by name.
pub fn write_listing<W: Write>(out: &mut W, entries: &[(&str, &str)]) -> io::Result<()> {
    let mut rows = entries.to_vec();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let name_width = rows
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let path_width = rows
        .iter()
        .map(|(_, path)| path.len())
        .max()
        .unwrap_or(0)
        .max("ENDPOINT".len());

    writeln!(out, "{:name_width$}  ENDPOINT", "NAME")?;
    writeln!(out, "{:-<name_width$}  {:-<path_width$}", "", "")?;
    for (name, path) in rows {
        writeln!(out, "{:name_width$}  {}", name, path)?;
    }
    Ok(())
}

pub const API_ENDPOINTS: &[(&str, &str)] = &[
    ("alertGet", "/alert"),
    ("customerConnectMeta", "/connect"),
    ("referenceGet", "/reference"),
    ("adminUrlGet", "/${t}/admin-url"),
    ("bandwidthGet", "/${t}/bandwidth"),
    ("bbtGet", "/${t}/bbt"),
    ("capabilitiesGet", "/${t}/capabilities"),
    ("customerGet", "/${t}/customer"),
    ("customerLocationMapGet", "/${t}/customer/location-map"),
    ("ddnsGet", "/${t}/ddns"),
    ("ddnsStatus", "/${t}/ddns/status"),
    ("defaultConfigGet", "/${t}/default-config"),
    ("deviceFamily", "/${t}/device-family"),
    ("dhcpGet", "/${t}/dhcp"),
    ("dmzGet", "/${t}/dmz"),
    ("dnsGet", "/${t}/dns"),
    ("ethernetPortsGet", "/${t}/ethernet-ports"),
    ("findReference", "/${t}/find"),
    ("firewallRulesGet", "/${t}/firewall-rules"),
    ("firewallStatusGet", "/${t}/firewall-status"),
    ("firmwareVersionGet", "/${t}/firmware-version"),
    ("firmwareVersionsGet", "/${t}/firmware-versions"),
    ("lanGet", "/${t}/lan"),
    ("lanHosts", "/${t}/lan-hosts"),
    ("lanHostsAliasGet", "/${t}/lan-hosts/alias"),
    ("lanIpv6Get", "/${t}/lan-ipv6"),
    ("ledGet", "/${t}/led"),
    ("logGet", "/${t}/log"),
    ("mobileGet", "/${t}/mobile"),
    ("checkBngL2Tunnel", "/${t}/msan/check-bng-l2tunnel"),
    ("checkBngMcvlan", "/${t}/msan/check-bng-mcvlan"),
    ("checkMsanL2Tunnel", "/${t}/msan/check-msan-l2tunnel"),
    ("checkMsanMcvlan", "/${t}/msan/check-msan-mcvlan"),
    ("ponInfo", "/${t}/msan/pon-info"),
    ("msanStatus", "/${t}/msan/status"),
    ("verify", "/${t}/msan/verify"),
    ("natRulesGet", "/${t}/nat-rules"),
    ("orderSystemParametersGet", "/${t}/order-system/parameters"),
    ("orderSystemServicesGet", "/${t}/order-system/services"),
    ("pairsGet", "/${t}/pair"),
    ("ping", "/${t}/ping"),
    ("policiesGet", "/${t}/policies"),
    ("publicLanGet", "/${t}/public-lan"),
    ("schedulesGet", "/${t}/schedules"),
    ("services", "/${t}/services"),
    ("sessionsGet", "/${t}/sessions"),
    ("sharedSecretAuth", "/${t}/shared-secret-auth"),
    ("sikStatusGet", "/${t}/sik-status"),
    ("skynetGet", "/${t}/skynet"),
    ("smtpOutboundGet", "/${t}/smtp-outbound"),
    ("staticDhcpLeasesGet", "/${t}/static-dhcp-leases"),
    ("staticRoutesGet", "/${t}/static-routes"),
    ("status", "/${t}/status"),
    ("statusFromSessions", "/${t}/status-from-sessions"),
    ("upnpGet", "/${t}/upnp"),
    ("upnpMappings", "/${t}/upnp/mappings"),
    ("uptime", "/${t}/uptime"),
    ("wanProtocolGet", "/${t}/wan-protocol"),
    ("wlanGet", "/${t}/wlan"),
    ("wlanRadioGet", "/${t}/wlan/radio"),
    ("wlanScan", "/${t}/wlan/scan"),
    ("wlanWpsGet", "/${t}/wlan/wps"),
    ("taskHistory", "/task/history"),
];
