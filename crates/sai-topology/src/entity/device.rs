//! Simulated peers attached to the device under test.

use crate::error::{Result, TopologyError};
use sai_client::api::{NeighborEntry, RouteEntry};
use sai_client::NextHopOid;
use sai_types::{AddressFamily, IpAddress, IpPrefix, Ipv4Addr, Ipv6Addr, MacAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Server,
    T1,
}

/// Position of a device in the topology's device tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub role: DeviceRole,
    pub group: u8,
    pub index: u8,
}

impl DeviceKey {
    pub const fn server(group: u8, index: u8) -> Self {
        Self {
            role: DeviceRole::Server,
            group,
            index,
        }
    }

    pub const fn t1(group: u8, index: u8) -> Self {
        Self {
            role: DeviceRole::T1,
            group,
            index,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            DeviceRole::Server => "server",
            DeviceRole::T1 => "t1",
        };
        write!(f, "{}[{}][{}]", role, self.group, self.index)
    }
}

/// How a device's neighbor entries were installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborMode {
    /// No implicit host route; reachable only through explicit routes.
    NoHost,
    /// Host route installed with the neighbor.
    Host,
}

impl NeighborMode {
    pub fn from_no_host(no_host: bool) -> Self {
        if no_host {
            NeighborMode::NoHost
        } else {
            NeighborMode::Host
        }
    }
}

/// Neighbor entries bound to one device. A device holds entries of a
/// single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNeighbors {
    pub mode: NeighborMode,
    pub v4: Option<NeighborEntry>,
    pub v6: Option<NeighborEntry>,
}

impl DeviceNeighbors {
    pub fn get(&self, family: AddressFamily) -> Option<NeighborEntry> {
        match family {
            AddressFamily::V4 => self.v4,
            AddressFamily::V6 => self.v6,
        }
    }

    pub(crate) fn set(&mut self, family: AddressFamily, entry: NeighborEntry) {
        match family {
            AddressFamily::V4 => self.v4 = Some(entry),
            AddressFamily::V6 => self.v6 = Some(entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub key: DeviceKey,
    pub mac: MacAddress,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    /// v4 prefix length; a /32 host route is used when unset.
    pub ip_prefix: Option<u8>,
    /// v6 prefix length; a /128 host route is used when unset.
    pub ip_prefix_v6: Option<u8>,

    pub neighbors: Option<DeviceNeighbors>,
    pub nexthopv4: Option<NextHopOid>,
    pub nexthopv6: Option<NextHopOid>,
    pub routev4: Option<RouteEntry>,
    pub routev6: Option<RouteEntry>,
    /// Index of the LAG this device is reached through.
    pub l3_lag: Option<usize>,
}

impl Device {
    pub fn new(key: DeviceKey, mac: MacAddress) -> Self {
        Self {
            key,
            mac,
            ipv4: None,
            ipv6: None,
            ip_prefix: None,
            ip_prefix_v6: None,
            neighbors: None,
            nexthopv4: None,
            nexthopv6: None,
            routev4: None,
            routev6: None,
            l3_lag: None,
        }
    }

    pub fn with_ipv4(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4 = Some(addr);
        self
    }

    pub fn with_ipv6(mut self, addr: Ipv6Addr) -> Self {
        self.ipv6 = Some(addr);
        self
    }

    pub fn with_prefix(mut self, v4: Option<u8>, v6: Option<u8>) -> Self {
        self.ip_prefix = v4;
        self.ip_prefix_v6 = v6;
        self
    }

    pub fn ip(&self, family: AddressFamily) -> Option<IpAddress> {
        match family {
            AddressFamily::V4 => self.ipv4.map(IpAddress::V4),
            AddressFamily::V6 => self.ipv6.map(IpAddress::V6),
        }
    }

    pub fn prefix_len(&self, family: AddressFamily) -> Option<u8> {
        match family {
            AddressFamily::V4 => self.ip_prefix,
            AddressFamily::V6 => self.ip_prefix_v6,
        }
    }

    /// The device address qualified by its prefix length, or a host prefix
    /// when none is configured.
    pub fn route_prefix(&self, family: AddressFamily) -> Result<IpPrefix> {
        let addr = self.ip(family).ok_or_else(|| {
            TopologyError::precondition(format!("{} has no {} address", self.key, family))
        })?;
        match self.prefix_len(family) {
            None => Ok(IpPrefix::host(addr)),
            Some(len) => IpPrefix::new(addr, len)
                .map_err(|e| TopologyError::precondition(format!("{}: {}", self.key, e))),
        }
    }

    /// Neighbor entries, whichever mode they were installed in.
    pub fn neighbor(&self, family: AddressFamily) -> Option<NeighborEntry> {
        self.neighbors.and_then(|n| n.get(family))
    }

    /// v4 neighbor installed without a host route.
    pub fn neighborv4(&self) -> Option<NeighborEntry> {
        self.neighbor_in(NeighborMode::NoHost, AddressFamily::V4)
    }

    pub fn neighborv6(&self) -> Option<NeighborEntry> {
        self.neighbor_in(NeighborMode::NoHost, AddressFamily::V6)
    }

    /// v4 neighbor installed with a host route.
    pub fn local_neighborv4(&self) -> Option<NeighborEntry> {
        self.neighbor_in(NeighborMode::Host, AddressFamily::V4)
    }

    pub fn local_neighborv6(&self) -> Option<NeighborEntry> {
        self.neighbor_in(NeighborMode::Host, AddressFamily::V6)
    }

    fn neighbor_in(&self, mode: NeighborMode, family: AddressFamily) -> Option<NeighborEntry> {
        self.neighbors
            .filter(|n| n.mode == mode)
            .and_then(|n| n.get(family))
    }

    pub fn nexthop(&self, family: AddressFamily) -> Option<NextHopOid> {
        match family {
            AddressFamily::V4 => self.nexthopv4,
            AddressFamily::V6 => self.nexthopv6,
        }
    }

    pub fn route(&self, family: AddressFamily) -> Option<RouteEntry> {
        match family {
            AddressFamily::V4 => self.routev4,
            AddressFamily::V6 => self.routev6,
        }
    }

    /// Forgets every device handle recorded during setup.
    pub fn clear_handles(&mut self) {
        self.neighbors = None;
        self.nexthopv4 = None;
        self.nexthopv6 = None;
        self.routev4 = None;
        self.routev6 = None;
        self.l3_lag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_client::RouterInterfaceOid;

    fn peer() -> Device {
        Device::new(DeviceKey::server(2, 9), "00:99:66:55:02:09".parse().unwrap())
            .with_ipv4(Ipv4Addr::new(192, 168, 2, 9))
            .with_ipv6("fc02::2:9".parse().unwrap())
    }

    #[test]
    fn test_route_prefix_defaults_to_host() {
        let dev = peer();
        assert_eq!(dev.route_prefix(AddressFamily::V4).unwrap().to_string(), "192.168.2.9/32");
        assert_eq!(dev.route_prefix(AddressFamily::V6).unwrap().to_string(), "fc02::2:9/128");

        let dev = peer().with_prefix(Some(24), Some(112));
        assert_eq!(dev.route_prefix(AddressFamily::V4).unwrap().to_string(), "192.168.2.9/24");
        assert_eq!(dev.route_prefix(AddressFamily::V6).unwrap().to_string(), "fc02::2:9/112");
    }

    #[test]
    fn test_route_prefix_rejects_bad_length() {
        let dev = peer().with_prefix(Some(33), None);
        assert!(matches!(
            dev.route_prefix(AddressFamily::V4),
            Err(TopologyError::Precondition(_))
        ));
    }

    #[test]
    fn test_neighbor_accessors_follow_mode() {
        let mut dev = peer();
        let rif = RouterInterfaceOid::from_raw_unchecked(0x6000000000001);
        let entry = NeighborEntry::new(rif, dev.ip(AddressFamily::V4).unwrap());
        dev.neighbors = Some(DeviceNeighbors {
            mode: NeighborMode::Host,
            v4: Some(entry),
            v6: None,
        });

        assert_eq!(dev.local_neighborv4(), Some(entry));
        assert_eq!(dev.neighborv4(), None);
        assert_eq!(dev.neighbor(AddressFamily::V4), Some(entry));
        assert_eq!(dev.key.to_string(), "server[2][9]");
    }
}
