//! The device-under-test registry.
//!
//! [`Dut`] owns every handle produced while the topology is built, both on
//! the entities (ports, VLANs, LAGs) and in per-category lists that
//! teardown walks.

use crate::entity::{Lag, Nexthop, NexthopGroup, Port, RifList, Vlan};
use crate::error::{DeviceCall, Result, TopologyError};
use sai_client::api::{FdbEntry, NeighborEntry, RouteEntry};
use sai_client::{
    BridgePortOid, HashOid, NextHopGroupOid, NextHopOid, RouterInterfaceOid, SaiClient,
    SaiClientExt, SwitchOid, VirtualRouterOid, VlanOid,
};
use sai_types::{AddressFamily, VlanId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dut {
    pub switch_id: SwitchOid,
    pub default_vrf: VirtualRouterOid,
    pub default_vlan: VlanOid,
    pub default_routev4: Option<RouteEntry>,
    pub default_routev6: Option<RouteEntry>,
    pub loopback_rifs: RifList,

    pub ports: Vec<Port>,
    pub vlans: BTreeMap<VlanId, Vlan>,
    pub lags: BTreeMap<usize, Lag>,

    pub routev4_list: Vec<RouteEntry>,
    pub routev6_list: Vec<RouteEntry>,
    pub neighborv4_list: Vec<NeighborEntry>,
    pub neighborv6_list: Vec<NeighborEntry>,
    pub nexthopv4_list: Vec<Nexthop>,
    pub nexthopv6_list: Vec<Nexthop>,
    pub port_nhop_v4_list: Vec<NextHopOid>,
    pub port_nhop_v6_list: Vec<NextHopOid>,
    pub bridge_port_nhop_v4_list: Vec<NextHopOid>,
    pub bridge_port_nhop_v6_list: Vec<NextHopOid>,
    /// Port, LAG and VLAN router interfaces.
    pub port_rif_list: Vec<RouterInterfaceOid>,
    pub bridge_port_rif_list: Vec<RouterInterfaceOid>,
    pub nhop_groupv4_list: Vec<NexthopGroup>,
    pub nhop_groupv6_list: Vec<NexthopGroup>,
    pub fdb_entries: Vec<FdbEntry>,
    /// Hash object bound as the switch's IPv4 LAG hash.
    pub lag_hash_ipv4: Option<HashOid>,
}

/// Object counts, for logging and the dry-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DutSummary {
    pub ports: usize,
    pub vlans: usize,
    pub lags: usize,
    pub router_interfaces: usize,
    pub neighbors: usize,
    pub next_hops: usize,
    pub next_hop_groups: usize,
    pub routes: usize,
    pub fdb_entries: usize,
}

impl Dut {
    /// Reads switch, default virtual router, default VLAN and the port
    /// inventory from the device.
    pub fn discover<C: SaiClient + ?Sized>(client: &C) -> Result<Self> {
        let switch_id = client.switch_id();
        let default_vrf = client
            .default_virtual_router()
            .during("get default virtual router")?;
        let default_vlan = client.default_vlan().during("get default vlan")?;
        let port_oids = client.port_list().during("get port list")?;

        let mut bridge_of_port = BTreeMap::new();
        for bp in client.bridge_port_list().during("get bridge port list")? {
            let port = client
                .bridge_port_port(bp)
                .during("get bridge port port id")?;
            bridge_of_port.insert(port, bp);
        }

        let ports: Vec<Port> = port_oids
            .into_iter()
            .enumerate()
            .map(|(index, oid)| {
                let bridge_port = bridge_of_port
                    .get(&oid)
                    .copied()
                    .unwrap_or(BridgePortOid::NULL);
                Port::new(index, oid, bridge_port)
            })
            .collect();

        info!(
            "discovered switch {} with {} ports, default vrf {}",
            switch_id,
            ports.len(),
            default_vrf
        );
        Ok(Dut {
            switch_id,
            default_vrf,
            default_vlan,
            ports,
            ..Dut::default()
        })
    }

    pub fn port(&self, index: usize) -> Result<&Port> {
        self.ports
            .get(index)
            .ok_or_else(|| TopologyError::unknown("port", index))
    }

    pub fn port_mut(&mut self, index: usize) -> Result<&mut Port> {
        self.ports
            .get_mut(index)
            .ok_or_else(|| TopologyError::unknown("port", index))
    }

    /// Bridge ports of `indexes`, in order.
    pub fn bridge_ports(&self, indexes: &[usize]) -> Result<Vec<BridgePortOid>> {
        indexes
            .iter()
            .map(|idx| {
                let port = self.port(*idx)?;
                if port.bridge_port.is_null() {
                    return Err(TopologyError::unknown("bridge port of port", idx));
                }
                Ok(port.bridge_port)
            })
            .collect()
    }

    pub fn port_index_of_bridge_port(&self, bridge_port: BridgePortOid) -> Option<usize> {
        self.ports
            .iter()
            .find(|p| p.bridge_port == bridge_port)
            .map(|p| p.index)
    }

    pub fn vlan(&self, vlan_id: VlanId) -> Result<&Vlan> {
        self.vlans
            .get(&vlan_id)
            .ok_or_else(|| TopologyError::unknown("vlan", vlan_id))
    }

    pub fn vlan_mut(&mut self, vlan_id: VlanId) -> Result<&mut Vlan> {
        self.vlans
            .get_mut(&vlan_id)
            .ok_or_else(|| TopologyError::unknown("vlan", vlan_id))
    }

    pub fn lag(&self, index: usize) -> Result<&Lag> {
        self.lags
            .get(&index)
            .ok_or_else(|| TopologyError::unknown("lag", index))
    }

    pub fn lag_mut(&mut self, index: usize) -> Result<&mut Lag> {
        self.lags
            .get_mut(&index)
            .ok_or_else(|| TopologyError::unknown("lag", index))
    }

    pub fn nexthop(&self, oid: NextHopOid) -> Option<&Nexthop> {
        self.nexthopv4_list
            .iter()
            .chain(self.nexthopv6_list.iter())
            .find(|nh| nh.oid == oid)
    }

    pub fn nexthop_mut(&mut self, oid: NextHopOid) -> Option<&mut Nexthop> {
        self.nexthopv4_list
            .iter_mut()
            .chain(self.nexthopv6_list.iter_mut())
            .find(|nh| nh.oid == oid)
    }

    pub fn nexthop_group(&self, oid: NextHopGroupOid) -> Option<&NexthopGroup> {
        self.nhop_groupv4_list
            .iter()
            .chain(self.nhop_groupv6_list.iter())
            .find(|g| g.oid == oid)
    }

    pub fn nexthop_group_mut(&mut self, oid: NextHopGroupOid) -> Option<&mut NexthopGroup> {
        self.nhop_groupv4_list
            .iter_mut()
            .chain(self.nhop_groupv6_list.iter_mut())
            .find(|g| g.oid == oid)
    }

    pub fn default_route(&self, family: AddressFamily) -> Option<RouteEntry> {
        match family {
            AddressFamily::V4 => self.default_routev4,
            AddressFamily::V6 => self.default_routev6,
        }
    }

    /// Both default drop routes are installed.
    pub fn has_default_routes(&self) -> bool {
        self.default_routev4.is_some() && self.default_routev6.is_some()
    }

    pub(crate) fn record_route(&mut self, entry: RouteEntry) {
        debug!("recorded route {}", entry);
        match entry.destination.family() {
            AddressFamily::V4 => self.routev4_list.push(entry),
            AddressFamily::V6 => self.routev6_list.push(entry),
        }
    }

    pub(crate) fn record_neighbor(&mut self, entry: NeighborEntry) {
        match entry.ip.family() {
            AddressFamily::V4 => self.neighborv4_list.push(entry),
            AddressFamily::V6 => self.neighborv6_list.push(entry),
        }
    }

    pub(crate) fn record_nexthop(&mut self, nexthop: Nexthop) {
        match nexthop.family() {
            AddressFamily::V4 => self.nexthopv4_list.push(nexthop),
            AddressFamily::V6 => self.nexthopv6_list.push(nexthop),
        }
    }

    pub fn summary(&self) -> DutSummary {
        let router_interfaces =
            self.port_rif_list.len() + self.bridge_port_rif_list.len() + self.loopback_rifs.len();
        DutSummary {
            ports: self.ports.len(),
            vlans: self.vlans.len(),
            lags: self.lags.len(),
            router_interfaces,
            neighbors: self.neighborv4_list.len() + self.neighborv6_list.len(),
            next_hops: self.nexthopv4_list.len() + self.nexthopv6_list.len(),
            next_hop_groups: self.nhop_groupv4_list.len() + self.nhop_groupv6_list.len(),
            routes: self.routev4_list.len() + self.routev6_list.len(),
            fdb_entries: self.fdb_entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_sim::{SimConfig, SimSwitch};

    #[test]
    fn test_discover_maps_bridge_ports() {
        let sim = SimSwitch::new(SimConfig {
            port_count: 4,
            ..SimConfig::default()
        });
        let dut = Dut::discover(&sim).unwrap();

        assert_eq!(dut.ports.len(), 4);
        assert_eq!(dut.switch_id, sim.switch_id());
        assert_eq!(dut.default_vrf, sim.default_virtual_router().unwrap());
        for port in &dut.ports {
            assert_eq!(port.oid, sim.port(port.index).unwrap());
            assert_eq!(sim.bridge_port_port(port.bridge_port).unwrap(), port.oid);
        }
        assert_eq!(dut.summary().routes, 0);
    }

    #[test]
    fn test_unknown_entities() {
        let dut = Dut::default();
        assert!(matches!(
            dut.port(3),
            Err(TopologyError::UnknownEntity { kind: "port", .. })
        ));
        assert!(matches!(
            dut.lag(1),
            Err(TopologyError::UnknownEntity { kind: "lag", .. })
        ));
        assert!(dut.bridge_ports(&[0]).is_err());
    }
}
