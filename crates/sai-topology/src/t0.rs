//! The T0 reference topology.
//!
//! A T0 switch faces servers on VLAN ports and T1 routers on LAGs:
//!
//! ```text
//!   servers[1][1..]  servers[2][1..]        t1[1][100] .. t1[4][100]
//!        |                |                      |            |
//!     VLAN 10          VLAN 20                 LAG1   ..    LAG4
//!    ports 1-8        ports 9-16              17,18        23,24
//!         \_______________\______ DUT ____________/____________/
//! ```
//!
//! `servers[10 + i][0]` is routed over LAG *i*, `servers[60][0]` over an
//! ECMP group spanning every LAG.

use crate::config::{TopologyConfig, ECMP_SERVER_GROUP, LAG_SERVER_GROUP_BASE, T1_NEXTHOP_INDEX};
use crate::configurer::{
    FdbConfigurer, FdbOptions, LagConfigurer, RifOptions, RouteConfigurer, VlanConfigurer,
};
use crate::dut::Dut;
use crate::entity::{Device, DeviceKey, DeviceRole, NetInterface};
use crate::error::{Result, TopologyError};
use crate::teardown::teardown;
use sai_client::api::VlanTaggingMode;
use sai_client::{NextHopGroupOid, SaiClient};
use sai_types::{AddressFamily, Ipv4Addr, Ipv6Addr, MacAddress};
use serde::Serialize;
use tracing::{info, warn};

const SERVER_MAC_BASE: MacAddress = MacAddress::new([0x00, 0x99, 0x66, 0x55, 0x00, 0x00]);
const T1_MAC_BASE: MacAddress = MacAddress::new([0x00, 0xaa, 0x77, 0x55, 0x00, 0x00]);

/// Reads the decimal digits of `n` as hex, so group 60 becomes the `60` in
/// `fc02::60:0`.
const fn decimal_as_hex(n: u8) -> u16 {
    let n = n as u16;
    (n / 100) << 8 | (n / 10 % 10) << 4 | (n % 10)
}

/// Builds the simulated peer at `[group][index]`.
pub fn make_device(role: DeviceRole, group: u8, index: u8) -> Device {
    let suffix = u16::from_be_bytes([group, index]);
    let (g, i) = (decimal_as_hex(group), decimal_as_hex(index));
    match role {
        DeviceRole::Server => {
            Device::new(DeviceKey::server(group, index), SERVER_MAC_BASE.with_suffix(suffix))
                .with_ipv4(Ipv4Addr::new(192, 168, group, index))
                .with_ipv6(Ipv6Addr::new(0xfc02, 0, 0, 0, 0, 0, g, i))
        }
        DeviceRole::T1 => {
            Device::new(DeviceKey::t1(group, index), T1_MAC_BASE.with_suffix(suffix))
                .with_ipv4(Ipv4Addr::new(10, 1, group, index))
                .with_ipv6(Ipv6Addr::new(0xfc00, 1, 0, 0, 0, 0, g, i))
        }
    }
}

fn device_table(role: DeviceRole, groups: usize, per_group: usize) -> Vec<Vec<Device>> {
    (0..groups)
        .map(|g| {
            (0..per_group)
                .map(|i| make_device(role, g as u8, i as u8))
                .collect()
        })
        .collect()
}

fn table_entry(
    table: &mut [Vec<Device>],
    role: DeviceRole,
    group: usize,
    index: usize,
) -> Result<&mut Device> {
    table
        .get_mut(group)
        .and_then(|g| g.get_mut(index))
        .ok_or_else(|| {
            TopologyError::unknown(
                "device",
                DeviceKey {
                    role,
                    group: group as u8,
                    index: index as u8,
                },
            )
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct T0Topology {
    pub dut: Dut,
    pub servers: Vec<Vec<Device>>,
    pub t1_list: Vec<Vec<Device>>,
    /// v4 and v6 groups behind the ECMP route.
    pub ecmp_groups: Option<(NextHopGroupOid, NextHopGroupOid)>,
}

impl T0Topology {
    /// Discovers the switch and builds the configured layout: VLANs, LAGs,
    /// routes, then FDB entries.
    ///
    /// If a step fails, whatever was already built is torn down before the
    /// error is returned.
    pub fn setup<C: SaiClient + ?Sized>(client: &C, config: &TopologyConfig) -> Result<Self> {
        config.validate()?;
        let dut = Dut::discover(client)?;
        if let Some(max) = config.max_port_index() {
            if max >= dut.ports.len() {
                return Err(TopologyError::Config(format!(
                    "layout uses port {} but the switch has {} ports",
                    max,
                    dut.ports.len()
                )));
            }
        }

        let devices = &config.devices;
        let mut topology = Self {
            dut,
            servers: device_table(DeviceRole::Server, devices.server_groups, devices.devices_per_group),
            t1_list: device_table(DeviceRole::T1, devices.t1_groups, devices.devices_per_group),
            ecmp_groups: None,
        };

        let built = topology
            .configure_vlans(client, config)
            .and_then(|_| topology.configure_lags(client, config))
            .and_then(|_| topology.configure_routes(client, config))
            .and_then(|_| topology.configure_fdb(client, config));
        if let Err(e) = built {
            warn!("t0 setup failed, tearing down: {}", e);
            if let Err(cleanup) = topology.teardown(client) {
                warn!("cleanup after failed setup: {}", cleanup);
            }
            return Err(e);
        }

        let summary = topology.dut.summary();
        info!(
            "t0 topology ready: {} vlans, {} lags, {} rifs, {} routes, {} fdb entries",
            summary.vlans,
            summary.lags,
            summary.router_interfaces,
            summary.routes,
            summary.fdb_entries
        );
        Ok(topology)
    }

    fn configure_vlans<C: SaiClient + ?Sized>(
        &mut self,
        client: &C,
        config: &TopologyConfig,
    ) -> Result<()> {
        let vlans = VlanConfigurer::new(client);
        if config.vlan.reset_default_vlan {
            vlans.reset_default_vlan(&mut self.dut)?;
        }
        for spec in &config.vlan.vlans {
            let tagging = if spec.tagged {
                VlanTaggingMode::Tagged
            } else {
                VlanTaggingMode::Untagged
            };
            vlans.create_vlan(&mut self.dut, spec.vlan_id, &spec.ports, tagging)?;
        }
        Ok(())
    }

    fn configure_lags<C: SaiClient + ?Sized>(
        &mut self,
        client: &C,
        config: &TopologyConfig,
    ) -> Result<()> {
        let lags = LagConfigurer::new(client);
        for ports in &config.lag.lags {
            lags.create_lag(&mut self.dut, ports)?;
        }
        if config.lag.configure_hash && !config.lag.lags.is_empty() {
            lags.set_lag_hash_algorithm(config.lag.hash_algorithm)?;
            lags.set_lag_hash_seed(config.lag.hash_seed)?;
            lags.setup_lag_v4_hash(&mut self.dut, Some(&config.lag.hash_fields), None)?;
        }
        Ok(())
    }

    fn configure_routes<C: SaiClient + ?Sized>(
        &mut self,
        client: &C,
        config: &TopologyConfig,
    ) -> Result<()> {
        let route = RouteConfigurer::new(client);
        let opts = &config.route;

        if opts.create_default_route {
            route.create_default_route(&mut self.dut)?;
        }
        for idx in &opts.port_rifs {
            route.create_router_interface(
                &mut self.dut,
                NetInterface::Port(*idx),
                None,
                RifOptions::default(),
            )?;
        }
        if opts.vlan_rifs {
            for spec in &config.vlan.vlans {
                route.create_router_interface(
                    &mut self.dut,
                    NetInterface::Vlan(spec.vlan_id),
                    None,
                    RifOptions::default(),
                )?;
            }
        }
        if opts.loopback {
            route.create_default_loopback_interface(&mut self.dut)?;
        }

        let lag_indexes: Vec<usize> = self.dut.lags.keys().copied().collect();
        let (v4_len, v6_len) = (Some(opts.v4_prefix_len), Some(opts.v6_prefix_len));

        if opts.route_for_lag {
            for &lag in &lag_indexes {
                let dest = table_entry(
                    &mut self.servers,
                    DeviceRole::Server,
                    LAG_SERVER_GROUP_BASE + lag,
                    0,
                )?;
                dest.ip_prefix = v4_len;
                dest.ip_prefix_v6 = v6_len;
                let peer = table_entry(&mut self.t1_list, DeviceRole::T1, lag, T1_NEXTHOP_INDEX)?;
                route.create_route_path_by_nexthop(
                    &mut self.dut,
                    dest,
                    peer,
                    NetInterface::Lag(lag),
                    None,
                )?;
            }
        }

        if opts.route_for_nexthop_group && !lag_indexes.is_empty() {
            let (mut v4, mut v6) = (Vec::new(), Vec::new());
            for &lag in &lag_indexes {
                let entity = self.dut.lag(lag)?;
                let existing = if opts.reuse_lag_nexthop {
                    entity
                        .nexthop(AddressFamily::V4)
                        .zip(entity.nexthop(AddressFamily::V6))
                } else {
                    None
                };
                let (nh4, nh6) = match existing {
                    Some(pair) => pair,
                    None => {
                        let peer =
                            table_entry(&mut self.t1_list, DeviceRole::T1, lag, T1_NEXTHOP_INDEX)?;
                        let ni = NetInterface::Lag(lag);
                        route.create_neighbor(&mut self.dut, peer, ni, None, true)?;
                        let rif = route
                            .create_router_interface(&mut self.dut, ni, None, RifOptions::default())?
                            .oid;
                        let pair = route.create_nexthop_by_rif(&mut self.dut, rif, peer, false)?;
                        for oid in [pair.v4.oid, pair.v6.oid] {
                            if let Some(nh) = self.dut.nexthop_mut(oid) {
                                nh.lag = Some(lag);
                            }
                        }
                        (pair.v4.oid, pair.v6.oid)
                    }
                };
                v4.push(nh4);
                v6.push(nh6);
            }

            let dest = table_entry(&mut self.servers, DeviceRole::Server, ECMP_SERVER_GROUP, 0)?;
            dest.ip_prefix = v4_len;
            dest.ip_prefix_v6 = v6_len;
            let groups = route.create_nexthop_group_by_nexthops(
                &mut self.dut,
                &v4,
                &v6,
                &lag_indexes,
                dest,
                None,
            )?;
            self.ecmp_groups = Some(groups);
        }
        Ok(())
    }

    /// Static entries for `servers[k + 1][1..]` behind the k-th VLAN's ports.
    fn configure_fdb<C: SaiClient + ?Sized>(
        &mut self,
        client: &C,
        config: &TopologyConfig,
    ) -> Result<()> {
        if !config.fdb.create {
            return Ok(());
        }
        let fdb = FdbConfigurer::new(client);
        let settle = config.settle_policy();
        for (k, spec) in config.vlan.vlans.iter().enumerate() {
            let hosts = self
                .servers
                .get(k + 1)
                .and_then(|group| group.get(1..=spec.ports.len()))
                .ok_or_else(|| TopologyError::unknown("server group", k + 1))?;
            let bridge_ports = self.dut.bridge_ports(&spec.ports)?;
            let vlan_oid = self.dut.vlan(spec.vlan_id)?.vlan_oid;
            fdb.create_fdb_entries(
                &mut self.dut,
                hosts,
                &bridge_ports,
                vlan_oid,
                FdbOptions::default(),
                settle,
            )?;
        }
        Ok(())
    }

    pub fn server(&self, group: usize, index: usize) -> Result<&Device> {
        self.servers
            .get(group)
            .and_then(|g| g.get(index))
            .ok_or_else(|| TopologyError::unknown("server", format!("[{}][{}]", group, index)))
    }

    pub fn t1(&self, group: usize, index: usize) -> Result<&Device> {
        self.t1_list
            .get(group)
            .and_then(|g| g.get(index))
            .ok_or_else(|| TopologyError::unknown("t1", format!("[{}][{}]", group, index)))
    }

    /// Destination routed over LAG `lag`.
    pub fn lag_route_destination(&self, lag: usize) -> Result<&Device> {
        self.server(LAG_SERVER_GROUP_BASE + lag, 0)
    }

    /// Destination routed over the ECMP group.
    pub fn ecmp_destination(&self) -> Result<&Device> {
        self.server(ECMP_SERVER_GROUP, 0)
    }

    /// Removes everything built on the switch and forgets the peers'
    /// handles.
    pub fn teardown<C: SaiClient + ?Sized>(&mut self, client: &C) -> Result<()> {
        let result = teardown(client, &mut self.dut);
        for device in self.servers.iter_mut().chain(self.t1_list.iter_mut()).flatten() {
            device.clear_handles();
        }
        self.ecmp_groups = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_client::SaiStatus;
    use sai_sim::{SimConfig, SimOp, SimSwitch};
    use std::collections::BTreeSet;

    #[test]
    fn test_device_addressing() {
        let server = make_device(DeviceRole::Server, 60, 0);
        assert_eq!(server.ipv4, Some(Ipv4Addr::new(192, 168, 60, 0)));
        assert_eq!(server.ipv6.unwrap().to_string(), "fc02::60:0");
        assert_eq!(server.mac.to_string(), "00:99:66:55:3c:00");

        let t1 = make_device(DeviceRole::T1, 4, 100);
        assert_eq!(t1.ipv4, Some(Ipv4Addr::new(10, 1, 4, 100)));
        assert_eq!(t1.ipv6.unwrap().to_string(), "fc00:1::4:100");
        assert_eq!(t1.key, DeviceKey::t1(4, 100));
    }

    #[test]
    fn test_default_layout() {
        let sim = SimSwitch::default();
        let t0 = T0Topology::setup(&sim, &TopologyConfig::default()).unwrap();

        assert_eq!(t0.dut.vlans.len(), 2);
        assert_eq!(t0.dut.lags.len(), 4);
        assert_eq!(t0.dut.fdb_entries.len(), 16);
        assert!(t0.dut.lag_hash_ipv4.is_some());

        let dest = t0.lag_route_destination(2).unwrap();
        assert_eq!(dest.routev4.unwrap().destination.to_string(), "192.168.12.0/24");
        assert_eq!(dest.routev6.unwrap().destination.prefix_len(), 112);
        assert_eq!(dest.l3_lag, Some(2));

        let (g4, g6) = t0.ecmp_groups.unwrap();
        let group4 = t0.dut.nexthop_group(g4).unwrap();
        let group6 = t0.dut.nexthop_group(g6).unwrap();
        assert_eq!(group4.members.len(), 4);
        assert_eq!(group6.members.len(), 4);
        let ports: BTreeSet<usize> = group4.member_port_indexs.iter().copied().collect();
        assert_eq!(ports, (17..=24).collect());

        // Group members reuse the per-LAG next-hops.
        let lag_nexthops: Vec<_> = t0
            .dut
            .lags
            .values()
            .filter_map(|l| l.nexthopv4)
            .collect();
        assert_eq!(sim.group_members(g4), lag_nexthops);
        assert_eq!(t0.dut.nexthopv4_list.len(), 4);
    }

    #[test]
    fn test_fresh_nexthops_for_group() {
        let sim = SimSwitch::default();
        let mut config = TopologyConfig::default();
        config.route.reuse_lag_nexthop = false;
        let t0 = T0Topology::setup(&sim, &config).unwrap();

        assert_eq!(t0.dut.nexthopv4_list.len(), 8);
        let (g4, _) = t0.ecmp_groups.unwrap();
        let group = t0.dut.nexthop_group(g4).unwrap();
        let lags: Vec<_> = group.members.iter().map(|m| m.lag).collect();
        assert_eq!(lags, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    fn remove_and_restore_lag3(sim: &SimSwitch, t0: &mut T0Topology) {
        let (g4, g6) = t0.ecmp_groups.unwrap();
        let before: Vec<BTreeSet<_>> = [g4, g6]
            .iter()
            .map(|g| sim.group_members(*g).into_iter().collect())
            .collect();

        let route = RouteConfigurer::new(sim);
        assert_eq!(route.remove_nexthop_group_member_by_lag(&mut t0.dut, g4, 3).unwrap(), 2);
        assert_eq!(t0.dut.nexthop_group(g6).unwrap().removed.len(), 1);
        route.add_nexthop_group_member_by_lag(&mut t0.dut, g6, 3).unwrap();

        let after: Vec<BTreeSet<_>> = [g4, g6]
            .iter()
            .map(|g| sim.group_members(*g).into_iter().collect())
            .collect();
        assert_eq!(after, before);
        for g in [g4, g6] {
            let group = t0.dut.nexthop_group(g).unwrap();
            assert_eq!(group.members.len(), 4);
            assert!(group.removed.is_empty());
            assert!(group.member_port_indexs.contains(&21));
        }
        let lag = t0.dut.lag(3).unwrap();
        assert_eq!((lag.nexthop_groupv4, lag.nexthop_groupv6), (Some(g4), Some(g6)));
    }

    #[test]
    fn test_restore_group_member_without_lag_routes() {
        let sim = SimSwitch::default();
        let mut config = TopologyConfig::default();
        config.route.route_for_lag = false;
        config.route.reuse_lag_nexthop = false;
        let mut t0 = T0Topology::setup(&sim, &config).unwrap();
        assert_eq!(t0.dut.lag(3).unwrap().nexthopv4, None);
        assert!(t0.dut.nexthopv4_list.iter().all(|nh| nh.lag.is_some()));

        remove_and_restore_lag3(&sim, &mut t0);
    }

    #[test]
    fn test_restore_group_member_keeps_fresh_nexthop() {
        let sim = SimSwitch::default();
        let mut config = TopologyConfig::default();
        config.route.reuse_lag_nexthop = false;
        let mut t0 = T0Topology::setup(&sim, &config).unwrap();
        let own = t0.dut.lag(3).unwrap().nexthopv4.unwrap();
        let (g4, _) = t0.ecmp_groups.unwrap();
        assert!(!sim.group_members(g4).contains(&own));

        remove_and_restore_lag3(&sim, &mut t0);
        assert!(!sim.group_members(g4).contains(&own));
    }

    #[test]
    fn test_switch_too_small() {
        let sim = SimSwitch::new(SimConfig {
            port_count: 16,
            ..SimConfig::default()
        });
        let err = T0Topology::setup(&sim, &TopologyConfig::default()).unwrap_err();
        assert!(matches!(err, TopologyError::Config(_)));
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_teardown_clears_switch_and_peers() {
        let sim = SimSwitch::default();
        let mut t0 = T0Topology::setup(&sim, &TopologyConfig::default()).unwrap();
        t0.teardown(&sim).unwrap();

        assert!(sim.inventory().is_empty());
        assert!(t0.ecmp_groups.is_none());
        assert!(t0.lag_route_destination(1).unwrap().routev4.is_none());
        assert!(t0.t1(1, 100).unwrap().neighbors.is_none());
    }

    #[test]
    fn test_failed_setup_cleans_up() {
        let sim = SimSwitch::default();
        sim.fail_next(SimOp::CreateNextHopGroup, SaiStatus::InsufficientResources);

        let err = T0Topology::setup(&sim, &TopologyConfig::default()).unwrap_err();
        assert_eq!(
            err.device_error().map(|e| e.status()),
            Some(SaiStatus::InsufficientResources)
        );
        assert!(sim.inventory().is_empty());
    }
}
