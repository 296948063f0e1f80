//! Removes everything a [`Dut`] has recorded, dependents first.

use crate::dut::Dut;
use crate::error::{Result, TeardownFailure, TopologyError};
use sai_client::api::SwitchAttribute;
use sai_client::{HashOid, RouterInterfaceOid, SaiClient, SaiResult};
use std::fmt;
use std::mem::take;
use tracing::{debug, info, warn};

struct Sweep<'a, C: SaiClient + ?Sized> {
    client: &'a C,
    removed: usize,
    failures: Vec<TeardownFailure>,
}

impl<'a, C: SaiClient + ?Sized> Sweep<'a, C> {
    fn new(client: &'a C) -> Self {
        Self {
            client,
            removed: 0,
            failures: Vec::new(),
        }
    }

    fn attempt(
        &mut self,
        kind: &str,
        key: impl fmt::Display,
        call: impl FnOnce(&C) -> SaiResult<()>,
    ) {
        match call(self.client) {
            Ok(()) => {
                self.removed += 1;
                debug!("removed {} {}", kind, key);
            }
            Err(error) => {
                warn!("failed to remove {} {}: {}", kind, key, error);
                self.failures.push(TeardownFailure {
                    object: format!("{} {}", kind, key),
                    error,
                });
            }
        }
    }
}

/// Ranks a router interface by what it is bound to: ports, then VLANs, then
/// LAGs.
fn rif_rank(dut: &Dut, rif: RouterInterfaceOid) -> u8 {
    if dut.ports.iter().any(|p| p.rifs.contains(rif)) {
        0
    } else if dut.vlans.values().any(|v| v.rifs.contains(rif)) {
        1
    } else {
        2
    }
}

/// Removes every object recorded on `dut` in reverse dependency order:
///
/// routes (the default pair last), next-hop group members, groups,
/// next-hops, neighbors, router interfaces, LAG members, LAGs, FDB entries,
/// VLAN members, VLANs, and finally the bound LAG hash.
///
/// Every removal is attempted even after a failure. The registry is emptied
/// regardless; failures come back together as [`TopologyError::Teardown`].
pub fn teardown<C: SaiClient + ?Sized>(client: &C, dut: &mut Dut) -> Result<()> {
    let mut sweep = Sweep::new(client);

    let routes = take(&mut dut.routev4_list)
        .into_iter()
        .chain(take(&mut dut.routev6_list))
        .chain(dut.default_routev4.take())
        .chain(dut.default_routev6.take());
    for entry in routes {
        sweep.attempt("route", entry, |c| c.remove_route_entry(&entry));
    }

    let groups: Vec<_> = take(&mut dut.nhop_groupv4_list)
        .into_iter()
        .chain(take(&mut dut.nhop_groupv6_list))
        .collect();
    for group in &groups {
        for member in &group.members {
            sweep.attempt("next hop group member", member.oid, |c| {
                c.remove_next_hop_group_member(member.oid)
            });
        }
    }
    for group in &groups {
        sweep.attempt("next hop group", group.oid, |c| c.remove_next_hop_group(group.oid));
    }

    let nexthops = take(&mut dut.nexthopv4_list)
        .into_iter()
        .chain(take(&mut dut.nexthopv6_list));
    for nexthop in nexthops {
        sweep.attempt("next hop", nexthop.address, |c| c.remove_next_hop(nexthop.oid));
    }
    dut.port_nhop_v4_list.clear();
    dut.port_nhop_v6_list.clear();
    dut.bridge_port_nhop_v4_list.clear();
    dut.bridge_port_nhop_v6_list.clear();

    let neighbors = take(&mut dut.neighborv4_list)
        .into_iter()
        .chain(take(&mut dut.neighborv6_list));
    for entry in neighbors {
        sweep.attempt("neighbor", entry, |c| c.remove_neighbor_entry(&entry));
    }

    let mut rifs = take(&mut dut.port_rif_list);
    rifs.sort_by_key(|rif| rif_rank(&*dut, *rif));
    let rifs = take(&mut dut.bridge_port_rif_list)
        .into_iter()
        .chain(rifs)
        .chain(dut.loopback_rifs.oids().collect::<Vec<_>>());
    for rif in rifs {
        sweep.attempt("router interface", rif, |c| c.remove_router_interface(rif));
    }
    dut.loopback_rifs.clear();
    for port in &mut dut.ports {
        port.rifs.clear();
        port.bridge_rifs.clear();
    }

    let lags = take(&mut dut.lags);
    for lag in lags.values() {
        for (member, port_idx) in lag.lag_members.iter().zip(&lag.member_port_indexs) {
            sweep.attempt("lag member", format_args!("lag{} port{}", lag.index, port_idx), |c| {
                c.remove_lag_member(*member)
            });
        }
    }
    for lag in lags.values() {
        sweep.attempt("lag", lag.index, |c| c.remove_lag(lag.lag_id));
    }

    for entry in take(&mut dut.fdb_entries) {
        sweep.attempt("fdb entry", entry, |c| c.remove_fdb_entry(&entry));
    }

    let vlans = take(&mut dut.vlans);
    for vlan in vlans.values() {
        for member in &vlan.vlan_mport_oids {
            sweep.attempt("vlan member", member, |c| c.remove_vlan_member(*member));
        }
    }
    for vlan in vlans.values() {
        sweep.attempt("vlan", vlan.vlan_id, |c| c.remove_vlan(vlan.vlan_oid));
    }

    if let Some(hash) = dut.lag_hash_ipv4.take() {
        sweep.attempt("lag hash binding", hash, |c| {
            c.set_switch_attribute(SwitchAttribute::LagHashIpv4(HashOid::NULL))
        });
        sweep.attempt("hash", hash, |c| c.remove_hash(hash));
    }

    info!(
        "teardown removed {} objects, {} failures",
        sweep.removed,
        sweep.failures.len()
    );
    if sweep.failures.is_empty() {
        Ok(())
    } else {
        Err(TopologyError::Teardown(sweep.failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurer::{
        FdbConfigurer, FdbOptions, LagConfigurer, RifOptions, RouteConfigurer, SettlePolicy,
        VlanConfigurer,
    };
    use crate::dut::DutSummary;
    use crate::entity::{Device, DeviceKey, NetInterface};
    use pretty_assertions::assert_eq;
    use sai_client::api::VlanTaggingMode;
    use sai_client::{SaiClientExt, SaiStatus};
    use sai_sim::{SimConfig, SimOp, SimSwitch};
    use sai_types::{Ipv4Addr, MacAddress, VlanId};

    fn device(key: DeviceKey, a: u8, b: u8) -> Device {
        let mac = MacAddress::new([0x00, 0x99, 0x66, 0x55, a, b]);
        Device::new(key, mac)
            .with_ipv4(Ipv4Addr::new(192, 168, a, b))
            .with_ipv6(format!("fc02::{}:{}", a, b).parse().unwrap())
    }

    /// VLAN, LAGs, hash, RIFs of every kind, neighbors, next-hops, an ECMP
    /// pair, routes and FDB entries.
    fn build(sim: &SimSwitch) -> Dut {
        let mut dut = Dut::discover(sim).unwrap();
        let vlans = VlanConfigurer::new(sim);
        let lags = LagConfigurer::new(sim);
        let route = RouteConfigurer::new(sim);

        vlans.reset_default_vlan(&mut dut).unwrap();
        let vid = VlanId::new(10).unwrap();
        let vlan_oid = vlans
            .create_vlan(&mut dut, vid, &[1, 2, 3, 4], VlanTaggingMode::Untagged)
            .unwrap()
            .vlan_oid;
        lags.create_lag(&mut dut, &[17, 18]).unwrap();
        lags.create_lag(&mut dut, &[19, 20]).unwrap();
        lags.setup_lag_v4_hash(&mut dut, None, None).unwrap();

        route.create_default_route(&mut dut).unwrap();
        route.create_default_loopback_interface(&mut dut).unwrap();
        route
            .create_router_interface(&mut dut, NetInterface::Port(0), None, RifOptions::default())
            .unwrap();
        let mut bridged = device(DeviceKey::server(3, 1), 3, 1);
        route
            .create_nexthop(&mut dut, NetInterface::Port(5), &mut bridged, None, RifOptions::bridge())
            .unwrap();

        let mut local = device(DeviceKey::server(2, 9), 2, 9).with_prefix(Some(24), Some(112));
        route
            .create_route_path_by_rif(&mut dut, &mut local, NetInterface::Vlan(vid), None)
            .unwrap();

        let (mut v4, mut v6) = (Vec::new(), Vec::new());
        for idx in [1, 2] {
            let mut peer = device(DeviceKey::t1(idx as u8, 100), 10 + idx as u8, 100);
            let mut dest = device(DeviceKey::server(10 + idx as u8, 0), 10 + idx as u8, 0)
                .with_prefix(Some(24), Some(112));
            let path = route
                .create_route_path_by_nexthop(&mut dut, &mut dest, &mut peer, NetInterface::Lag(idx), None)
                .unwrap();
            let nexthops = path.nexthops.unwrap();
            v4.push(nexthops.v4.oid);
            v6.push(nexthops.v6.oid);
        }
        let mut ecmp_dest = device(DeviceKey::server(60, 0), 60, 0);
        route
            .create_nexthop_group_by_nexthops(&mut dut, &v4, &v6, &[1, 2], &mut ecmp_dest, None)
            .unwrap();

        let hosts = [device(DeviceKey::server(1, 1), 1, 1), device(DeviceKey::server(1, 2), 1, 2)];
        let bridge_ports = dut.bridge_ports(&[1, 2]).unwrap();
        FdbConfigurer::new(sim)
            .create_fdb_entries(
                &mut dut,
                &hosts,
                &bridge_ports,
                vlan_oid,
                FdbOptions::default(),
                SettlePolicy::immediate(),
            )
            .unwrap();
        dut
    }

    #[test]
    fn test_teardown_leaves_nothing_behind() {
        let sim = SimSwitch::new(SimConfig::default());
        let mut dut = build(&sim);
        assert!(!sim.inventory().is_empty());

        teardown(&sim, &mut dut).unwrap();
        assert!(sim.inventory().is_empty(), "{:?}", sim.inventory());
        assert_eq!(
            dut.summary(),
            DutSummary {
                ports: dut.ports.len(),
                ..DutSummary::default()
            }
        );
        assert!(dut.default_routev4.is_none());
        assert!(dut.lag_hash_ipv4.is_none());
        assert!(sim.lag_hash_ipv4().unwrap().is_null());
    }

    #[test]
    fn test_teardown_is_idempotent_on_empty_registry() {
        let sim = SimSwitch::default();
        let mut dut = Dut::discover(&sim).unwrap();
        teardown(&sim, &mut dut).unwrap();
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_failures_are_collected_and_sweep_continues() {
        let sim = SimSwitch::new(SimConfig::default());
        let mut dut = build(&sim);
        sim.fail_next(SimOp::RemoveFdbEntry, SaiStatus::Failure);

        let err = teardown(&sim, &mut dut).unwrap_err();
        let TopologyError::Teardown(failures) = err else {
            panic!("expected teardown error, got {:?}", err);
        };
        // The stuck FDB entry pins its VLAN.
        assert_eq!(failures.len(), 2);
        assert!(failures[0].object.starts_with("fdb entry"));
        assert_eq!(failures[1].error.status(), SaiStatus::ObjectInUse);

        let left = sim.inventory();
        assert_eq!(left.fdb_entries, 1);
        assert_eq!(left.vlans, 1);
        assert_eq!(left.routes, 0);
        assert_eq!(left.lags, 0);
        assert_eq!(left.hashes, 0);
    }
}
