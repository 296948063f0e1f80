//! Traffic over the T0 topology
//!
//! Routes over single LAGs, ECMP across every LAG, and group membership
//! changes.

use pretty_assertions::assert_eq;
use sai_sim::SimSwitch;
use sai_test_harness::fixtures::{config_fixtures, expected_routed, flow_sweep, routed_tcp};
use sai_test_harness::{assert_balanced, assert_excluded, TrafficVerifier, BALANCE_TOLERANCE};
use sai_topology::{RouteConfigurer, T0Topology};
use sai_types::AddressFamily;

const INGRESS: usize = 0;
const FLOWS: usize = 400;

fn t0(sim: &SimSwitch) -> T0Topology {
    T0Topology::setup(sim, &config_fixtures::t0_default()).unwrap()
}

fn lag_ports(t0: &T0Topology) -> Vec<usize> {
    t0.dut
        .lags
        .values()
        .flat_map(|l| l.member_port_indexs.iter().copied())
        .collect()
}

/// Test per-LAG routes
///
/// Scenario:
/// 1. Build the T0 topology
/// 2. For each LAG i, send to servers[10 + i][0]
/// 3. Verify egress on one of LAG i's ports, addressed to t1[i][100]
#[test]
fn test_route_over_each_lag() {
    let sim = SimSwitch::default();
    let t0 = t0(&sim);
    let verifier = TrafficVerifier::new(&sim);
    let src = t0.server(0, 1).unwrap();

    for (&idx, lag) in &t0.dut.lags {
        let dest = t0.lag_route_destination(idx).unwrap();
        let peer = t0.t1(idx, 100).unwrap();
        assert_eq!(lag.neighbor_mac, Some(peer.mac));

        for family in [AddressFamily::V4, AddressFamily::V6] {
            let pkt = routed_tcp(sim.router_mac(), src, dest, family).unwrap();
            let expected = expected_routed(&pkt, sim.router_mac(), peer.mac);
            verifier
                .assert_forwarded(INGRESS, &pkt, &lag.member_port_indexs, &expected)
                .unwrap();
        }
    }
}

/// Test ECMP spread across every LAG
///
/// Scenario:
/// 1. Build the T0 topology
/// 2. Send 400 flows with consecutive source ports to servers[60][0]
/// 3. Verify each LAG member port carries at least 80% of an even share
#[test]
fn test_ecmp_balances_over_lags() {
    let sim = SimSwitch::default();
    let t0 = t0(&sim);
    let dest = t0.ecmp_destination().unwrap();
    let ports = lag_ports(&t0);
    assert_eq!(ports, (17..=24).collect::<Vec<_>>());

    for family in [AddressFamily::V4, AddressFamily::V6] {
        let base = routed_tcp(sim.router_mac(), t0.server(0, 1).unwrap(), dest, family).unwrap();
        let counts = TrafficVerifier::new(&sim)
            .count_egress(INGRESS, flow_sweep(base, FLOWS))
            .unwrap();
        assert_eq!(counts.values().sum::<usize>(), FLOWS);
        assert_balanced(&counts, &ports, BALANCE_TOLERANCE).unwrap();
    }
}

/// Test removing and restoring a LAG's group members
///
/// Scenario:
/// 1. Build the T0 topology
/// 2. Remove LAG3's members from the ECMP groups
/// 3. Verify ports 21 and 22 leave the group's egress ports and carry no traffic
/// 4. Add LAG3 back and verify it carries traffic again
#[test]
fn test_group_member_removal_by_lag() {
    let sim = SimSwitch::default();
    let mut t0 = t0(&sim);
    let (g4, g6) = t0.ecmp_groups.unwrap();
    let route = RouteConfigurer::new(&sim);

    // 2. Drop LAG3 from both groups
    let removed = route
        .remove_nexthop_group_member_by_lag(&mut t0.dut, g4, 3)
        .unwrap();
    assert_eq!(removed, 2);

    // 3. Record and traffic both exclude its ports
    for group in [g4, g6] {
        let record = t0.dut.nexthop_group(group).unwrap();
        assert_eq!(record.members.len(), 3);
        assert!(!record.member_port_indexs.contains(&21));
        assert!(!record.member_port_indexs.contains(&22));
    }
    let remaining = t0.dut.nexthop_group(g4).unwrap().member_port_indexs.clone();
    let base = routed_tcp(
        sim.router_mac(),
        t0.server(0, 1).unwrap(),
        t0.ecmp_destination().unwrap(),
        AddressFamily::V4,
    )
    .unwrap();
    let verifier = TrafficVerifier::new(&sim);
    let counts = verifier.count_egress(INGRESS, flow_sweep(base, FLOWS)).unwrap();
    assert_excluded(&counts, &[21, 22]).unwrap();
    assert!(counts.keys().all(|p| remaining.contains(p)));

    // 4. Restore
    route
        .add_nexthop_group_member_by_lag(&mut t0.dut, g4, 3)
        .unwrap();
    assert_eq!(sim.group_members(g6).len(), 4);
    let counts = verifier.count_egress(INGRESS, flow_sweep(base, FLOWS)).unwrap();
    assert!(counts.get(&21).copied().unwrap_or(0) + counts.get(&22).copied().unwrap_or(0) > 0);
}

/// Test traffic from a server VLAN port
///
/// Scenario:
/// 1. Build the T0 topology with VLAN router interfaces
/// 2. Send from port 1 (VLAN 10) to the LAG1 destination
/// 3. Verify it is routed out of LAG1
#[test]
fn test_route_from_vlan_port() {
    let sim = SimSwitch::default();
    let mut config = config_fixtures::t0_default();
    config.route.vlan_rifs = true;
    let t0 = T0Topology::setup(&sim, &config).unwrap();

    let src = t0.server(1, 1).unwrap();
    let peer = t0.t1(1, 100).unwrap();
    let pkt = routed_tcp(sim.router_mac(), src, t0.lag_route_destination(1).unwrap(), AddressFamily::V4).unwrap();
    let expected = expected_routed(&pkt, sim.router_mac(), peer.mac);
    TrafficVerifier::new(&sim)
        .assert_forwarded(1, &pkt, &[17, 18], &expected)
        .unwrap();
}
