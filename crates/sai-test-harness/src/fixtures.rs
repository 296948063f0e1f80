//! Test fixtures for topology traffic tests
//!
//! Frames, peer devices and topology layouts reused across scenarios.

use crate::verification::{VerificationError, VerifyResult};
use sai_sim::TestPacket;
use sai_topology::Device;
use sai_types::{AddressFamily, MacAddress};

/// L4 source port the flow sweeps start from. A multiple of 8 keeps the
/// sweep aligned with the simulated hash's low bits.
pub const FLOW_BASE_SPORT: u16 = 1024;

/// TCP frame from `src` to `dst` addressed to the router at `router_mac`.
pub fn routed_tcp(
    router_mac: MacAddress,
    src: &Device,
    dst: &Device,
    family: AddressFamily,
) -> VerifyResult<TestPacket> {
    let address = |device: &Device| {
        device
            .ip(family)
            .ok_or_else(|| VerificationError::MissingAddress {
                device: device.key.to_string(),
                family,
            })
    };
    Ok(TestPacket::tcp(router_mac, src.mac, address(src)?, address(dst)?))
}

/// The frame the router should emit for `sent` when it forwards toward
/// `next_hop_mac`.
pub fn expected_routed(sent: &TestPacket, router_mac: MacAddress, next_hop_mac: MacAddress) -> TestPacket {
    sent.routed(router_mac, next_hop_mac)
}

/// `count` copies of `base` with consecutive L4 source ports.
pub fn flow_sweep(base: TestPacket, count: usize) -> impl Iterator<Item = TestPacket> {
    (0..count).map(move |i| {
        let sport = FLOW_BASE_SPORT.wrapping_add(i as u16);
        base.with_l4_ports(sport, base.l4_dst_port)
    })
}

/// Peer devices laid out the way the T0 topology addresses them
pub mod device_fixtures {
    use sai_topology::{make_device, Device, DeviceRole};

    pub fn server(group: u8, index: u8) -> Device {
        make_device(DeviceRole::Server, group, index)
    }

    pub fn t1(group: u8, index: u8) -> Device {
        make_device(DeviceRole::T1, group, index)
    }

    /// A server that is the destination of a prefix route rather than a
    /// host route.
    pub fn subnet_server(group: u8, index: u8, v4_len: u8, v6_len: u8) -> Device {
        server(group, index).with_prefix(Some(v4_len), Some(v6_len))
    }
}

/// Topology layouts for common scenarios
pub mod config_fixtures {
    use sai_sim::SimConfig;
    use sai_topology::{LagSection, RouteSection, TopologyConfig, VlanSection, VlanSpec};
    use sai_types::VlanId;

    /// The reference T0 layout.
    pub fn t0_default() -> TopologyConfig {
        TopologyConfig::default()
    }

    /// One untagged VLAN on ports 1-8 with a router interface, plus a port
    /// interface on port 0. No LAGs.
    pub fn single_vlan(vlan_id: VlanId) -> TopologyConfig {
        let mut config = TopologyConfig::default();
        config.vlan = VlanSection {
            reset_default_vlan: true,
            vlans: vec![VlanSpec {
                vlan_id,
                ports: (1..=8).collect(),
                tagged: false,
            }],
        };
        config.lag = LagSection {
            lags: Vec::new(),
            ..LagSection::default()
        };
        config.route = RouteSection {
            vlan_rifs: true,
            route_for_lag: false,
            route_for_nexthop_group: false,
            ..RouteSection::default()
        };
        config
    }

    /// A switch with `port_count` ports.
    pub fn switch(port_count: usize) -> SimConfig {
        SimConfig {
            port_count,
            ..SimConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_topology::DeviceKey;
    use sai_types::VlanId;

    #[test]
    fn test_routed_tcp_addresses_router() {
        let router: MacAddress = "00:77:66:55:44:00".parse().unwrap();
        let src = device_fixtures::server(1, 1);
        let dst = device_fixtures::server(60, 0);
        let pkt = routed_tcp(router, &src, &dst, AddressFamily::V6).unwrap();
        assert_eq!(pkt.eth_dst, router);
        assert_eq!(pkt.eth_src, src.mac);
        assert_eq!(pkt.ip_dst.to_string(), "fc02::60:0");
    }

    #[test]
    fn test_routed_tcp_needs_both_addresses() {
        let router: MacAddress = "00:77:66:55:44:00".parse().unwrap();
        let mut src = device_fixtures::server(1, 1);
        src.ipv6 = None;
        let err = routed_tcp(router, &src, &device_fixtures::t1(1, 100), AddressFamily::V6).unwrap_err();
        assert_eq!(
            err,
            VerificationError::MissingAddress {
                device: DeviceKey::server(1, 1).to_string(),
                family: AddressFamily::V6,
            }
        );
    }

    #[test]
    fn test_flow_sweep_varies_source_port_only() {
        let router: MacAddress = "00:77:66:55:44:00".parse().unwrap();
        let base = routed_tcp(
            router,
            &device_fixtures::server(1, 1),
            &device_fixtures::server(60, 0),
            AddressFamily::V4,
        )
        .unwrap();
        let sweep: Vec<_> = flow_sweep(base, 3).collect();
        let sports: Vec<_> = sweep.iter().map(|p| p.l4_src_port).collect();
        assert_eq!(sports, vec![1024, 1025, 1026]);
        assert!(sweep.iter().all(|p| p.ip_dst == base.ip_dst && p.l4_dst_port == 80));
    }

    #[test]
    fn test_single_vlan_layout_validates() {
        let config = config_fixtures::single_vlan(VlanId::new(10).unwrap());
        config.validate().unwrap();
        assert_eq!(config.max_port_index(), Some(8));
        assert!(config.lag.lags.is_empty());
        assert!(config.route.vlan_rifs);
    }
}
