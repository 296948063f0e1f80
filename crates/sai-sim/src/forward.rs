//! Forwarding model: what the simulated switch does with a frame.
//!
//! Covers the subset of the pipeline the topology layer programs:
//! L2 bridging by FDB, router-MAC termination on an ingress router
//! interface, longest-prefix match in the interface's VRF, next-hop and
//! ECMP resolution, LAG member selection and the L2 rewrite on egress.

use crate::packet::TestPacket;
use crate::switch::{SimState, SimSwitch};
use log::debug;
use sai_client::api::{
    NativeHashField, NextHopConfig, PacketAction, RifTarget, RouteTarget,
};
use sai_client::{LagOid, PortOid, RouterInterfaceOid, VlanOid};
use sai_types::{IpAddress, MacAddress};

/// Why a frame was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownIngressPort,
    /// Frame addressed to the router but no interface is bound to the
    /// ingress port or VLAN.
    NoIngressRouterInterface,
    /// Destination MAC differs from the ingress interface MAC.
    RouterMacMismatch,
    AdminDown,
    TtlExpired,
    NoRoute,
    RouteAction(PacketAction),
    NeighborMiss,
    FdbMiss,
    EmptyGroup,
    EmptyLag,
    Loopback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Egress {
    pub port_index: usize,
    pub packet: TestPacket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forwarded(Egress),
    Dropped(DropReason),
}

impl Verdict {
    pub fn egress(&self) -> Option<&Egress> {
        match self {
            Verdict::Forwarded(e) => Some(e),
            Verdict::Dropped(_) => None,
        }
    }
}

/// The L3 interface a frame arrived on, or the one it will leave by.
#[derive(Debug, Clone, Copy)]
struct L3Hop {
    rif: RouterInterfaceOid,
    neighbor_ip: IpAddress,
}

fn fold(addr: &IpAddress) -> u32 {
    match addr {
        IpAddress::V4(a) => u32::from(*a),
        IpAddress::V6(a) => a
            .segments()
            .chunks(2)
            .fold(0u32, |acc, pair| acc ^ (u32::from(pair[0]) << 16 | u32::from(pair[1]))),
    }
}

impl SimState {
    fn hash_fields(&self) -> Vec<NativeHashField> {
        self.hashes
            .get(&self.lag_hash_ipv4)
            .cloned()
            .unwrap_or_else(|| NativeHashField::DEFAULT_V4.to_vec())
    }

    /// XOR fold of the configured fields and seed. Sequential L4 ports
    /// produce sequential low bits, which keeps modulo selection even.
    fn flow_hash(&self, pkt: &TestPacket, ingress: usize) -> u32 {
        let mut h = self.lag_hash_seed;
        for field in self.hash_fields() {
            h ^= match field {
                NativeHashField::SrcIp => fold(&pkt.ip_src),
                NativeHashField::DstIp => fold(&pkt.ip_dst),
                NativeHashField::IpProtocol => u32::from(pkt.ip_proto) << 24,
                NativeHashField::L4SrcPort => u32::from(pkt.l4_src_port),
                NativeHashField::L4DstPort => u32::from(pkt.l4_dst_port) << 16,
                NativeHashField::InPort => ingress as u32,
                NativeHashField::VlanId => u32::from(pkt.vlan.unwrap_or(0)) << 8,
                NativeHashField::SrcMac
                | NativeHashField::DstMac
                | NativeHashField::EtherType => 0,
            };
        }
        h
    }

    fn port_index(&self, port: PortOid) -> Option<usize> {
        self.ports.iter().position(|p| *p == port)
    }

    /// VLAN the frame is classified into on `port`.
    fn ingress_vlan(&self, port: PortOid, pkt: &TestPacket) -> Option<VlanOid> {
        let tag = match pkt.vlan {
            Some(tag) => tag,
            None => *self.port_vlan_ids.get(&port)?,
        };
        self.vlans
            .iter()
            .find(|(_, v)| v.vlan_id == tag)
            .map(|(oid, _)| *oid)
    }

    fn ingress_rif(&self, port: PortOid, pkt: &TestPacket) -> Option<RouterInterfaceOid> {
        let lag = self.lag_of_port(port);
        let vlan = self.ingress_vlan(port, pkt);
        let bridge_port = self
            .bridge_ports
            .iter()
            .find(|(_, p)| **p == port)
            .map(|(bp, _)| *bp);

        let bound = |target: &RifTarget| match target {
            RifTarget::Port(p) => lag.is_none() && pkt.vlan.is_none() && *p == port,
            RifTarget::Lag(l) => Some(*l) == lag,
            RifTarget::Bridge(bp) => Some(*bp) == bridge_port,
            RifTarget::Vlan(_) | RifTarget::Loopback => false,
        };
        self.rifs
            .iter()
            .find(|(_, r)| bound(&r.config.target))
            .or_else(|| {
                let vlan = vlan?;
                self.rifs
                    .iter()
                    .find(|(_, r)| r.config.target == RifTarget::Vlan(vlan))
            })
            .map(|(oid, _)| *oid)
    }

    fn lookup_route(&self, rif: RouterInterfaceOid, dst: &IpAddress) -> Option<(u8, RouteTarget, PacketAction)> {
        let vrf = self.rifs.get(&rif)?.config.vrf;
        let from_routes = self
            .routes
            .iter()
            .filter(|(e, _)| e.vrf == vrf && e.destination.contains(dst))
            .map(|(e, c)| (e.destination.prefix_len(), c.target, c.action));
        // A neighbor without the no-host flag installs an implicit host route.
        let from_neighbors = self
            .neighbors
            .iter()
            .filter(|(n, c)| !c.no_host_route && n.ip == *dst)
            .filter(|(n, _)| self.rifs.get(&n.rif).map(|r| r.config.vrf) == Some(vrf))
            .map(|(n, _)| {
                (
                    dst.family().max_prefix_len(),
                    RouteTarget::RouterInterface(n.rif),
                    PacketAction::Forward,
                )
            });
        from_routes.chain(from_neighbors).max_by_key(|(len, _, _)| *len)
    }

    fn resolve_next_hop(&self, cfg: &NextHopConfig) -> L3Hop {
        L3Hop {
            rif: cfg.rif,
            neighbor_ip: cfg.ip,
        }
    }

    fn pick_lag_member(&self, lag: LagOid, h: u32, spread: u32) -> Result<PortOid, DropReason> {
        let members = self.lags.get(&lag).ok_or(DropReason::EmptyLag)?;
        if members.is_empty() {
            return Err(DropReason::EmptyLag);
        }
        let idx = (h / spread.max(1)) as usize % members.len();
        self.lag_members
            .get(&members[idx])
            .map(|m| m.port)
            .ok_or(DropReason::EmptyLag)
    }

    fn bridge(&self, vlan: VlanOid, mac: MacAddress) -> Result<PortOid, DropReason> {
        self.fdb
            .iter()
            .find(|(e, _)| e.bv_id == vlan && e.mac == mac)
            .and_then(|(_, c)| self.port_of_bridge_port(c.bridge_port))
            .ok_or(DropReason::FdbMiss)
    }

    fn route(&self, ingress: usize, port: PortOid, pkt: &TestPacket) -> Result<Egress, DropReason> {
        let in_rif = self
            .ingress_rif(port, pkt)
            .ok_or(DropReason::NoIngressRouterInterface)?;
        let in_state = self
            .rifs
            .get(&in_rif)
            .ok_or(DropReason::NoIngressRouterInterface)?;
        if pkt.eth_dst != in_state.src_mac {
            return Err(DropReason::RouterMacMismatch);
        }
        let admin_up = if pkt.ip_dst.is_ipv4() {
            in_state.config.admin_v4_state
        } else {
            in_state.config.admin_v6_state
        };
        if !admin_up {
            return Err(DropReason::AdminDown);
        }
        if pkt.ttl <= 1 {
            return Err(DropReason::TtlExpired);
        }

        let (_, target, action) = self
            .lookup_route(in_rif, &pkt.ip_dst)
            .ok_or(DropReason::NoRoute)?;
        if action != PacketAction::Forward {
            return Err(DropReason::RouteAction(action));
        }

        let h = self.flow_hash(pkt, ingress);
        let mut spread = 1;
        let hop = match target {
            RouteTarget::None => return Err(DropReason::NoRoute),
            RouteTarget::RouterInterface(rif) => L3Hop {
                rif,
                neighbor_ip: pkt.ip_dst,
            },
            RouteTarget::NextHop(nh) => {
                let cfg = self.next_hops.get(&nh).ok_or(DropReason::NoRoute)?;
                self.resolve_next_hop(cfg)
            }
            RouteTarget::NextHopGroup(group) => {
                let members = self.groups.get(&group).ok_or(DropReason::EmptyGroup)?;
                if members.is_empty() {
                    return Err(DropReason::EmptyGroup);
                }
                spread = members.len() as u32;
                let member = members[h as usize % members.len()];
                let nh = self
                    .group_members
                    .get(&member)
                    .map(|m| m.next_hop)
                    .ok_or(DropReason::EmptyGroup)?;
                let cfg = self.next_hops.get(&nh).ok_or(DropReason::EmptyGroup)?;
                self.resolve_next_hop(cfg)
            }
        };

        let out_rif = self.rifs.get(&hop.rif).ok_or(DropReason::NoRoute)?;
        let neighbor = self
            .neighbors
            .iter()
            .find(|(n, _)| n.rif == hop.rif && n.ip == hop.neighbor_ip)
            .map(|(_, c)| c.dst_mac)
            .ok_or(DropReason::NeighborMiss)?;

        let out_port = match out_rif.config.target {
            RifTarget::Port(p) => p,
            RifTarget::Lag(lag) => self.pick_lag_member(lag, h, spread)?,
            RifTarget::Vlan(vlan) => self.bridge(vlan, neighbor)?,
            RifTarget::Bridge(bp) => self.port_of_bridge_port(bp).ok_or(DropReason::FdbMiss)?,
            RifTarget::Loopback => return Err(DropReason::Loopback),
        };
        let port_index = self.port_index(out_port).ok_or(DropReason::UnknownIngressPort)?;

        Ok(Egress {
            port_index,
            packet: pkt.routed(out_rif.src_mac, neighbor),
        })
    }

    fn switch_l2(&self, port: PortOid, pkt: &TestPacket) -> Result<Egress, DropReason> {
        let vlan = self.ingress_vlan(port, pkt).ok_or(DropReason::FdbMiss)?;
        let out_port = self.bridge(vlan, pkt.eth_dst)?;
        let port_index = self.port_index(out_port).ok_or(DropReason::FdbMiss)?;
        Ok(Egress {
            port_index,
            packet: TestPacket { vlan: None, ..*pkt },
        })
    }
}

impl SimSwitch {
    /// Injects `pkt` on front-panel port `ingress` and reports where it
    /// leaves the switch.
    pub fn send(&self, ingress: usize, pkt: &TestPacket) -> Verdict {
        let state = self.state.borrow();
        let Some(port) = state.ports.get(ingress).copied() else {
            return Verdict::Dropped(DropReason::UnknownIngressPort);
        };

        let routed = state.rifs.values().any(|r| r.src_mac == pkt.eth_dst)
            || pkt.eth_dst == state.router_mac;
        let result = if routed {
            state.route(ingress, port, pkt)
        } else {
            state.switch_l2(port, pkt)
        };

        match result {
            Ok(egress) => {
                debug!("port {} -> port {}", ingress, egress.port_index);
                Verdict::Forwarded(egress)
            }
            Err(reason) => {
                debug!("port {} dropped: {:?}", ingress, reason);
                Verdict::Dropped(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::SimConfig;
    use pretty_assertions::assert_eq;
    use sai_client::api::{
        FdbConfig, FdbEntry, FdbEntryType, LagMemberConfig, NeighborConfig, NeighborEntry,
        NextHopGroupMemberConfig, NextHopGroupType, RouteConfig, RouteEntry,
        RouterInterfaceConfig,
    };
    use sai_client::{SaiClient, SaiClientExt};
    use sai_types::IpPrefix;

    fn sim() -> SimSwitch {
        SimSwitch::new(SimConfig {
            port_count: 8,
            ..SimConfig::default()
        })
    }

    fn port_rif(sim: &SimSwitch, index: usize) -> RouterInterfaceOid {
        let vr = sim.default_virtual_router().unwrap();
        sim.create_router_interface(&RouterInterfaceConfig::new(
            vr,
            RifTarget::Port(sim.port(index).unwrap()),
        ))
        .unwrap()
    }

    fn neighbor(sim: &SimSwitch, rif: RouterInterfaceOid, ip: &str, mac: &str, no_host: bool) {
        sim.create_neighbor_entry(
            &NeighborEntry::new(rif, ip.parse().unwrap()),
            &NeighborConfig {
                dst_mac: mac.parse().unwrap(),
                no_host_route: no_host,
            },
        )
        .unwrap();
    }

    fn packet(sim: &SimSwitch, dst: &str) -> TestPacket {
        TestPacket::tcp(
            sim.router_mac(),
            "00:99:66:55:44:00".parse().unwrap(),
            "192.168.0.1".parse().unwrap(),
            dst.parse().unwrap(),
        )
    }

    #[test]
    fn test_host_neighbor_forwards_without_route() {
        let sim = sim();
        port_rif(&sim, 0);
        let out = port_rif(&sim, 3);
        neighbor(&sim, out, "10.0.0.1", "00:aa:00:00:00:01", false);

        let verdict = sim.send(0, &packet(&sim, "10.0.0.1"));
        let egress = verdict.egress().unwrap();
        assert_eq!(egress.port_index, 3);
        assert_eq!(egress.packet.ttl, 63);
        assert_eq!(egress.packet.eth_dst, "00:aa:00:00:00:01".parse().unwrap());
    }

    #[test]
    fn test_no_host_neighbor_needs_route() {
        let sim = sim();
        port_rif(&sim, 0);
        let out = port_rif(&sim, 3);
        neighbor(&sim, out, "10.0.0.1", "00:aa:00:00:00:01", true);
        assert_eq!(
            sim.send(0, &packet(&sim, "10.0.0.1")),
            Verdict::Dropped(DropReason::NoRoute)
        );
    }

    #[test]
    fn test_drop_route_wins_when_longest() {
        let sim = sim();
        port_rif(&sim, 0);
        let vr = sim.default_virtual_router().unwrap();
        sim.create_route_entry(
            &RouteEntry::new(vr, IpPrefix::default_route(sai_types::AddressFamily::V4)),
            &RouteConfig::drop(),
        )
        .unwrap();
        assert_eq!(
            sim.send(0, &packet(&sim, "8.8.8.8")),
            Verdict::Dropped(DropReason::RouteAction(PacketAction::Drop))
        );
    }

    #[test]
    fn test_ttl_one_is_not_forwarded() {
        let sim = sim();
        port_rif(&sim, 0);
        let out = port_rif(&sim, 3);
        neighbor(&sim, out, "10.0.0.1", "00:aa:00:00:00:01", false);
        let pkt = packet(&sim, "10.0.0.1").with_ttl(1);
        assert_eq!(sim.send(0, &pkt), Verdict::Dropped(DropReason::TtlExpired));
    }

    #[test]
    fn test_ecmp_over_lags_spreads_sequential_ports() {
        let sim = sim();
        let vr = sim.default_virtual_router().unwrap();
        port_rif(&sim, 0);

        let group = sim.create_next_hop_group(NextHopGroupType::Ecmp).unwrap();
        for (i, ports) in [[2usize, 3], [4, 5]].iter().enumerate() {
            let lag = sim.create_lag().unwrap();
            for p in ports {
                sim.create_lag_member(&LagMemberConfig {
                    lag,
                    port: sim.port(*p).unwrap(),
                })
                .unwrap();
            }
            let rif = sim
                .create_router_interface(&RouterInterfaceConfig::new(vr, RifTarget::Lag(lag)))
                .unwrap();
            let ip = format!("10.1.{}.100", i + 1);
            neighbor(&sim, rif, &ip, "00:aa:00:00:00:01", true);
            let nh = sim
                .create_next_hop(&NextHopConfig {
                    ip: ip.parse().unwrap(),
                    rif,
                })
                .unwrap();
            sim.create_next_hop_group_member(&NextHopGroupMemberConfig::new(group, nh))
                .unwrap();
        }
        sim.create_route_entry(
            &RouteEntry::new(vr, "192.168.60.0/24".parse().unwrap()),
            &RouteConfig::forward(RouteTarget::NextHopGroup(group)),
        )
        .unwrap();

        let mut counts = [0usize; 8];
        for sport in 2000..2400u16 {
            let pkt = packet(&sim, "192.168.60.1").with_l4_ports(sport, 80);
            counts[sim.send(0, &pkt).egress().unwrap().port_index] += 1;
        }
        assert_eq!(&counts[2..6], &[100, 100, 100, 100]);
    }

    #[test]
    fn test_l2_bridging_by_fdb() {
        let sim = sim();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = sim.bridge_port_list().unwrap();
        let mac: MacAddress = "00:99:66:55:01:05".parse().unwrap();
        sim.create_fdb_entry(
            &FdbEntry {
                switch_id: sim.switch_id(),
                mac,
                bv_id: vlan,
            },
            &FdbConfig {
                entry_type: FdbEntryType::Static,
                bridge_port: bridge_ports[5],
                action: PacketAction::Forward,
                allow_mac_move: true,
            },
        )
        .unwrap();

        let mut pkt = packet(&sim, "192.168.1.5");
        pkt.eth_dst = mac;
        assert_eq!(sim.send(1, &pkt).egress().unwrap().port_index, 5);
    }
}
