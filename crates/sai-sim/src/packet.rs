//! Synthetic test frames.

use sai_types::{IpAddress, MacAddress};
use serde::{Deserialize, Serialize};

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

/// An Ethernet/IP/L4 frame reduced to the fields the forwarding model reads
/// or rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestPacket {
    pub eth_dst: MacAddress,
    pub eth_src: MacAddress,
    /// 802.1Q tag, if the frame is tagged.
    pub vlan: Option<u16>,
    pub ip_src: IpAddress,
    pub ip_dst: IpAddress,
    /// TTL for v4, hop limit for v6.
    pub ttl: u8,
    pub ip_proto: u8,
    pub l4_src_port: u16,
    pub l4_dst_port: u16,
}

impl TestPacket {
    /// TCP frame with TTL 64 and ports 1234 -> 80.
    pub fn tcp(eth_dst: MacAddress, eth_src: MacAddress, ip_src: IpAddress, ip_dst: IpAddress) -> Self {
        Self {
            eth_dst,
            eth_src,
            vlan: None,
            ip_src,
            ip_dst,
            ttl: 64,
            ip_proto: IP_PROTO_TCP,
            l4_src_port: 1234,
            l4_dst_port: 80,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_l4_ports(mut self, src: u16, dst: u16) -> Self {
        self.l4_src_port = src;
        self.l4_dst_port = dst;
        self
    }

    pub fn with_vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    /// The frame a router emits after forwarding this one.
    pub fn routed(&self, eth_src: MacAddress, eth_dst: MacAddress) -> Self {
        Self {
            eth_src,
            eth_dst,
            vlan: None,
            ttl: self.ttl.saturating_sub(1),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_routed_rewrites_l2_and_ttl() {
        let router: MacAddress = "00:77:66:55:44:00".parse().unwrap();
        let host: MacAddress = "00:99:66:55:44:00".parse().unwrap();
        let peer: MacAddress = "00:aa:00:00:01:09".parse().unwrap();
        let pkt = TestPacket::tcp(
            router,
            host,
            "192.168.0.1".parse().unwrap(),
            "192.168.2.9".parse().unwrap(),
        )
        .with_vlan(10);

        let out = pkt.routed(router, peer);
        assert_eq!(out.eth_src, router);
        assert_eq!(out.eth_dst, peer);
        assert_eq!(out.ttl, 63);
        assert_eq!(out.vlan, None);
        assert_eq!(out.ip_dst, pkt.ip_dst);
    }
}
