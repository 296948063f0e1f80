use super::DeviceKey;
use sai_client::{NextHopGroupMemberOid, NextHopGroupOid, NextHopOid, RouterInterfaceOid};
use sai_types::{AddressFamily, IpPrefix};
use serde::{Deserialize, Serialize};

/// An IP next-hop and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nexthop {
    pub oid: NextHopOid,
    /// Peer address, prefix-qualified when the peer has a prefix length.
    pub address: IpPrefix,
    /// Unset when the next-hop is shared by several route paths.
    pub device: Option<DeviceKey>,
    pub rif: RouterInterfaceOid,
    pub lag: Option<usize>,
    pub port_idx: Option<usize>,
}

impl Nexthop {
    pub fn family(&self) -> AddressFamily {
        self.address.family()
    }
}

/// The v4 and v6 next-hops built towards one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NexthopPair {
    pub v4: Nexthop,
    pub v6: Nexthop,
}

impl NexthopPair {
    pub fn get(&self, family: AddressFamily) -> &Nexthop {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NexthopGroupMember {
    pub oid: NextHopGroupMemberOid,
    pub next_hop: NextHopOid,
    /// LAG the member's next-hop egresses through.
    pub lag: Option<usize>,
}

/// An ECMP group. Always built together with a group of the other family
/// (`peer`) covering the same egress ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NexthopGroup {
    pub oid: NextHopGroupOid,
    pub family: AddressFamily,
    pub peer: NextHopGroupOid,
    pub members: Vec<NexthopGroupMember>,
    /// Ports of every contributing LAG, flattened.
    pub member_port_indexs: Vec<usize>,
    /// Members taken out by LAG. Their oids are stale; the next-hops are
    /// what a restore adds back.
    #[serde(default)]
    pub removed: Vec<NexthopGroupMember>,
}

impl NexthopGroup {
    /// Removed members that came from LAG `lag_idx`.
    pub fn removed_by_lag(&self, lag_idx: usize) -> impl Iterator<Item = &NexthopGroupMember> {
        self.removed.iter().filter(move |m| m.lag == Some(lag_idx))
    }
}
