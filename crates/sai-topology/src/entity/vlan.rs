use super::RifList;
use sai_client::{NextHopOid, VlanMemberOid, VlanOid};
use sai_types::{AddressFamily, VlanId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub vlan_id: VlanId,
    pub vlan_oid: VlanOid,
    /// Port indexes in member order.
    pub member_port_indexs: Vec<usize>,
    /// Member handles, parallel to `member_port_indexs`.
    pub vlan_mport_oids: Vec<VlanMemberOid>,
    pub rifs: RifList,
    /// Last next-hop built over this VLAN's router interface.
    pub nexthopv4: Option<NextHopOid>,
    pub nexthopv6: Option<NextHopOid>,
}

impl Vlan {
    pub fn new(vlan_id: VlanId, vlan_oid: VlanOid) -> Self {
        Self {
            vlan_id,
            vlan_oid,
            member_port_indexs: Vec::new(),
            vlan_mport_oids: Vec::new(),
            rifs: RifList::default(),
            nexthopv4: None,
            nexthopv6: None,
        }
    }

    pub fn nexthop(&self, family: AddressFamily) -> Option<NextHopOid> {
        match family {
            AddressFamily::V4 => self.nexthopv4,
            AddressFamily::V6 => self.nexthopv6,
        }
    }
}
