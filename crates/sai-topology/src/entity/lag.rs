use super::RifList;
use sai_client::{LagMemberOid, LagOid, NextHopGroupOid, NextHopOid};
use sai_types::{AddressFamily, MacAddress};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lag {
    /// 1-based position in the registry.
    pub index: usize,
    pub lag_id: LagOid,
    /// Member handles, parallel to `member_port_indexs`.
    pub lag_members: Vec<LagMemberOid>,
    pub member_port_indexs: Vec<usize>,
    pub rifs: RifList,
    pub nexthopv4: Option<NextHopOid>,
    pub nexthopv6: Option<NextHopOid>,
    /// Groups this LAG contributes a member to.
    pub nexthop_groupv4: Option<NextHopGroupOid>,
    pub nexthop_groupv6: Option<NextHopGroupOid>,
    /// MAC of the peer reached over this LAG.
    pub neighbor_mac: Option<MacAddress>,
}

impl Lag {
    pub fn new(index: usize, lag_id: LagOid) -> Self {
        Self {
            index,
            lag_id,
            lag_members: Vec::new(),
            member_port_indexs: Vec::new(),
            rifs: RifList::default(),
            nexthopv4: None,
            nexthopv6: None,
            nexthop_groupv4: None,
            nexthop_groupv6: None,
            neighbor_mac: None,
        }
    }

    pub fn nexthop(&self, family: AddressFamily) -> Option<NextHopOid> {
        match family {
            AddressFamily::V4 => self.nexthopv4,
            AddressFamily::V6 => self.nexthopv6,
        }
    }

    pub fn nexthop_group(&self, family: AddressFamily) -> Option<NextHopGroupOid> {
        match family {
            AddressFamily::V4 => self.nexthop_groupv4,
            AddressFamily::V6 => self.nexthop_groupv6,
        }
    }
}
