//! Next-hops and next-hop groups.

use crate::types::{NextHopGroupOid, NextHopOid, RouterInterfaceOid};
use sai_types::IpAddress;
use serde::{Deserialize, Serialize};

/// IP next-hop (`SAI_NEXT_HOP_TYPE_IP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHopConfig {
    pub ip: IpAddress,
    pub rif: RouterInterfaceOid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopGroupType {
    #[default]
    Ecmp,
    Wcmp,
    FineGrainEcmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHopGroupMemberConfig {
    pub group: NextHopGroupOid,
    pub next_hop: NextHopOid,
    pub weight: u32,
}

impl NextHopGroupMemberConfig {
    pub fn new(group: NextHopGroupOid, next_hop: NextHopOid) -> Self {
        Self {
            group,
            next_hop,
            weight: 1,
        }
    }
}
