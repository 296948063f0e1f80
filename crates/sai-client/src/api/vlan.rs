//! VLAN and VLAN membership.

use crate::types::{BridgePortOid, VlanMemberOid, VlanOid};
use serde::{Deserialize, Serialize};

/// `SAI_VLAN_TAGGING_MODE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanTaggingMode {
    #[default]
    Untagged,
    Tagged,
    PriorityTagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanMemberConfig {
    pub vlan: VlanOid,
    pub bridge_port: BridgePortOid,
    pub tagging: VlanTaggingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VlanAttr {
    VlanId,
    MemberList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlanAttribute {
    VlanId(u16),
    MemberList(Vec<VlanMemberOid>),
}
