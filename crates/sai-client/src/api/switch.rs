//! Switch-level attributes.

use crate::types::{BridgePortOid, HashOid, PortOid, VirtualRouterOid, VlanOid};
use sai_types::MacAddress;
use serde::{Deserialize, Serialize};

/// `SAI_HASH_ALGORITHM_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Crc,
    Xor,
    Random,
    Crc32Lo,
    Crc32Hi,
    CrcCcitt,
    CrcXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchAttr {
    DefaultVirtualRouterId,
    /// `SAI_SWITCH_ATTR_DEFAULT_VLAN_ID`
    DefaultVlanId,
    PortList,
    /// Bridge ports of the default .1Q bridge.
    BridgePortList,
    SrcMacAddress,
    LagDefaultHashAlgorithm,
    LagDefaultHashSeed,
    LagHashIpv4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchAttribute {
    DefaultVirtualRouterId(VirtualRouterOid),
    DefaultVlanId(VlanOid),
    PortList(Vec<PortOid>),
    BridgePortList(Vec<BridgePortOid>),
    SrcMacAddress(MacAddress),
    LagDefaultHashAlgorithm(HashAlgorithm),
    LagDefaultHashSeed(u32),
    LagHashIpv4(HashOid),
}

impl SwitchAttribute {
    pub fn id(&self) -> SwitchAttr {
        match self {
            SwitchAttribute::DefaultVirtualRouterId(_) => SwitchAttr::DefaultVirtualRouterId,
            SwitchAttribute::DefaultVlanId(_) => SwitchAttr::DefaultVlanId,
            SwitchAttribute::PortList(_) => SwitchAttr::PortList,
            SwitchAttribute::BridgePortList(_) => SwitchAttr::BridgePortList,
            SwitchAttribute::SrcMacAddress(_) => SwitchAttr::SrcMacAddress,
            SwitchAttribute::LagDefaultHashAlgorithm(_) => SwitchAttr::LagDefaultHashAlgorithm,
            SwitchAttribute::LagDefaultHashSeed(_) => SwitchAttr::LagDefaultHashSeed,
            SwitchAttribute::LagHashIpv4(_) => SwitchAttr::LagHashIpv4,
        }
    }
}
