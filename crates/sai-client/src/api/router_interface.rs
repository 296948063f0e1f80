//! Router interfaces.

use crate::types::{BridgePortOid, LagOid, PortOid, VirtualRouterOid, VlanOid};
use sai_types::MacAddress;
use serde::{Deserialize, Serialize};

/// `SAI_ROUTER_INTERFACE_TYPE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterInterfaceType {
    Port,
    Vlan,
    Bridge,
    Loopback,
}

/// What a router interface is bound to.
///
/// A LAG binds as a port-type interface whose port id is the LAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RifTarget {
    Port(PortOid),
    Lag(LagOid),
    Vlan(VlanOid),
    Bridge(BridgePortOid),
    Loopback,
}

impl RifTarget {
    pub fn rif_type(&self) -> RouterInterfaceType {
        match self {
            RifTarget::Port(_) | RifTarget::Lag(_) => RouterInterfaceType::Port,
            RifTarget::Vlan(_) => RouterInterfaceType::Vlan,
            RifTarget::Bridge(_) => RouterInterfaceType::Bridge,
            RifTarget::Loopback => RouterInterfaceType::Loopback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterInterfaceConfig {
    pub vrf: VirtualRouterOid,
    pub target: RifTarget,
    /// Falls back to the switch MAC when unset.
    pub src_mac: Option<MacAddress>,
    pub mtu: Option<u32>,
    pub admin_v4_state: bool,
    pub admin_v6_state: bool,
}

impl RouterInterfaceConfig {
    /// Both address families administratively up.
    pub fn new(vrf: VirtualRouterOid, target: RifTarget) -> Self {
        Self {
            vrf,
            target,
            src_mac: None,
            mtu: None,
            admin_v4_state: true,
            admin_v6_state: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterInterfaceAttr {
    Type,
    VirtualRouterId,
    SrcMacAddress,
    Mtu,
    AdminV4State,
    AdminV6State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterInterfaceAttribute {
    Type(RouterInterfaceType),
    VirtualRouterId(VirtualRouterOid),
    SrcMacAddress(MacAddress),
    Mtu(u32),
    AdminV4State(bool),
    AdminV6State(bool),
}
