//! Port and bridge-port attributes.

use crate::types::PortOid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortAttr {
    /// Untagged ingress VLAN (`SAI_PORT_ATTR_PORT_VLAN_ID`).
    PortVlanId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAttribute {
    PortVlanId(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgePortAttr {
    PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePortAttribute {
    PortId(PortOid),
}
