//! Route entries.

use crate::error::{SaiError, SaiResult};
use crate::types::{NextHopGroupOid, NextHopOid, RouterInterfaceOid, VirtualRouterOid};
use sai_types::IpPrefix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Route key: VRF plus destination prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteEntry {
    pub vrf: VirtualRouterOid,
    pub destination: IpPrefix,
}

impl RouteEntry {
    pub fn new(vrf: VirtualRouterOid, destination: IpPrefix) -> Self {
        Self { vrf, destination }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vrf {}", self.destination, self.vrf)
    }
}

/// `SAI_PACKET_ACTION_*`, shared by routes and FDB entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketAction {
    #[default]
    Forward,
    Drop,
    Trap,
    Log,
    Deny,
}

/// Value of `SAI_ROUTE_ENTRY_ATTR_NEXT_HOP_ID`, which may name any of three
/// object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RouteTarget {
    #[default]
    None,
    RouterInterface(RouterInterfaceOid),
    NextHop(NextHopOid),
    NextHopGroup(NextHopGroupOid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteConfig {
    pub action: PacketAction,
    pub target: RouteTarget,
}

impl RouteConfig {
    pub fn drop() -> Self {
        Self {
            action: PacketAction::Drop,
            target: RouteTarget::None,
        }
    }

    pub fn forward(target: RouteTarget) -> Self {
        Self {
            action: PacketAction::Forward,
            target,
        }
    }

    pub fn validate(&self) -> SaiResult<()> {
        if self.action == PacketAction::Forward && self.target == RouteTarget::None {
            return Err(SaiError::invalid_parameter(
                "forward action requires a router interface, next hop or next hop group",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteAttr {
    PacketAction,
    NextHopId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAttribute {
    PacketAction(PacketAction),
    NextHopId(RouteTarget),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_requires_target() {
        assert!(RouteConfig::forward(RouteTarget::None).validate().is_err());
        assert!(RouteConfig::drop().validate().is_ok());
        let nh = NextHopOid::from_raw_unchecked(7);
        assert!(RouteConfig::forward(RouteTarget::NextHop(nh)).validate().is_ok());
    }
}
