//! Net interfaces and their router-interface caches.

use sai_client::{RouterInterfaceOid, VirtualRouterOid};
use sai_types::VlanId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything a router interface can be bound to.
///
/// Ports and LAGs are addressed by their index in the [`crate::Dut`]
/// registry, VLANs by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NetInterface {
    Port(usize),
    Vlan(VlanId),
    Lag(usize),
    Loopback,
}

impl fmt::Display for NetInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetInterface::Port(idx) => write!(f, "port{}", idx),
            NetInterface::Vlan(id) => write!(f, "Vlan{}", id),
            NetInterface::Lag(idx) => write!(f, "lag{}", idx),
            NetInterface::Loopback => write!(f, "loopback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RifRecord {
    pub oid: RouterInterfaceOid,
    pub vrf: VirtualRouterOid,
}

/// Router interfaces created over one net interface, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RifList(Vec<RifRecord>);

impl RifList {
    pub fn push(&mut self, oid: RouterInterfaceOid, vrf: VirtualRouterOid) {
        self.0.push(RifRecord { oid, vrf });
    }

    /// The most recent interface bound into `vrf`.
    pub fn latest_for(&self, vrf: VirtualRouterOid) -> Option<RouterInterfaceOid> {
        self.0.iter().rev().find(|r| r.vrf == vrf).map(|r| r.oid)
    }

    pub fn latest(&self) -> Option<RouterInterfaceOid> {
        self.0.last().map(|r| r.oid)
    }

    pub fn contains(&self, oid: RouterInterfaceOid) -> bool {
        self.0.iter().any(|r| r.oid == oid)
    }

    pub fn oids(&self) -> impl Iterator<Item = RouterInterfaceOid> + '_ {
        self.0.iter().map(|r| r.oid)
    }

    pub fn remove(&mut self, oid: RouterInterfaceOid) {
        self.0.retain(|r| r.oid != oid);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Outcome of an idempotent build: the handle and whether this call
/// created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T> {
    pub oid: T,
    pub created: bool,
}

impl<T> Resolved<T> {
    pub fn created(oid: T) -> Self {
        Self { oid, created: true }
    }

    pub fn reused(oid: T) -> Self {
        Self {
            oid,
            created: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_latest_for_is_per_vrf() {
        let vr1 = VirtualRouterOid::from_raw_unchecked(0x3000000000001);
        let vr2 = VirtualRouterOid::from_raw_unchecked(0x3000000000002);
        let a = RouterInterfaceOid::from_raw_unchecked(0x6000000000010);
        let b = RouterInterfaceOid::from_raw_unchecked(0x6000000000011);
        let c = RouterInterfaceOid::from_raw_unchecked(0x6000000000012);

        let mut list = RifList::default();
        list.push(a, vr1);
        list.push(b, vr2);
        list.push(c, vr1);

        assert_eq!(list.latest_for(vr1), Some(c));
        assert_eq!(list.latest_for(vr2), Some(b));
        assert_eq!(list.latest(), Some(c));

        list.remove(c);
        assert_eq!(list.latest_for(vr1), Some(a));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_net_interface_display() {
        assert_eq!(NetInterface::Vlan(VlanId::new(10).unwrap()).to_string(), "Vlan10");
        assert_eq!(NetInterface::Lag(3).to_string(), "lag3");
    }
}
