//! Type-safe SAI object ids.
//!
//! Every object the topology layer creates is identified by a
//! device-assigned `u64`. The kind marker keeps a next-hop id from being
//! passed where a router interface id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw object id as carried on the wire (`sai_object_id_t`).
pub type RawSaiObjectId = u64;

/// Marker trait for SAI object kinds.
pub trait SaiObjectKind: Send + Sync + 'static {
    fn type_name() -> &'static str;
}

/// A device object id tagged with its kind.
///
/// ```
/// use sai_client::{NextHopOid, RouterInterfaceOid};
///
/// let rif = RouterInterfaceOid::from_raw(0x6000000000001).unwrap();
/// let nh = NextHopOid::from_raw(0x4000000000001).unwrap();
/// assert!(rif.is_valid() && nh.is_valid());
/// // fn takes_rif(_: RouterInterfaceOid) {}
/// // takes_rif(nh); // does not compile
/// ```
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// `SAI_NULL_OBJECT_ID`.
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Returns `None` for the null id.
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        (raw != 0).then(|| Self::from_raw_unchecked(raw))
    }

    pub const fn from_raw_unchecked(raw: RawSaiObjectId) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }

    pub const fn is_valid(&self) -> bool {
        self.raw != 0
    }
}

// Manual impls so the marker type does not need to satisfy the bounds.

impl<T: SaiObjectKind> Clone for SaiObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: SaiObjectKind> Copy for SaiObjectId<T> {}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> PartialOrd for SaiObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SaiObjectKind> Ord for SaiObjectId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SaiObjectKind> Default for SaiObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T: SaiObjectKind> Serialize for SaiObjectId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.raw)
    }
}

impl<'de, T: SaiObjectKind> Deserialize<'de> for SaiObjectId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_raw_unchecked)
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker for SAI ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Id of a SAI ", $type_name, " object.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(SwitchKind, "Switch", SwitchOid);
define_object_kind!(PortKind, "Port", PortOid);
define_object_kind!(BridgePortKind, "BridgePort", BridgePortOid);
define_object_kind!(VirtualRouterKind, "VirtualRouter", VirtualRouterOid);
define_object_kind!(RouterInterfaceKind, "RouterInterface", RouterInterfaceOid);
define_object_kind!(NextHopKind, "NextHop", NextHopOid);
define_object_kind!(NextHopGroupKind, "NextHopGroup", NextHopGroupOid);
define_object_kind!(NextHopGroupMemberKind, "NextHopGroupMember", NextHopGroupMemberOid);
define_object_kind!(VlanKind, "Vlan", VlanOid);
define_object_kind!(VlanMemberKind, "VlanMember", VlanMemberOid);
define_object_kind!(LagKind, "Lag", LagOid);
define_object_kind!(LagMemberKind, "LagMember", LagMemberOid);
define_object_kind!(HashKind, "Hash", HashOid);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_and_valid() {
        assert!(VlanOid::from_raw(0).is_none());
        assert!(VlanOid::NULL.is_null());
        assert_eq!(VlanOid::default(), VlanOid::NULL);

        let lag = LagOid::from_raw(0x2000000000003).unwrap();
        assert!(lag.is_valid());
        assert_eq!(lag.as_raw(), 0x2000000000003);
    }

    #[test]
    fn test_debug_includes_kind() {
        let nhg = NextHopGroupOid::from_raw_unchecked(0x5000000000001);
        assert_eq!(format!("{:?}", nhg), "NextHopGroup(0x0005000000000001)");
        assert_eq!(nhg.to_string(), "0x0005000000000001");
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let a = RouterInterfaceOid::from_raw_unchecked(1);
        let b = RouterInterfaceOid::from_raw_unchecked(2);
        assert!(a < b);
        let mut ids = vec![b, a];
        ids.sort();
        assert_eq!(ids, vec![a, b]);
    }
}
