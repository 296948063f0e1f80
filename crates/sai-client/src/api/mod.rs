//! Request and attribute types, one module per SAI API.
//!
//! Attribute getters take an id enum (`*Attr`) and return the matching
//! value enum (`*Attribute`). Setters take the value enum directly.

pub mod fdb;
pub mod hash;
pub mod lag;
pub mod neighbor;
pub mod next_hop;
pub mod port;
pub mod route;
pub mod router_interface;
pub mod switch;
pub mod vlan;

pub use fdb::{FdbConfig, FdbEntry, FdbEntryType};
pub use hash::{HashAttr, HashAttribute, NativeHashField};
pub use lag::LagMemberConfig;
pub use neighbor::{NeighborConfig, NeighborEntry};
pub use next_hop::{NextHopConfig, NextHopGroupMemberConfig, NextHopGroupType};
pub use port::{BridgePortAttr, BridgePortAttribute, PortAttr, PortAttribute};
pub use route::{PacketAction, RouteAttr, RouteAttribute, RouteConfig, RouteEntry, RouteTarget};
pub use router_interface::{
    RifTarget, RouterInterfaceAttr, RouterInterfaceAttribute, RouterInterfaceConfig,
    RouterInterfaceType,
};
pub use switch::{HashAlgorithm, SwitchAttr, SwitchAttribute};
pub use vlan::{VlanAttr, VlanAttribute, VlanMemberConfig, VlanTaggingMode};
