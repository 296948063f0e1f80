//! In-memory model of the topology and the device handles behind it.

mod device;
mod interface;
mod lag;
mod nexthop;
mod port;
mod vlan;

pub use device::{Device, DeviceKey, DeviceNeighbors, DeviceRole, NeighborMode};
pub use interface::{NetInterface, Resolved, RifList, RifRecord};
pub use lag::Lag;
pub use nexthop::{Nexthop, NexthopGroup, NexthopGroupMember, NexthopPair};
pub use port::Port;
pub use vlan::Vlan;
