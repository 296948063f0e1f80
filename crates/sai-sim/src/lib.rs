//! A SAI switch held in memory.
//!
//! [`SimSwitch`] implements [`sai_client::SaiClient`] with the referential
//! checks a real SAI enforces (a VLAN with members cannot be removed, a
//! router interface referenced by a next-hop is in use, and so on), keeps a
//! journal of successful mutating calls, and can be told to fail the next
//! call of a given kind. [`SimSwitch::send`] runs a [`TestPacket`] through a
//! forwarding model so traffic assertions can be made without hardware.

mod forward;
mod packet;
mod switch;

pub use forward::{DropReason, Egress, Verdict};
pub use packet::{TestPacket, IP_PROTO_TCP, IP_PROTO_UDP};
pub use switch::{SimConfig, SimInventory, SimOp, SimSwitch};
