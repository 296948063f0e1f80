//! Typed access to a SAI device.
//!
//! - [`types`]: kind-tagged object ids
//! - [`error`]: status codes and [`SaiError`]
//! - [`api`]: request and attribute types per SAI API
//! - [`client`]: the [`SaiClient`] capability trait and [`SaiClientExt`]
//!   typed accessors
//!
//! ```ignore
//! use sai_client::{SaiClient, SaiClientExt, SaiResult, VirtualRouterOid};
//!
//! fn default_vr(client: &dyn SaiClient) -> SaiResult<VirtualRouterOid> {
//!     client.default_virtual_router()
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{SaiClient, SaiClientExt};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use types::{
    BridgePortOid, HashOid, LagMemberOid, LagOid, NextHopGroupMemberOid, NextHopGroupOid,
    NextHopOid, PortOid, RawSaiObjectId, RouterInterfaceOid, SaiObjectId, SaiObjectKind,
    SwitchOid, VirtualRouterOid, VlanMemberOid, VlanOid,
};
