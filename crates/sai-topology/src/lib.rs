//! Builds SAI conformance-test topologies on a device under test.
//!
//! The crate keeps an in-memory model of everything it programs (the
//! [`Dut`] registry) and offers one configurer per object family:
//!
//! - [`VlanConfigurer`]: VLANs and their members
//! - [`LagConfigurer`]: LAGs, members and the switch LAG hash
//! - [`FdbConfigurer`]: static MAC entries, with a settle wait
//! - [`RouteConfigurer`]: router interfaces, neighbors, next-hops, ECMP
//!   groups and routes
//!
//! [`teardown`] removes the lot in reverse dependency order, and
//! [`T0Topology`] assembles the reference T0 layout from a
//! [`TopologyConfig`].
//!
//! ```ignore
//! use sai_topology::{T0Topology, TopologyConfig};
//!
//! let config = TopologyConfig::load_or_default("t0.toml")?;
//! let mut t0 = T0Topology::setup(&client, &config)?;
//! // ... send traffic ...
//! t0.teardown(&client)?;
//! ```

pub mod config;
pub mod configurer;
pub mod dut;
pub mod entity;
pub mod error;
pub mod t0;
pub mod teardown;

pub use config::{
    DeviceSection, FdbSection, LagSection, RouteSection, TopologyConfig, VlanSection, VlanSpec,
};
pub use configurer::{
    FdbConfigurer, FdbOptions, LagConfigurer, RifOptions, RouteConfigurer, RoutePair, RoutePath,
    SettlePolicy, VlanConfigurer,
};
pub use dut::{Dut, DutSummary};
pub use entity::{
    Device, DeviceKey, DeviceNeighbors, DeviceRole, Lag, NeighborMode, NetInterface, Nexthop,
    NexthopGroup, NexthopGroupMember, NexthopPair, Port, Resolved, RifList, Vlan,
};
pub use error::{Result, TeardownFailure, TopologyError};
pub use t0::{make_device, T0Topology};
pub use teardown::teardown;
