//! Builders that program one object family each and record the handles on
//! the [`crate::Dut`] registry.
//!
//! Every configurer borrows the same [`sai_client::SaiClient`]; a setup pass
//! typically holds all four at once.

mod fdb;
mod lag;
mod route;
mod vlan;

pub use fdb::{FdbConfigurer, FdbOptions, SettlePolicy};
pub use lag::LagConfigurer;
pub use route::{RifOptions, RouteConfigurer, RoutePair, RoutePath};
pub use vlan::VlanConfigurer;
