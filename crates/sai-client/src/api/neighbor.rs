//! Neighbor entries.

use crate::types::RouterInterfaceOid;
use sai_types::{IpAddress, MacAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a neighbor entry: the interface it was learned on plus its IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub rif: RouterInterfaceOid,
    pub ip: IpAddress,
}

impl NeighborEntry {
    pub fn new(rif: RouterInterfaceOid, ip: IpAddress) -> Self {
        Self { rif, ip }
    }
}

impl fmt::Display for NeighborEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ip, self.rif)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborConfig {
    pub dst_mac: MacAddress,
    /// Skip the implicit /32 or /128 host route.
    pub no_host_route: bool,
}
