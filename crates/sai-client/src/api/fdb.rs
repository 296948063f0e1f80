//! FDB (MAC table) entries.

use crate::api::route::PacketAction;
use crate::types::{BridgePortOid, SwitchOid, VlanOid};
use sai_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of an FDB entry. `bv_id` is the VLAN the MAC is learned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FdbEntry {
    pub switch_id: SwitchOid,
    pub mac: MacAddress,
    pub bv_id: VlanOid,
}

impl fmt::Display for FdbEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.mac, self.bv_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdbEntryType {
    Dynamic,
    #[default]
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdbConfig {
    pub entry_type: FdbEntryType,
    pub bridge_port: BridgePortOid,
    pub action: PacketAction,
    pub allow_mac_move: bool,
}
