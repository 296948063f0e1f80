use super::RifList;
use sai_client::{BridgePortOid, PortOid};
use serde::{Deserialize, Serialize};

/// A front-panel port and the bridge port that represents it in the
/// 802.1Q bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub index: usize,
    pub oid: PortOid,
    pub bridge_port: BridgePortOid,
    /// Port-bound router interfaces.
    pub rifs: RifList,
    /// Bridge-bound router interfaces.
    pub bridge_rifs: RifList,
}

impl Port {
    pub fn new(index: usize, oid: PortOid, bridge_port: BridgePortOid) -> Self {
        Self {
            index,
            oid,
            bridge_port,
            rifs: RifList::default(),
            bridge_rifs: RifList::default(),
        }
    }
}
