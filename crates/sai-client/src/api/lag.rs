//! LAG membership.

use crate::types::{LagOid, PortOid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagMemberConfig {
    pub lag: LagOid,
    pub port: PortOid,
}
