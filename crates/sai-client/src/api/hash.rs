//! Hash objects used for LAG and ECMP member selection.

use serde::{Deserialize, Serialize};

/// `SAI_NATIVE_HASH_FIELD_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeHashField {
    SrcIp,
    DstIp,
    IpProtocol,
    L4SrcPort,
    L4DstPort,
    SrcMac,
    DstMac,
    InPort,
    EtherType,
    VlanId,
}

impl NativeHashField {
    /// Five-tuple used when no field list is supplied.
    pub const DEFAULT_V4: [NativeHashField; 5] = [
        NativeHashField::SrcIp,
        NativeHashField::DstIp,
        NativeHashField::IpProtocol,
        NativeHashField::L4DstPort,
        NativeHashField::L4SrcPort,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAttr {
    NativeHashFieldList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashAttribute {
    NativeHashFieldList(Vec<NativeHashField>),
}
