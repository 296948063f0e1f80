//! Value types for building SAI test topologies.
//!
//! - [`MacAddress`]: 48-bit Ethernet address, with helpers for synthesizing
//!   per-device addresses
//! - [`IpAddress`] / [`IpPrefix`] / [`AddressFamily`]: dual-stack addressing
//!   with prefix masking and longest-prefix comparisons
//! - [`VlanId`]: IEEE 802.1Q tag

mod ip;
mod mac;
mod vlan;

pub use ip::{AddressFamily, IpAddress, IpPrefix};
pub use mac::MacAddress;
pub use vlan::VlanId;

pub use std::net::{Ipv4Addr, Ipv6Addr};

/// Parse failures for the value types in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),
}
