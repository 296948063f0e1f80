//! Dual-stack addresses and prefixes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub const BOTH: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// Width of an address in bits.
    pub const fn max_prefix_len(self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    pub const fn unspecified(self) -> IpAddress {
        match self {
            AddressFamily::V4 => IpAddress::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddress::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// An IPv4 or IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    pub const fn family(&self) -> AddressFamily {
        match self {
            IpAddress::V4(_) => AddressFamily::V4,
            IpAddress::V6(_) => AddressFamily::V6,
        }
    }

    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    fn to_bits(self) -> u128 {
        match self {
            IpAddress::V4(a) => u128::from(u32::from(a)),
            IpAddress::V6(a) => u128::from(a),
        }
    }

    fn from_bits(family: AddressFamily, bits: u128) -> Self {
        match family {
            // Only the low 32 bits are ever populated for v4.
            AddressFamily::V4 => IpAddress::V4(Ipv4Addr::from((bits & 0xffff_ffff) as u32)),
            AddressFamily::V6 => IpAddress::V6(Ipv6Addr::from(bits)),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(a) => a.fmt(f),
            IpAddress::V6(a) => a.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |_| ParseError::InvalidIpAddress(s.to_string());
        if s.contains(':') {
            s.parse::<Ipv6Addr>().map(IpAddress::V6).map_err(invalid)
        } else {
            s.parse::<Ipv4Addr>().map(IpAddress::V4).map_err(invalid)
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr)
    }
}

/// An address with a prefix length, e.g. `192.168.11.1/24`.
///
/// The address is kept as given. [`IpPrefix::network`] yields the masked
/// form and [`IpPrefix::contains`] compares under the mask, so a device's own
/// address can be used directly as a route destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// # Errors
    ///
    /// Fails if `prefix_len` exceeds the address width.
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.family().max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for {}",
                prefix_len,
                max_len,
                address.family()
            )));
        }
        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// A /32 or /128 covering exactly `address`.
    pub const fn host(address: IpAddress) -> Self {
        let prefix_len = address.family().max_prefix_len();
        IpPrefix {
            address,
            prefix_len,
        }
    }

    /// `0.0.0.0/0` or `::/0`.
    pub const fn default_route(family: AddressFamily) -> Self {
        IpPrefix {
            address: family.unspecified(),
            prefix_len: 0,
        }
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn family(&self) -> AddressFamily {
        self.address.family()
    }

    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.family().max_prefix_len()
    }

    pub const fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    fn mask(&self) -> u128 {
        let width = u32::from(self.family().max_prefix_len());
        let len = u32::from(self.prefix_len);
        if len == 0 {
            return 0;
        }
        let ones = u128::MAX >> (128 - len);
        ones << (width - len)
    }

    /// The prefix with host bits cleared.
    pub fn network(&self) -> IpPrefix {
        let bits = self.address.to_bits() & self.mask();
        IpPrefix {
            address: IpAddress::from_bits(self.family(), bits),
            prefix_len: self.prefix_len,
        }
    }

    /// True if `addr` is of the same family and falls inside this prefix.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        if addr.family() != self.family() {
            return false;
        }
        let mask = self.mask();
        (addr.to_bits() & mask) == (self.address.to_bits() & mask)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_family() {
        let v4: IpAddress = "10.1.2.100".parse().unwrap();
        assert_eq!(v4.family(), AddressFamily::V4);
        let v6: IpAddress = "fc00:1::2:64".parse().unwrap();
        assert_eq!(v6.family(), AddressFamily::V6);
        assert!("10.1.2".parse::<IpAddress>().is_err());
    }

    #[test]
    fn test_host_and_default_prefixes() {
        let host = IpPrefix::host("192.168.2.9".parse().unwrap());
        assert_eq!(host.to_string(), "192.168.2.9/32");
        assert!(host.is_host_route());

        let host6 = IpPrefix::host("fc02::2:9".parse().unwrap());
        assert_eq!(host6.prefix_len(), 128);

        assert_eq!(IpPrefix::default_route(AddressFamily::V4).to_string(), "0.0.0.0/0");
        assert_eq!(IpPrefix::default_route(AddressFamily::V6).to_string(), "::/0");
        assert!(IpPrefix::default_route(AddressFamily::V6).is_default());
    }

    #[test]
    fn test_network_masks_host_bits() {
        let prefix: IpPrefix = "192.168.11.1/24".parse().unwrap();
        assert_eq!(prefix.network().to_string(), "192.168.11.0/24");

        let prefix6: IpPrefix = "fc02::b:1/112".parse().unwrap();
        assert_eq!(prefix6.network().to_string(), "fc02::b:0/112");
    }

    #[test]
    fn test_contains() {
        let prefix: IpPrefix = "192.168.2.9/24".parse().unwrap();
        assert!(prefix.contains(&"192.168.2.200".parse().unwrap()));
        assert!(!prefix.contains(&"192.168.3.1".parse().unwrap()));
        assert!(!prefix.contains(&"fc02::2:9".parse().unwrap()));

        let any = IpPrefix::default_route(AddressFamily::V4);
        assert!(any.contains(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
    }
}
