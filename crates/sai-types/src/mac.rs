//! Ethernet MAC address.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// ```
/// use sai_types::MacAddress;
///
/// let mac: MacAddress = "00:77:66:55:44:00".parse().unwrap();
/// assert_eq!(mac.with_suffix(0x0105).to_string(), "00:77:66:55:01:05");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Replaces the two low-order octets with `suffix` (big-endian).
    ///
    /// Used to derive a distinct address per simulated device from a
    /// per-role base address.
    pub const fn with_suffix(&self, suffix: u16) -> Self {
        let mut bytes = self.0;
        bytes[4] = (suffix >> 8) as u8;
        bytes[5] = (suffix & 0xff) as u8;
        MacAddress(bytes)
    }

    /// Least significant bit of the first octet set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub const fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };
        let invalid = || ParseError::InvalidMacAddress(s.to_string());

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(separator) {
            if count == 6 || part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != 6 {
            return Err(invalid());
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_both_separators() {
        let colon: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let hyphen: MacAddress = "00-11-22-33-44-55".parse().unwrap();
        assert_eq!(colon, hyphen);
        assert_eq!(colon.octets(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_with_suffix() {
        let base = MacAddress::new([0x00, 0x99, 0x66, 0x55, 0x44, 0x00]);
        let mac = base.with_suffix(0x0a14);
        assert_eq!(mac.to_string(), "00:99:66:55:0a:14");
        assert!(mac.is_unicast());
    }

    #[test]
    fn test_special_addresses() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::BROADCAST.is_multicast());
        assert!(MacAddress::ZERO.is_zero());
    }

    #[test]
    fn test_invalid_format() {
        assert!("invalid".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddress>().is_err());
        assert!("gg:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!("001:1:22:33:44:55".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let mac: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        let s: String = mac.into();
        assert_eq!(MacAddress::try_from(s).unwrap(), mac);
    }
}
