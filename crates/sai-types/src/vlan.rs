//! 802.1Q VLAN tag.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IEEE 802.1Q VLAN identifier, 1 through 4094.
///
/// ```
/// use sai_types::VlanId;
///
/// assert_eq!(VlanId::new(10).unwrap().as_u16(), 10);
/// assert!(VlanId::new(4095).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    /// VLAN 1, the switch default.
    pub const DEFAULT: VlanId = VlanId(1);

    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id))
        }
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub const fn is_default(&self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    /// Accepts `10` or `Vlan10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = match s.get(..4) {
            Some(head) if head.eq_ignore_ascii_case("vlan") => &s[4..],
            _ => s,
        };
        let id: u16 = digits.parse().map_err(|_| ParseError::InvalidVlanId(0))?;
        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range() {
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(4094).is_ok());
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(4095).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("20".parse::<VlanId>().unwrap().as_u16(), 20);
        assert_eq!("Vlan10".parse::<VlanId>().unwrap().as_u16(), 10);
        assert!("Vlanx".parse::<VlanId>().is_err());
    }

    #[test]
    fn test_default_vlan() {
        assert!(VlanId::DEFAULT.is_default());
        assert!(!VlanId::new(10).unwrap().is_default());
    }
}
