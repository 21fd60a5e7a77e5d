//! Block list entries

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Longest reference id kept; longer ids are truncated
pub const MAX_REFERENCE_LEN: usize = 9;

/// A CIDR network with its precomputed mask.
///
/// The network address is kept as written in the list, host bits
/// included; containment is checked against `network & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// IPv4 network
    V4 {
        /// Network address
        network: Ipv4Addr,
        /// Prefix length, 0-32
        prefix: u8,
        /// Subnet mask
        mask: u32,
    },
    /// IPv6 network
    V6 {
        /// Network address
        network: Ipv6Addr,
        /// Prefix length, 0-128
        prefix: u8,
        /// Subnet mask
        mask: u128,
    },
}

fn mask_v4(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0)
}

fn mask_v6(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - prefix as u32).unwrap_or(0)
}

impl Network {
    /// IPv4 network, `None` if `prefix > 32`
    pub fn v4(network: Ipv4Addr, prefix: u8) -> Option<Self> {
        (prefix <= 32).then(|| Network::V4 {
            network,
            prefix,
            mask: mask_v4(prefix),
        })
    }

    /// IPv6 network, `None` if `prefix > 128`
    pub fn v6(network: Ipv6Addr, prefix: u8) -> Option<Self> {
        (prefix <= 128).then(|| Network::V6 {
            network,
            prefix,
            mask: mask_v6(prefix),
        })
    }

    /// True for IPv4 networks
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Network::V4 { .. })
    }

    /// Network address as written
    pub fn address(&self) -> IpAddr {
        match *self {
            Network::V4 { network, .. } => IpAddr::V4(network),
            Network::V6 { network, .. } => IpAddr::V6(network),
        }
    }

    /// Prefix length
    pub fn prefix(&self) -> u8 {
        match *self {
            Network::V4 { prefix, .. } | Network::V6 { prefix, .. } => prefix,
        }
    }

    /// Subnet mask as an address
    pub fn mask(&self) -> IpAddr {
        match *self {
            Network::V4 { mask, .. } => IpAddr::V4(Ipv4Addr::from(mask)),
            Network::V6 { mask, .. } => IpAddr::V6(Ipv6Addr::from(mask)),
        }
    }

    /// Where `addr` falls relative to this network's range.
    ///
    /// Addresses of the other family sort as if IPv4 came before IPv6.
    pub fn position_of(&self, addr: IpAddr) -> Ordering {
        match (*self, addr) {
            (Network::V4 { network, mask, .. }, IpAddr::V4(addr)) => {
                let first = u32::from(network) & mask;
                range_position(u32::from(addr), first, first | !mask)
            }
            (Network::V6 { network, mask, .. }, IpAddr::V6(addr)) => {
                let first = u128::from(network) & mask;
                range_position(u128::from(addr), first, first | !mask)
            }
            (Network::V6 { .. }, IpAddr::V4(_)) => Ordering::Less,
            (Network::V4 { .. }, IpAddr::V6(_)) => Ordering::Greater,
        }
    }

    /// True if `addr` lies inside this network
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.position_of(addr) == Ordering::Equal
    }

    /// Family first (IPv4 before IPv6), then address, then prefix length
    pub fn sort_order(&self, other: &Network) -> Ordering {
        match (*self, *other) {
            (Network::V4 { network: a, prefix: pa, .. }, Network::V4 { network: b, prefix: pb, .. }) => {
                a.cmp(&b).then(pa.cmp(&pb))
            }
            (Network::V6 { network: a, prefix: pa, .. }, Network::V6 { network: b, prefix: pb, .. }) => {
                a.cmp(&b).then(pa.cmp(&pb))
            }
            (Network::V4 { .. }, Network::V6 { .. }) => Ordering::Less,
            (Network::V6 { .. }, Network::V4 { .. }) => Ordering::Greater,
        }
    }
}

fn range_position<T: Ord>(addr: T, first: T, last: T) -> Ordering {
    if addr < first {
        Ordering::Less
    } else if addr > last {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), self.prefix())
    }
}

/// Which list an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ListKind {
    /// Spamhaus DROP (IPv4)
    Drop,
    /// Spamhaus DROPv6
    DropV6,
}

impl ListKind {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            ListKind::Drop => "DROP",
            ListKind::DropV6 => "DROPv6",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vendor advisory id, e.g. `210084` for `SBL210084`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Create an id, keeping at most the first nine characters
    pub fn new(id: &str) -> Self {
        ReferenceId(id.chars().take(MAX_REFERENCE_LEN).collect())
    }

    /// The id text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the list line carried no id
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listed network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    /// The listed network
    pub network: Network,
    /// Source list
    pub kind: ListKind,
    /// Advisory reference
    pub reference: ReferenceId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str, prefix: u8) -> Network {
        Network::v4(s.parse().unwrap(), prefix).unwrap()
    }

    fn v6(s: &str, prefix: u8) -> Network {
        Network::v6(s.parse().unwrap(), prefix).unwrap()
    }

    #[test]
    fn test_masks() {
        assert_eq!(v4("24.233.0.0", 19).mask().to_string(), "255.255.224.0");
        assert_eq!(v4("0.0.0.0", 0).mask().to_string(), "0.0.0.0");
        assert_eq!(v4("1.2.3.4", 32).mask().to_string(), "255.255.255.255");
        assert_eq!(v6("2a06:e480::", 29).mask().to_string(), "ffff:fff8::");
        assert_eq!(v6("::", 0).mask().to_string(), "::");
        assert!(Network::v4(Ipv4Addr::UNSPECIFIED, 33).is_none());
        assert!(Network::v6(Ipv6Addr::UNSPECIFIED, 129).is_none());
    }

    #[test]
    fn test_position_of() {
        let net = v4("24.233.0.0", 19);
        assert_eq!(net.position_of("24.232.255.255".parse().unwrap()), Ordering::Less);
        assert_eq!(net.position_of("24.233.0.21".parse().unwrap()), Ordering::Equal);
        assert_eq!(net.position_of("24.233.31.255".parse().unwrap()), Ordering::Equal);
        assert_eq!(net.position_of("24.233.32.1".parse().unwrap()), Ordering::Greater);
    }

    #[test]
    fn test_host_bits_ignored() {
        let net = v4("10.0.0.77", 24);
        assert!(net.contains("10.0.0.1".parse().unwrap()));
        assert_eq!(net.to_string(), "10.0.0.77/24");
    }

    #[test]
    fn test_family_bias() {
        let net4 = v4("1.0.0.0", 8);
        let net6 = v6("2001:db8::", 32);
        assert_eq!(net6.position_of("1.1.1.1".parse().unwrap()), Ordering::Less);
        assert_eq!(net4.position_of("2001:db8::1".parse().unwrap()), Ordering::Greater);
        assert_eq!(net4.sort_order(&net6), Ordering::Less);
        assert_eq!(net6.sort_order(&net4), Ordering::Greater);
    }

    #[test]
    fn test_reference_truncated() {
        assert_eq!(ReferenceId::new("210084").as_str(), "210084");
        assert_eq!(ReferenceId::new("12345678901").as_str(), "123456789");
    }
}
