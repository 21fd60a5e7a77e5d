//! Address classification
//!
//! The range matcher only checks globally routable addresses, and the CLI
//! reports "special" addresses instead of looking them up. Both questions
//! go through [`AddressClassifier`] so callers can plug in their own
//! registry data; [`IanaClassifier`] is the built-in default.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Classifies addresses as globally routable or special-purpose
pub trait AddressClassifier {
    /// True if `addr` is a global unicast address worth looking up
    fn is_global(&self, addr: IpAddr) -> bool;

    /// Short description if `addr` belongs to a special-purpose block
    fn special_remark(&self, addr: IpAddr) -> Option<&'static str>;

    /// True if `addr` belongs to a special-purpose block
    fn is_special(&self, addr: IpAddr) -> bool {
        self.special_remark(addr).is_some()
    }
}

/// Classification from the IANA special-purpose and unicast registries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IanaClassifier;

impl AddressClassifier for IanaClassifier {
    fn is_global(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => is_global_v4(v4),
            IpAddr::V6(v6) => is_global_v6(v6),
        }
    }

    fn special_remark(&self, addr: IpAddr) -> Option<&'static str> {
        match addr {
            IpAddr::V4(v4) => special_v4(v4),
            IpAddr::V6(v6) => special_v6(v6),
        }
    }
}

// Not 0/8, 127/8, 10/8, 172.16/12, 192.168/16 or 224/4
fn is_global_v4(addr: Ipv4Addr) -> bool {
    let [a, b, _, _] = addr.octets();
    a != 0
        && a != 127
        && a != 10
        && !(a == 172 && (b & 0xF0) == 16)
        && !(a == 192 && b == 168)
        && !addr.is_multicast()
}

// Every block from 2001::/16 through 2c00::/16 is allocated global unicast
fn is_global_v6(addr: Ipv6Addr) -> bool {
    (0x2001..=0x2C00).contains(&addr.segments()[0])
}

fn special_v4(addr: Ipv4Addr) -> Option<&'static str> {
    let [a, b, _, _] = addr.octets();
    match (a, b) {
        (255, _) => Some("Broadcast"),
        (240..=254, _) => Some("Future use"),
        (169, 254) => Some("Link Local"),
        (100, 64..=127) => Some("Shared Address Space"),
        _ => None,
    }
}

fn special_v6(addr: Ipv6Addr) -> Option<&'static str> {
    let seg = addr.segments();
    let bytes = addr.octets();
    let low96_zero = seg[..5].iter().all(|&s| s == 0);

    if addr.is_loopback() {
        Some("Loopback")
    } else if seg[0] & 0xFFC0 == 0xFE80 {
        Some("Link Local")
    } else if seg[0] & 0xFFC0 == 0xFEC0 {
        Some("Site Local")
    } else if low96_zero && seg[5] == 0 && !(seg[6] == 0 && bytes[14] == 0 && bytes[15] <= 1) {
        Some("IPv4 compatible")
    } else if low96_zero && seg[5] == 0xFFFF {
        Some("IPv4 mapped")
    } else if seg[0] == 0x2002 {
        Some("6to4")
    } else if seg[4] & 0xFDFF == 0 && seg[5] == 0x5EFE {
        Some("ISATAP")
    } else if bytes[0] == 0x20 && bytes[1] == 0x01 && bytes[2] == 0x00 {
        Some("Teredo")
    } else if seg[0] == 0x3FFE && seg[1] == 0x831F {
        Some("Teredo old")
    } else {
        None
    }
}
