//! Spamhaus DROP / DROPv6 line parsers
//!
//! Both lists hold one network per line:
//!
//! ```text
//! 24.233.0.0/19 ; SBL210084
//! 2a06:e480::/29 ; SBL301771
//! ```
//!
//! The reference id is whatever follows the first `L` on the line.
//! Lines of any other shape yield `None` and are skipped by the loader.

use super::entry::{ListKind, Network, RangeEntry, ReferenceId};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Shortest prefix accepted from either list
const MIN_PREFIX: u8 = 8;

/// Split `<addr>/<bits>` off the front of `line`, where `<addr>` is drawn
/// from `addr_chars`. Whitespace may precede the bits.
fn split_cidr(line: &str, addr_chars: fn(char) -> bool) -> Option<(&str, u8)> {
    let addr_end = line.find(|c: char| !addr_chars(c)).unwrap_or(line.len());
    if addr_end == 0 {
        return None;
    }
    let (addr, rest) = line.split_at(addr_end);
    let rest = rest.strip_prefix('/')?.trim_start();

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let bits = rest[..digits_end].parse::<u8>().ok()?;
    Some((addr, bits))
}

fn reference(line: &str) -> ReferenceId {
    let id = line
        .split_once('L')
        .map(|(_, after)| after.split_whitespace().next().unwrap_or(""))
        .unwrap_or("");
    ReferenceId::new(id)
}

/// Parse one `drop.txt` line
pub fn parse_drop_line(line: &str) -> Option<RangeEntry> {
    let (addr, bits) = split_cidr(line, |c| c.is_ascii_digit() || c == '.')?;
    if !(MIN_PREFIX..=32).contains(&bits) {
        return None;
    }
    let network = Network::v4(addr.parse::<Ipv4Addr>().ok()?, bits)?;
    Some(RangeEntry {
        network,
        kind: ListKind::Drop,
        reference: reference(line),
    })
}

/// Parse one `dropv6.txt` line
pub fn parse_dropv6_line(line: &str) -> Option<RangeEntry> {
    let (addr, bits) = split_cidr(line, |c| matches!(c, '0'..='9' | 'a'..='f' | ':'))?;
    if !(MIN_PREFIX..=128).contains(&bits) {
        return None;
    }
    let network = Network::v6(addr.parse::<Ipv6Addr>().ok()?, bits)?;
    Some(RangeEntry {
        network,
        kind: ListKind::DropV6,
        reference: reference(line),
    })
}
