//! CIDR block list matching (Spamhaus DROP / DROPv6)
//!
//! The two lists are parsed into [`RangeEntry`] values, merged into one
//! [`SortedList`](crate::sorted_list::SortedList) ordered IPv4 first and
//! then by network address, and searched with a containment comparator.
//! [`RefreshPolicy`] decides when a list file should be fetched again.

mod entry;
mod matcher;
mod parser;
mod refresh;

pub use entry::{ListKind, Network, RangeEntry, ReferenceId, MAX_REFERENCE_LEN};
pub use matcher::RangeMatcher;
pub use parser::{parse_drop_line, parse_dropv6_line};
pub use refresh::{RefreshPolicy, RefreshReason, DEFAULT_SLACK};
