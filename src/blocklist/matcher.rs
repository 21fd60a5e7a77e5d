//! Range matcher over the merged block lists

use super::entry::{RangeEntry, ReferenceId};
use super::parser::{parse_drop_line, parse_dropv6_line};
use crate::classify::{AddressClassifier, IanaClassifier};
use crate::config::DnsblConfig;
use crate::error::{EnrichError, Result};
use crate::file_reader;
use crate::sorted_list::SortedList;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tracing::{debug, info, warn};

/// Sorted, immutable set of listed networks.
///
/// Entries are ordered IPv4 first, then by network address. Lookups
/// binary search that order, so an address covered by several entries
/// reports whichever one the search lands on.
///
/// # Example
///
/// ```
/// use ipenrich::blocklist::{parse_drop_line, RangeMatcher};
/// use ipenrich::sorted_list::SortedList;
///
/// let drop: SortedList<_> = ["24.233.0.0/19 ; SBL210084"]
///     .iter()
///     .filter_map(|line| parse_drop_line(line))
///     .collect();
/// let matcher = RangeMatcher::from_lists(drop, SortedList::new());
///
/// let hit = matcher.is_listed_ipv4("24.233.0.21".parse().unwrap());
/// assert_eq!(hit.map(|r| r.as_str()), Some("210084"));
/// assert!(matcher.is_listed_ipv4("8.8.8.8".parse().unwrap()).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RangeMatcher<C = IanaClassifier> {
    entries: SortedList<RangeEntry>,
    classifier: C,
}

impl Default for RangeMatcher<IanaClassifier> {
    fn default() -> Self {
        Self::from_lists(SortedList::new(), SortedList::new())
    }
}

impl RangeMatcher<IanaClassifier> {
    /// Merge the DROP and DROPv6 entries, sort them and drop duplicates
    pub fn from_lists(drop: SortedList<RangeEntry>, dropv6: SortedList<RangeEntry>) -> Self {
        let mut entries = drop;
        let mut dropv6 = dropv6;
        entries.merge(&mut dropv6);
        entries.sort_by(|a, b| a.network.sort_order(&b.network));

        let removed = entries.dedupe(
            |a, b| a.network.sort_order(&b.network),
            |dup| debug!(network = %dup.network, reference = %dup.reference, "Dropping duplicate entry"),
        );
        if removed > 0 {
            debug!(removed, "Removed duplicate block list entries");
        }

        Self {
            entries,
            classifier: IanaClassifier,
        }
    }

    /// Load the list files named in `config`.
    ///
    /// A disabled config yields an empty matcher.
    pub fn load(config: &DnsblConfig) -> Result<Self> {
        if !config.enable {
            debug!("Block list matching disabled");
            return Ok(Self::default());
        }
        Self::load_files(config.drop_file.as_deref(), config.dropv6_file.as_deref())
    }

    /// Load a DROP and/or DROPv6 file.
    ///
    /// A missing file is logged and treated as an empty list.
    ///
    /// # Errors
    ///
    /// `EnrichError::Io` if a file exists but cannot be read.
    pub fn load_files(drop: Option<&Path>, dropv6: Option<&Path>) -> Result<Self> {
        let drop = load_list(drop, parse_drop_line)?;
        let dropv6 = load_list(dropv6, parse_dropv6_line)?;
        let matcher = Self::from_lists(drop, dropv6);
        info!(entries = matcher.len(), "Loaded block lists");
        Ok(matcher)
    }
}

fn load_list<F>(path: Option<&Path>, parser: F) -> Result<SortedList<RangeEntry>>
where
    F: FnMut(&str) -> Option<RangeEntry>,
{
    let Some(path) = path else {
        return Ok(SortedList::new());
    };
    match file_reader::load_sorted(path, parser) {
        Ok(list) => Ok(list),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Block list file not found");
            Ok(SortedList::new())
        }
        Err(e) => Err(EnrichError::Io(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

impl<C: AddressClassifier> RangeMatcher<C> {
    /// Use `classifier` to decide which addresses are checked
    pub fn with_classifier<D: AddressClassifier>(self, classifier: D) -> RangeMatcher<D> {
        RangeMatcher {
            entries: self.entries,
            classifier,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is listed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in search order
    pub fn entries(&self) -> &[RangeEntry] {
        self.entries.as_slice()
    }

    /// Entry covering `addr`, checking every address
    pub fn find(&self, addr: IpAddr) -> Option<&RangeEntry> {
        self.entries
            .search(&addr, |key, entry| entry.network.position_of(*key))
    }

    /// Entry covering an IPv4 address, checking every address
    pub fn find_ipv4(&self, addr: Ipv4Addr) -> Option<&RangeEntry> {
        self.find(IpAddr::V4(addr))
    }

    /// Entry covering an IPv6 address, checking every address
    pub fn find_ipv6(&self, addr: Ipv6Addr) -> Option<&RangeEntry> {
        self.find(IpAddr::V6(addr))
    }

    /// Reference of the entry covering `addr`.
    ///
    /// Addresses the classifier does not consider global are never listed.
    pub fn is_listed(&self, addr: IpAddr) -> Option<&ReferenceId> {
        if !self.classifier.is_global(addr) {
            return None;
        }
        self.find(addr).map(|entry| &entry.reference)
    }

    /// Reference of the entry covering a global IPv4 address
    pub fn is_listed_ipv4(&self, addr: Ipv4Addr) -> Option<&ReferenceId> {
        self.is_listed(IpAddr::V4(addr))
    }

    /// Reference of the entry covering a global IPv6 address
    pub fn is_listed_ipv6(&self, addr: Ipv6Addr) -> Option<&ReferenceId> {
        self.is_listed(IpAddr::V6(addr))
    }

    /// Write every entry as a table
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{:>4}  SBL{:<6}  {:<20} {:<20} {}",
            "Num", "-ref", "Network", "Mask", "Type"
        )?;
        for (i, entry) in self.entries.iter().enumerate() {
            let reference = if entry.reference.is_empty() {
                "<none>"
            } else {
                entry.reference.as_str()
            };
            writeln!(
                out,
                "{:>4}: SBL{:<6}  {:<20} {:<20} {}",
                i,
                reference,
                entry.network.to_string(),
                entry.network.mask().to_string(),
                entry.kind
            )?;
        }
        Ok(())
    }
}
