//! ipenrich - Geolocation and Block List Enrichment for IP Addresses
//!
//! ipenrich answers two questions about an IPv4 or IPv6 address:
//!
//! - **Where is it?** From an IP2Location-style binary database, memory
//!   mapped and optionally shared between processes.
//! - **Is it on a block list?** From the Spamhaus DROP and DROPv6 lists,
//!   merged into one sorted range table.
//!
//! # Quick Start
//!
//! ```rust
//! use ipenrich::blocklist::{parse_drop_line, RangeMatcher};
//! use ipenrich::geo::{GeoDatabase, GeoImageBuilder, GeoLocation};
//! use ipenrich::sorted_list::SortedList;
//!
//! // Geo database (built in memory here; normally `GeoDatabase::open`)
//! let mut builder = GeoImageBuilder::new(3);
//! builder.add_ipv4("0.0.0.0".parse()?, GeoLocation::unknown())?;
//! builder.add_ipv4("24.233.0.0".parse()?, GeoLocation::new("US", "United States", "Texas", "Austin"))?;
//! builder.add_ipv4("24.234.0.0".parse()?, GeoLocation::unknown())?;
//! let geo = GeoDatabase::from_bytes(builder.build()?)?;
//!
//! // Block list
//! let drop: SortedList<_> = ["24.233.0.0/19 ; SBL210084"]
//!     .iter()
//!     .filter_map(|line| parse_drop_line(line))
//!     .collect();
//! let dnsbl = RangeMatcher::from_lists(drop, SortedList::new());
//!
//! let addr: std::net::IpAddr = "24.233.0.21".parse()?;
//! let location = geo.lookup(addr).unwrap();
//! assert_eq!(location.city.as_deref(), Some("Austin"));
//! assert_eq!(dnsbl.is_listed(addr).map(|r| r.as_str()), Some("210084"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐          ┌───────────────┐
//!  address → │ GeoDatabase  │          │ RangeMatcher  │ ← address
//!            │  index table │          │  SortedList   │
//!            │  row search  │          │  containment  │
//!            └──────┬───────┘          └───────┬───────┘
//!                   │ ByteReader               │ file_reader
//!            ┌──────┴───────┐          ┌───────┴───────┐
//!            │ MappedRegion │          │ drop.txt      │
//!            │ (private or  │          │ dropv6.txt    │
//!            │  shared)     │          └───────────────┘
//!            └──────────────┘
//! ```
//!
//! Both structures are immutable once loaded and can be queried from any
//! number of threads.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CIDR block list matching
pub mod blocklist;
/// Bounds-checked reads from mapped bytes
pub mod byte_reader;
pub mod classify;
pub mod config;
/// Error types for enrichment operations
pub mod error;
pub mod file_reader;
pub mod geo;
pub mod mmap;
pub mod sorted_list;

// Re-exports for Rust consumers

pub use crate::blocklist::{RangeEntry, RangeMatcher, ReferenceId};
pub use crate::classify::{AddressClassifier, IanaClassifier};
pub use crate::config::EnrichConfig;
pub use crate::error::{EnrichError, Result};
pub use crate::geo::{GeoDatabase, GeoOptions, GeoReader, GeoRecord, LookupFlags};
pub use crate::sorted_list::SortedList;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library major version
pub const VERSION_MAJOR: u32 = 0;

/// Library minor version
pub const VERSION_MINOR: u32 = 3;

/// Library patch version
pub const VERSION_PATCH: u32 = 0;
