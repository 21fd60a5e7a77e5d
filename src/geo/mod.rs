//! IP2Location-style geo database reader
//!
//! A geo database is a single little-endian binary file:
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ Header (29 bytes)             │  type code, columns, date, table positions
//! ├───────────────────────────────┤
//! │ IPv4 index (optional)         │  65536 × [low, high] row bounds
//! │ IPv4 rows                     │  column_count × 4 bytes each
//! ├───────────────────────────────┤
//! │ IPv6 index (optional)         │  65536 × [low, high] row bounds
//! │ IPv6 rows                     │  column_count × 4 + 12 bytes each
//! ├───────────────────────────────┤
//! │ String area                   │  length byte + bytes
//! └───────────────────────────────┘
//! ```
//!
//! The type code selects which column holds which field (see [`Field`]).
//! Lookups narrow the row range with the index table, then binary search.

mod builder;
mod database;
mod format;
mod search;
mod types;

pub use builder::{GeoImageBuilder, GeoLocation};
pub use database::{GeoDatabase, GeoOptions, GeoReader, ReaderState};
pub use format::{current_year, GeoDate, GeoHeader, HEADER_LEN};
pub use types::{
    Coverage, Field, GeoRecord, IpVersion, Ipv6RowField, LookupFlags, MAX_TYPE_CODE,
};
