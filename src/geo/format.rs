//! Geo database header parsing
//!
//! The header is a packed little-endian block at the start of the file.
//! Positions below are the 1-based offsets used throughout the format:
//!
//! ```text
//!  @1  u8   type code          @6  u32  IPv4 row count
//!  @2  u8   column count       @10 u32  IPv4 row table position
//!  @3  u8   year (- 2000)      @14 u32  IPv6 row count / version tag
//!  @4  u8   month              @18 u32  IPv6 row table position
//!  @5  u8   day                @22 u32  IPv4 index table position (0 = none)
//!                              @26 u32  IPv6 index table position (0 = none)
//! ```

use super::types::{Coverage, IpVersion, Ipv6RowField};
use crate::error::{EnrichError, Result};
use serde::Serialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 29;

/// On-disk header layout (29 bytes, no padding)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
struct RawHeader {
    type_code: u8,
    column_count: u8,
    year: u8,
    month: u8,
    day: u8,
    ipv4_count: U32,
    ipv4_base: U32,
    ipv6_count: U32,
    ipv6_base: U32,
    ipv4_index: U32,
    ipv6_index: U32,
}

/// Date embedded in the database header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GeoDate {
    /// Full year
    pub year: u16,
    /// Month, 1-12
    pub month: u8,
    /// Day of month
    pub day: u8,
}

impl GeoDate {
    /// True if the fields form a real calendar date no later than `current_year`
    pub fn is_plausible(&self, current_year: u16) -> bool {
        if !(1..=12).contains(&self.month) || self.day == 0 {
            return false;
        }
        self.day <= days_in_month(self.year, self.month) && self.year <= current_year
    }
}

impl fmt::Display for GeoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 0,
    }
}

/// Current UTC year from the system clock
pub fn current_year() -> u16 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    year_from_days((secs / 86_400) as i64)
}

// Civil-from-days (proleptic Gregorian), returning only the year
fn year_from_days(days: i64) -> u16 {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    year.clamp(0, u16::MAX as i64) as u16
}

/// Decoded geo database header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeoHeader {
    /// Format type code selecting the column layout
    pub type_code: u8,
    /// Columns per row (the first column is the range start)
    pub column_count: u8,
    /// Build date of the database
    pub date: GeoDate,
    /// Number of IPv4 rows
    pub ipv4_row_count: u32,
    /// 1-based position of the IPv4 row table
    pub ipv4_base: u32,
    /// Raw value of the IPv6 row count field
    pub ipv6_row_count: u32,
    /// 1-based position of the IPv6 row table
    pub ipv6_base: u32,
    /// 1-based position of the IPv4 index table, 0 if absent
    pub ipv4_index: u32,
    /// 1-based position of the IPv6 index table, 0 if absent
    pub ipv6_index: u32,
}

impl GeoHeader {
    /// Decode the header at the start of `data`.
    ///
    /// Only the layout is decoded here; see [`GeoHeader::validate`] for the
    /// plausibility check.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (raw, _) = RawHeader::read_from_prefix(data).map_err(|_| {
            EnrichError::CorruptHeader(format!(
                "File too small: {} bytes (need at least {})",
                data.len(),
                HEADER_LEN
            ))
        })?;

        Ok(GeoHeader {
            type_code: raw.type_code,
            column_count: raw.column_count,
            date: GeoDate {
                year: 2000 + raw.year as u16,
                month: raw.month,
                day: raw.day,
            },
            ipv4_row_count: raw.ipv4_count.get(),
            ipv4_base: raw.ipv4_base.get(),
            ipv6_row_count: raw.ipv6_count.get(),
            ipv6_base: raw.ipv6_base.get(),
            ipv4_index: raw.ipv4_index.get(),
            ipv6_index: raw.ipv6_index.get(),
        })
    }

    /// Reject a header whose date is not a real date or lies in a future year
    pub fn validate(&self, current_year: u16) -> Result<()> {
        if self.date.is_plausible(current_year) {
            Ok(())
        } else {
            Err(EnrichError::CorruptHeader(format!(
                "implausible database date {}-{}-{}",
                self.date.year, self.date.month, self.date.day
            )))
        }
    }

    /// How the position-14 field should be read
    pub fn ipv6_row_field(&self) -> Ipv6RowField {
        Ipv6RowField::from_raw(self.ipv6_row_count)
    }

    /// Address families present in the database
    pub fn coverage(&self) -> Coverage {
        if self.ipv4_row_count == 0 {
            return Coverage::Ipv6Only;
        }
        match self.ipv6_row_field() {
            Ipv6RowField::RowCount(_) => Coverage::Dual,
            Ipv6RowField::VersionTag(IpVersion::V6) => Coverage::Dual,
            Ipv6RowField::VersionTag(IpVersion::V4) => Coverage::Ipv4Only,
        }
    }
}
