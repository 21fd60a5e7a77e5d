//! Index-narrowed binary search over the row tables
//!
//! Each row starts with the first address of its range; the range ends
//! where the next row starts. A row therefore matches when
//! `row.start <= addr < next.start`, so the table always carries one
//! trailing row whose start acts as the upper bound of the last range.
//!
//! ```text
//! IPv4 row:  [start u32][col 2 u32][col 3 u32]...           column_count * 4 bytes
//! IPv6 row:  [start u128         ][col 2 u32][col 3 u32]... column_count * 4 + 12 bytes
//! ```
//!
//! The optional index tables hold 65536 `[low, high]` u32 pairs, one per
//! value of the top 16 address bits, bounding the rows to search.

use super::format::GeoHeader;
use super::types::{
    Field, GeoRecord, LookupFlags, CITY_MAX, COUNTRY_LONG_MAX, COUNTRY_SHORT_MAX, REGION_MAX,
};
use crate::byte_reader::ByteReader;
use tracing::trace;

/// Bytes per index entry (two u32 row bounds)
const INDEX_ENTRY_SIZE: u64 = 8;

/// The long country name follows the short code's length byte and two characters
const COUNTRY_LONG_SKIP: u64 = 3;

/// Row search over a decoded database image
pub(crate) struct RowTable<'a> {
    reader: ByteReader<'a>,
    header: &'a GeoHeader,
}

impl<'a> RowTable<'a> {
    pub(crate) fn new(reader: ByteReader<'a>, header: &'a GeoHeader) -> Self {
        Self { reader, header }
    }

    fn ipv4_row_width(&self) -> u64 {
        self.header.column_count as u64 * 4
    }

    fn ipv6_row_width(&self) -> u64 {
        self.header.column_count as u64 * 4 + 12
    }

    fn index_bounds(&self, index_pos: u32, bucket: u64) -> (u64, u64) {
        let pos = index_pos as u64 + bucket * INDEX_ENTRY_SIZE;
        (
            self.reader.read_u32_le(pos) as u64,
            self.reader.read_u32_le(pos + 4) as u64,
        )
    }

    /// Locate the IPv4 row covering `addr`, returning its 1-based position
    pub(crate) fn find_ipv4_row(&self, addr: u32) -> Option<u64> {
        if self.header.ipv4_row_count == 0 {
            return None;
        }
        let addr = if addr == u32::MAX { addr - 1 } else { addr };

        let (mut low, mut high) = if self.header.ipv4_index > 0 {
            self.index_bounds(self.header.ipv4_index, (addr >> 16) as u64)
        } else {
            (0, self.header.ipv4_row_count as u64)
        };

        let base = self.header.ipv4_base as u64;
        let width = self.ipv4_row_width();
        let mut loops = 0u32;

        while low <= high {
            let mid = low + (high - low) / 2;
            let row = base + mid * width;
            let from = self.reader.read_u32_le(row);
            let to = self.reader.read_u32_le(row + width);
            loops += 1;

            if addr >= from && addr < to {
                trace!(row = mid, loops, "IPv4 row found");
                return Some(row);
            }
            if addr < from {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }

        trace!(loops, "IPv4 address not in any row");
        None
    }

    /// Locate the IPv6 row covering `addr`, returning the 1-based position
    /// of its first column after the 128-bit start address
    pub(crate) fn find_ipv6_row(&self, addr: u128) -> Option<u64> {
        if self.header.ipv6_row_count == 0 {
            return None;
        }

        let (mut low, mut high) = if self.header.ipv6_index > 0 {
            self.index_bounds(self.header.ipv6_index, (addr >> 112) as u64)
        } else {
            (0, self.header.ipv6_row_count as u64)
        };

        let base = self.header.ipv6_base as u64;
        let width = self.ipv6_row_width();
        let mut loops = 0u32;

        while low <= high {
            let mid = low + (high - low) / 2;
            let row = base + mid * width;
            let from = self.reader.read_u128_le(row);
            let to = self.reader.read_u128_le(row + width);
            loops += 1;

            if addr >= from && addr < to {
                trace!(row = mid, loops, "IPv6 row found");
                // Shift so that column N sits at `row + 4 * (N - 1)` as for IPv4
                return Some(row + 12);
            }
            if addr < from {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }

        trace!(loops, "IPv6 address not in any row");
        None
    }

    fn column_value(&self, row: u64, column: u8) -> u32 {
        self.reader.read_u32_le(row + 4 * (column as u64 - 1))
    }

    fn column_string(&self, row: u64, column: u8, skip: u64, max_len: usize) -> String {
        let offset = self.column_value(row, column) as u64 + skip;
        self.reader.read_pascal_string(offset, max_len)
    }

    /// Extract the fields requested by `flags` from the row at `row`.
    ///
    /// Returns `None` unless the row carries a two-character country code,
    /// whether or not the code itself was requested.
    pub(crate) fn read_record(&self, row: u64, flags: LookupFlags) -> Option<GeoRecord> {
        let type_code = self.header.type_code;
        let country = Field::Country.column(type_code)?;

        let country_short = self.column_string(row, country, 0, COUNTRY_SHORT_MAX);
        if country_short.chars().count() < 2 {
            return None;
        }

        let mut record = GeoRecord::default();
        if flags.contains(LookupFlags::COUNTRY_SHORT) {
            record.country_short = Some(country_short);
        }
        if flags.contains(LookupFlags::COUNTRY_LONG) {
            record.country_long =
                Some(self.column_string(row, country, COUNTRY_LONG_SKIP, COUNTRY_LONG_MAX));
        }
        if flags.contains(LookupFlags::REGION) {
            record.region = Field::Region
                .column(type_code)
                .map(|col| self.column_string(row, col, 0, REGION_MAX));
        }
        if flags.contains(LookupFlags::CITY) {
            record.city = Field::City
                .column(type_code)
                .map(|col| self.column_string(row, col, 0, CITY_MAX));
        }
        if flags.contains(LookupFlags::LATITUDE) {
            record.latitude = Field::Latitude
                .column(type_code)
                .map(|col| self.reader.read_f32(row + 4 * (col as u64 - 1)));
        }
        if flags.contains(LookupFlags::LONGITUDE) {
            record.longitude = Field::Longitude
                .column(type_code)
                .map(|col| self.reader.read_f32(row + 4 * (col as u64 - 1)));
        }

        Some(record)
    }
}
