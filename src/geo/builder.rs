//! Geo database image writer
//!
//! Produces images in the format read by [`GeoDatabase`](super::GeoDatabase).
//! Only the columns with a defined position for the chosen type code are
//! written, so a type 11 image carries six columns per row.
//!
//! # Example
//!
//! ```
//! use ipenrich::geo::{GeoDatabase, GeoImageBuilder, GeoLocation, LookupFlags};
//!
//! let mut builder = GeoImageBuilder::new(3).with_date(2023, 5, 1);
//! builder.add_ipv4("0.0.0.0".parse()?, GeoLocation::unknown())?;
//! builder.add_ipv4("8.8.8.0".parse()?, GeoLocation::new("US", "United States", "California", "Mountain View"))?;
//! builder.add_ipv4("8.8.9.0".parse()?, GeoLocation::unknown())?;
//!
//! let db = GeoDatabase::from_bytes(builder.build()?)?;
//! let record = db.lookup_ipv4("8.8.8.8".parse()?).unwrap();
//! assert_eq!(record.city.as_deref(), Some("Mountain View"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::format::HEADER_LEN;
use super::types::{Field, MAX_TYPE_CODE};
use crate::error::{EnrichError, Result};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Offset of the first table; the header is padded up to this
const TABLES_START: usize = 64;

/// Zero bytes appended after the string area so the trailing sentinel row
/// can always be followed by a full-width read
const TAIL_PADDING: usize = 64;

/// Number of buckets in an index table (one per top-16-bit value)
const INDEX_BUCKETS: usize = 1 << 16;

/// Location fields for one range.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    /// Two letter country code; anything but two bytes makes the row "not found"
    pub country_short: String,
    /// Full country name
    pub country_long: String,
    /// Region name
    pub region: String,
    /// City name
    pub city: String,
    /// Latitude in degrees
    pub latitude: f32,
    /// Longitude in degrees
    pub longitude: f32,
}

impl GeoLocation {
    /// Location without coordinates
    pub fn new(country_short: &str, country_long: &str, region: &str, city: &str) -> Self {
        Self {
            country_short: country_short.to_string(),
            country_long: country_long.to_string(),
            region: region.to_string(),
            city: city.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Set the coordinates
    pub fn with_position(mut self, latitude: f32, longitude: f32) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// Placeholder used for unallocated ranges ("-")
    pub fn unknown() -> Self {
        Self::new("-", "-", "-", "-")
    }
}

/// Builder for geo database images
pub struct GeoImageBuilder {
    type_code: u8,
    date: (u16, u8, u8),
    with_index: bool,
    ipv4: Vec<(u32, GeoLocation)>,
    ipv6: Vec<(u128, GeoLocation)>,
}

impl GeoImageBuilder {
    /// Create a builder for `type_code` (1-24)
    pub fn new(type_code: u8) -> Self {
        Self {
            type_code,
            date: (2020, 1, 1),
            with_index: false,
            ipv4: Vec::new(),
            ipv6: Vec::new(),
        }
    }

    /// Set the build date written to the header (year 2000-2255)
    pub fn with_date(mut self, year: u16, month: u8, day: u8) -> Self {
        self.date = (year, month, day);
        self
    }

    /// Write index tables in front of both row tables
    pub fn with_index(mut self, with_index: bool) -> Self {
        self.with_index = with_index;
        self
    }

    /// Add an IPv4 range starting at `start`. It ends where the next range starts.
    pub fn add_ipv4(&mut self, start: Ipv4Addr, location: GeoLocation) -> Result<()> {
        self.check_type()?;
        self.ipv4.push((u32::from(start), location));
        Ok(())
    }

    /// Add an IPv6 range starting at `start`. It ends where the next range starts.
    pub fn add_ipv6(&mut self, start: Ipv6Addr, location: GeoLocation) -> Result<()> {
        self.check_type()?;
        self.ipv6.push((u128::from(start), location));
        Ok(())
    }

    fn check_type(&self) -> Result<()> {
        if self.type_code == 0 || self.type_code > MAX_TYPE_CODE {
            return Err(EnrichError::Config(format!(
                "Unsupported geo database type {}",
                self.type_code
            )));
        }
        Ok(())
    }

    fn column_count(&self) -> u8 {
        [
            Field::Country,
            Field::Region,
            Field::City,
            Field::Latitude,
            Field::Longitude,
        ]
        .iter()
        .filter_map(|f| f.column(self.type_code))
        .max()
        .unwrap_or(1)
    }

    /// Serialize the image
    pub fn build(&self) -> Result<Vec<u8>> {
        self.check_type()?;

        let columns = self.column_count() as usize;
        let v4_width = columns * 4;
        let v6_width = columns * 4 + 12;

        let mut ipv4 = self.ipv4.clone();
        ipv4.sort_by_key(|(start, _)| *start);
        ipv4.dedup_by_key(|(start, _)| *start);
        let mut ipv6 = self.ipv6.clone();
        ipv6.sort_by_key(|(start, _)| *start);
        ipv6.dedup_by_key(|(start, _)| *start);

        // Table layout, each table followed by one sentinel row
        let index_len = if self.with_index { INDEX_BUCKETS * 8 } else { 0 };
        let v4_index = TABLES_START;
        let v4_base = v4_index + index_len;
        let v4_len = if ipv4.is_empty() { 0 } else { (ipv4.len() + 1) * v4_width };
        let v6_index = v4_base + v4_len;
        let v6_base = v6_index + index_len;
        let v6_len = if ipv6.is_empty() { 0 } else { (ipv6.len() + 1) * v6_width };
        let strings_start = v6_base + v6_len;

        let mut strings = StringArea::new(strings_start);
        let v4_cells: Vec<Vec<u32>> = ipv4
            .iter()
            .map(|(_, loc)| self.row_cells(loc, columns, &mut strings))
            .collect();
        let v6_cells: Vec<Vec<u32>> = ipv6
            .iter()
            .map(|(_, loc)| self.row_cells(loc, columns, &mut strings))
            .collect();

        let total = strings_start + strings.bytes.len() + TAIL_PADDING;
        if total > u32::MAX as usize {
            return Err(EnrichError::Config(format!(
                "Geo image too large: {} bytes",
                total
            )));
        }

        let mut out = vec![0u8; total];

        // Header
        out[0] = self.type_code;
        out[1] = columns as u8;
        out[2] = self.date.0.saturating_sub(2000).min(255) as u8;
        out[3] = self.date.1;
        out[4] = self.date.2;
        let pos = |offset: usize, present: bool| if present { offset as u32 + 1 } else { 0 };
        put_u32(&mut out, 5, ipv4.len() as u32);
        put_u32(&mut out, 9, pos(v4_base, !ipv4.is_empty()));
        put_u32(&mut out, 13, ipv6.len() as u32);
        put_u32(&mut out, 17, pos(v6_base, !ipv6.is_empty()));
        put_u32(&mut out, 21, pos(v4_index, self.with_index && !ipv4.is_empty()));
        put_u32(&mut out, 25, pos(v6_index, self.with_index && !ipv6.is_empty()));
        debug_assert!(HEADER_LEN <= TABLES_START);

        // IPv4
        if !ipv4.is_empty() {
            let starts: Vec<u32> = ipv4.iter().map(|(s, _)| *s).collect();
            for (i, (start, cells)) in starts.iter().zip(&v4_cells).enumerate() {
                let row = v4_base + i * v4_width;
                put_u32(&mut out, row, *start);
                for (c, value) in cells.iter().enumerate() {
                    put_u32(&mut out, row + 4 * (c + 1), *value);
                }
            }
            put_u32(&mut out, v4_base + ipv4.len() * v4_width, u32::MAX);

            if self.with_index {
                for bucket in 0..INDEX_BUCKETS {
                    let first = (bucket as u32) << 16;
                    let last = first | 0xFFFF;
                    let entry = v4_index + bucket * 8;
                    put_u32(&mut out, entry, row_for(&starts, first) as u32);
                    put_u32(&mut out, entry + 4, row_for(&starts, last) as u32);
                }
            }
        }

        // IPv6
        if !ipv6.is_empty() {
            let starts: Vec<u128> = ipv6.iter().map(|(s, _)| *s).collect();
            for (i, (start, cells)) in starts.iter().zip(&v6_cells).enumerate() {
                let row = v6_base + i * v6_width;
                out[row..row + 16].copy_from_slice(&start.to_le_bytes());
                for (c, value) in cells.iter().enumerate() {
                    put_u32(&mut out, row + 16 + 4 * c, *value);
                }
            }
            let sentinel = v6_base + ipv6.len() * v6_width;
            out[sentinel..sentinel + 16].copy_from_slice(&u128::MAX.to_le_bytes());

            if self.with_index {
                for bucket in 0..INDEX_BUCKETS {
                    let first = (bucket as u128) << 112;
                    let last = first | ((1u128 << 112) - 1);
                    let entry = v6_index + bucket * 8;
                    put_u32(&mut out, entry, row_for(&starts, first) as u32);
                    put_u32(&mut out, entry + 4, row_for(&starts, last) as u32);
                }
            }
        }

        out[strings_start..strings_start + strings.bytes.len()].copy_from_slice(&strings.bytes);
        Ok(out)
    }

    /// Values of columns 2..=columns for one row
    fn row_cells(&self, loc: &GeoLocation, columns: usize, strings: &mut StringArea) -> Vec<u32> {
        let mut cells = vec![0u32; columns.saturating_sub(1)];
        let mut set = |field: Field, value: u32| {
            if let Some(col) = field.column(self.type_code) {
                cells[col as usize - 2] = value;
            }
        };
        set(
            Field::Country,
            strings.country(&loc.country_short, &loc.country_long),
        );
        set(Field::Region, strings.text(&loc.region));
        set(Field::City, strings.text(&loc.city));
        set(Field::Latitude, loc.latitude.to_bits());
        set(Field::Longitude, loc.longitude.to_bits());
        cells
    }
}

/// Row whose range contains `addr`, or 0 if `addr` precedes every row
fn row_for<T: Ord + Copy>(starts: &[T], addr: T) -> usize {
    starts.partition_point(|s| *s <= addr).saturating_sub(1)
}

fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Deduplicated length-prefixed strings, addressed by 0-based file offset
struct StringArea {
    start: usize,
    bytes: Vec<u8>,
    offsets: HashMap<(String, Option<String>), u32>,
}

impl StringArea {
    fn new(start: usize) -> Self {
        Self {
            start,
            bytes: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    fn push(&mut self, s: &str) {
        let raw = &s.as_bytes()[..s.len().min(255)];
        self.bytes.push(raw.len() as u8);
        self.bytes.extend_from_slice(raw);
    }

    fn text(&mut self, s: &str) -> u32 {
        let key = (s.to_string(), None);
        if let Some(&offset) = self.offsets.get(&key) {
            return offset;
        }
        let offset = (self.start + self.bytes.len()) as u32;
        self.push(s);
        self.offsets.insert(key, offset);
        offset
    }

    /// Short code immediately followed by the long name
    fn country(&mut self, short: &str, long: &str) -> u32 {
        let key = (short.to_string(), Some(long.to_string()));
        if let Some(&offset) = self.offsets.get(&key) {
            return offset;
        }
        let offset = (self.start + self.bytes.len()) as u32;
        self.push(short);
        self.push(long);
        self.offsets.insert(key, offset);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::format::GeoHeader;

    #[test]
    fn test_header_fields() {
        let mut builder = GeoImageBuilder::new(5).with_date(2022, 7, 15);
        builder
            .add_ipv4(Ipv4Addr::new(0, 0, 0, 0), GeoLocation::unknown())
            .unwrap();
        let image = builder.build().unwrap();
        let header = GeoHeader::parse(&image).unwrap();
        assert_eq!(header.type_code, 5);
        assert_eq!(header.column_count, 6);
        assert_eq!(header.date.to_string(), "2022-07-15");
        assert_eq!(header.ipv4_row_count, 1);
        assert_eq!(header.ipv4_base as usize, TABLES_START + 1);
        assert_eq!(header.ipv6_row_count, 0);
        assert_eq!(header.ipv4_index, 0);
    }

    #[test]
    fn test_column_counts() {
        assert_eq!(GeoImageBuilder::new(1).column_count(), 2);
        assert_eq!(GeoImageBuilder::new(3).column_count(), 4);
        assert_eq!(GeoImageBuilder::new(7).column_count(), 4);
        assert_eq!(GeoImageBuilder::new(11).column_count(), 6);
    }

    #[test]
    fn test_invalid_type() {
        let mut builder = GeoImageBuilder::new(0);
        assert!(builder
            .add_ipv4(Ipv4Addr::LOCALHOST, GeoLocation::unknown())
            .is_err());
        assert!(GeoImageBuilder::new(25).build().is_err());
    }

    #[test]
    fn test_row_for() {
        let starts = [0u32, 100, 200];
        assert_eq!(row_for(&starts, 0), 0);
        assert_eq!(row_for(&starts, 99), 0);
        assert_eq!(row_for(&starts, 100), 1);
        assert_eq!(row_for(&starts, 5000), 2);
        assert_eq!(row_for(&[10u32], 5), 0);
    }

    #[test]
    fn test_string_dedup() {
        let mut area = StringArea::new(1000);
        let a = area.country("US", "United States");
        let b = area.country("US", "United States");
        let c = area.text("US");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, 1000);
        assert_eq!(&area.bytes[..3], &[2, b'U', b'S']);
        assert_eq!(area.bytes[3], 13);
    }
}
