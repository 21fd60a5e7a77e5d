//! Geo database type definitions
//!
//! Lookup flags, the per-type column position tables and the record
//! returned from a lookup.

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Fields to extract from a matching row.
    ///
    /// # Example
    ///
    /// ```
    /// use ipenrich::geo::LookupFlags;
    ///
    /// let flags = LookupFlags::default() | LookupFlags::POSITION;
    /// assert!(flags.contains(LookupFlags::LATITUDE | LookupFlags::CITY));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LookupFlags: u32 {
        /// Two letter ISO-3166 country code
        const COUNTRY_SHORT = 0x0001;
        /// Full country name
        const COUNTRY_LONG  = 0x0002;
        /// Region within the country
        const REGION        = 0x0004;
        /// City within the country
        const CITY          = 0x0008;
        /// Latitude of the location
        const LATITUDE      = 0x0020;
        /// Longitude of the location
        const LONGITUDE     = 0x0040;

        /// Latitude and longitude together
        const POSITION = Self::LATITUDE.bits() | Self::LONGITUDE.bits();
    }
}

impl Default for LookupFlags {
    /// Country code, region and city. The long country name is usually
    /// derived from the code by the caller, so it is not read by default.
    fn default() -> Self {
        LookupFlags::COUNTRY_SHORT | LookupFlags::REGION | LookupFlags::CITY
    }
}

/// Highest type code with a defined column layout
pub const MAX_TYPE_CODE: u8 = 24;

// Column number (1-based) holding each field, indexed by type code.
// Slot 0 is never a valid type code. A 0 entry means the type lacks the field.
const COUNTRY_POSITION: [u8; 25] = [
    0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
];
const REGION_POSITION: [u8; 25] = [
    0, 0, 0, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3,
];
const CITY_POSITION: [u8; 25] = [
    0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
];
const LATITUDE_POSITION: [u8; 25] = [
    0, 0, 0, 0, 0, 5, 5, 0, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
];
const LONGITUDE_POSITION: [u8; 25] = [
    0, 0, 0, 0, 0, 6, 6, 0, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
];

/// A semantic field stored in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Country (short code and long name share one string pointer)
    Country,
    /// Region name
    Region,
    /// City name
    City,
    /// Latitude float
    Latitude,
    /// Longitude float
    Longitude,
}

impl Field {
    /// 1-based column holding this field for `type_code`, or `None`
    pub fn column(self, type_code: u8) -> Option<u8> {
        let table = match self {
            Field::Country => &COUNTRY_POSITION,
            Field::Region => &REGION_POSITION,
            Field::City => &CITY_POSITION,
            Field::Latitude => &LATITUDE_POSITION,
            Field::Longitude => &LONGITUDE_POSITION,
        };
        match table.get(type_code as usize) {
            Some(&0) | None => None,
            Some(&col) => Some(col),
        }
    }
}

/// String caps, in bytes, for the text fields
pub(crate) const COUNTRY_SHORT_MAX: usize = 2;
pub(crate) const COUNTRY_LONG_MAX: usize = 29;
pub(crate) const REGION_MAX: usize = 39;
pub(crate) const CITY_MAX: usize = 39;

/// Location data for one address.
///
/// A field is `Some` only if it was requested and the database type
/// carries it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoRecord {
    /// Two letter country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_short: Option<String>,
    /// Full country name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_long: Option<String>,
    /// Region name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// City name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Latitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f32>,
    /// Longitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f32>,
}

/// Which address families a database covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coverage {
    /// Only IPv4 rows
    Ipv4Only,
    /// Only IPv6 rows
    Ipv6Only,
    /// Both IPv4 and IPv6 rows
    Dual,
}

/// IP version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpVersion {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

/// Interpretation of the header field at position 14.
///
/// Older database generations stored an IP version tag (0 = IPv4,
/// 1 = IPv6) there; newer ones store the IPv6 row count. The raw value is
/// always used as the IPv6 row bound during lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ipv6RowField {
    /// Value 0 or 1: read as a version tag
    VersionTag(IpVersion),
    /// Any other value: number of IPv6 rows
    RowCount(u32),
}

impl Ipv6RowField {
    /// Classify the raw header value
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Ipv6RowField::VersionTag(IpVersion::V4),
            1 => Ipv6RowField::VersionTag(IpVersion::V6),
            n => Ipv6RowField::RowCount(n),
        }
    }
}
