//! Enrichment configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid
//! configuration:
//!
//! ```json
//! {
//!   "geoip": {
//!     "ip2location_bin_file": "/var/lib/ipenrich/IP2LOCATION-LITE-DB11.BIN",
//!     "shared_memory_name": "IP2location_Shm",
//!     "show_position": true
//!   },
//!   "dnsbl": {
//!     "drop_file": "/var/lib/ipenrich/drop.txt",
//!     "dropv6_file": "/var/lib/ipenrich/dropv6.txt",
//!     "max_days": 10
//!   }
//! }
//! ```

use crate::blocklist::RefreshPolicy;
use crate::error::{EnrichError, Result};
use crate::geo::{GeoOptions, LookupFlags};
use crate::mmap::{default_shm_dir, MapMode, DEFAULT_SHARED_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default DROP list location
pub const DEFAULT_DROP_URL: &str = "https://www.spamhaus.org/drop/drop.txt";

/// Default DROPv6 list location
pub const DEFAULT_DROPV6_URL: &str = "https://www.spamhaus.org/drop/dropv6.txt";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Geo database settings
    pub geoip: GeoConfig,
    /// Block list settings
    pub dnsbl: DnsblConfig,
}

impl EnrichConfig {
    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            EnrichError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

/// Geo database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Enable geo lookups
    pub enable: bool,
    /// Path of the database file
    pub ip2location_bin_file: Option<PathBuf>,
    /// Name of the shared region; `null` maps the file privately
    pub shared_memory_name: Option<String>,
    /// Directory for shared regions (platform default when unset)
    pub shm_dir: Option<PathBuf>,
    /// Return latitude and longitude
    pub show_position: bool,
    /// Return the full country name
    pub show_country_long: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enable: true,
            ip2location_bin_file: None,
            shared_memory_name: Some(DEFAULT_SHARED_NAME.to_string()),
            shm_dir: None,
            show_position: false,
            show_country_long: false,
        }
    }
}

impl GeoConfig {
    /// Lookup flags implied by the `show_*` settings
    pub fn lookup_flags(&self) -> LookupFlags {
        let mut flags = LookupFlags::default();
        if self.show_position {
            flags |= LookupFlags::POSITION;
        }
        if self.show_country_long {
            flags |= LookupFlags::COUNTRY_LONG;
        }
        flags
    }

    /// Options for [`GeoDatabase::open`](crate::geo::GeoDatabase::open)
    pub fn open_options(&self) -> GeoOptions {
        let map_mode = match &self.shared_memory_name {
            Some(name) => MapMode::Shared {
                name: name.clone(),
                dir: self.shm_dir.clone().unwrap_or_else(default_shm_dir),
            },
            None => MapMode::Private,
        };
        GeoOptions {
            map_mode,
            flags: self.lookup_flags(),
        }
    }
}

/// Block list settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsblConfig {
    /// Enable block list matching
    pub enable: bool,
    /// Path of the DROP list
    pub drop_file: Option<PathBuf>,
    /// Path of the DROPv6 list
    pub dropv6_file: Option<PathBuf>,
    /// Where the DROP list is fetched from
    pub drop_url: String,
    /// Where the DROPv6 list is fetched from
    pub dropv6_url: String,
    /// Days before a list file is due for a refresh
    pub max_days: u32,
}

impl Default for DnsblConfig {
    fn default() -> Self {
        Self {
            enable: true,
            drop_file: None,
            dropv6_file: None,
            drop_url: DEFAULT_DROP_URL.to_string(),
            dropv6_url: DEFAULT_DROPV6_URL.to_string(),
            max_days: 10,
        }
    }
}

impl DnsblConfig {
    /// Refresh policy for the list files; `force` ignores `max_days`
    pub fn refresh_policy(&self, force: bool) -> RefreshPolicy {
        if force {
            RefreshPolicy::forced()
        } else {
            RefreshPolicy::from_days(self.max_days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_json_is_default() {
        let config = EnrichConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EnrichConfig::default());
        assert_eq!(config.dnsbl.max_days, 10);
        assert_eq!(
            config.geoip.shared_memory_name.as_deref(),
            Some("IP2location_Shm")
        );
    }

    #[test]
    fn test_partial_json() {
        let config = EnrichConfig::from_json_str(
            r#"{"geoip": {"shared_memory_name": null, "show_position": true},
                "dnsbl": {"drop_file": "drop.txt", "max_days": 3}}"#,
        )
        .unwrap();
        assert!(config.geoip.enable);
        assert_eq!(config.geoip.open_options().map_mode, MapMode::Private);
        assert!(config
            .geoip
            .lookup_flags()
            .contains(LookupFlags::LATITUDE | LookupFlags::LONGITUDE));
        assert_eq!(config.dnsbl.drop_file, Some(PathBuf::from("drop.txt")));
        assert_eq!(
            config.dnsbl.refresh_policy(false).max_age,
            Duration::from_secs(3 * 24 * 3600)
        );
        assert_eq!(config.dnsbl.refresh_policy(true).max_age, Duration::ZERO);
    }

    #[test]
    fn test_shared_mode() {
        let config = GeoConfig {
            shm_dir: Some(PathBuf::from("/tmp/regions")),
            ..GeoConfig::default()
        };
        assert_eq!(
            config.open_options().map_mode,
            MapMode::Shared {
                name: "IP2location_Shm".to_string(),
                dir: PathBuf::from("/tmp/regions"),
            }
        );
    }

    #[test]
    fn test_invalid_json() {
        let result = EnrichConfig::from_json_str(r#"{"dnsbl": {"max_days": "ten"}}"#);
        assert!(matches!(result, Err(EnrichError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"dnsbl": {{"enable": false}}}}"#).unwrap();
        file.flush().unwrap();
        let config = EnrichConfig::from_json_file(file.path()).unwrap();
        assert!(!config.dnsbl.enable);

        assert!(matches!(
            EnrichConfig::from_json_file("/nonexistent/config.json"),
            Err(EnrichError::Config(_))
        ));
    }
}
