//! Geo database handle and reader lifecycle

use super::format::{current_year, GeoDate, GeoHeader};
use super::search::RowTable;
use super::types::{Coverage, GeoRecord, LookupFlags, MAX_TYPE_CODE};
use crate::byte_reader::ByteReader;
use crate::config::GeoConfig;
use crate::error::{EnrichError, Result};
use crate::mmap::{MapMode, MappedRegion};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// How to open a geo database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoOptions {
    /// Private mapping or named shared region
    pub map_mode: MapMode,
    /// Fields returned by `lookup_ipv4` / `lookup_ipv6`
    pub flags: LookupFlags,
}

impl Default for GeoOptions {
    fn default() -> Self {
        Self {
            map_mode: MapMode::Private,
            flags: LookupFlags::default(),
        }
    }
}

/// Storage for the database image - either owned or memory-mapped
enum GeoStorage {
    Owned(Vec<u8>),
    Mapped(MappedRegion),
}

impl GeoStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            GeoStorage::Owned(v) => v.as_slice(),
            GeoStorage::Mapped(m) => m.as_slice(),
        }
    }

    fn is_attached(&self) -> bool {
        matches!(self, GeoStorage::Mapped(m) if m.is_attached())
    }

    fn is_shared(&self) -> bool {
        matches!(self, GeoStorage::Mapped(m) if m.is_shared())
    }
}

/// An open geo database.
///
/// Immutable after opening and safe to query from many threads at once.
///
/// # Example
///
/// ```no_run
/// use ipenrich::geo::{GeoDatabase, GeoOptions};
///
/// let db = GeoDatabase::open("IP2LOCATION-LITE-DB3.BIN", &GeoOptions::default())?;
/// if let Some(record) = db.lookup("8.8.8.8".parse().unwrap()) {
///     println!("{:?} {:?}", record.country_short, record.city);
/// }
/// # Ok::<(), ipenrich::error::EnrichError>(())
/// ```
pub struct GeoDatabase {
    storage: GeoStorage,
    header: GeoHeader,
    flags: LookupFlags,
    index_errors: AtomicU64,
}

impl GeoDatabase {
    /// Open and map the database at `path`.
    ///
    /// # Errors
    ///
    /// `EnrichError::Open` if the file is missing, empty or cannot be
    /// mapped; `EnrichError::CorruptHeader` if the header is truncated or
    /// fails the plausibility check.
    pub fn open<P: AsRef<Path>>(path: P, options: &GeoOptions) -> Result<Self> {
        let path = path.as_ref();
        let region = MappedRegion::open(path, &options.map_mode)?;
        let db = Self::from_storage(GeoStorage::Mapped(region), options.flags)?;

        info!(
            path = %path.display(),
            type_code = db.header.type_code,
            date = %db.header.date,
            ipv4_rows = db.header.ipv4_row_count,
            ipv6_rows = db.header.ipv6_row_count,
            shared = db.is_shared(),
            attached = db.is_attached(),
            "Opened geo database"
        );
        Ok(db)
    }

    /// Create a database from an in-memory image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(GeoStorage::Owned(data), LookupFlags::default())
    }

    fn from_storage(storage: GeoStorage, flags: LookupFlags) -> Result<Self> {
        let attached = storage.is_attached();
        let header = GeoHeader::parse(storage.as_slice())?;

        if let Err(e) = header.validate(current_year()) {
            // The creator of a shared region has already reported this
            if attached {
                debug!(error = %e, "Attached geo database failed plausibility check");
            } else {
                warn!(error = %e, "Geo database failed plausibility check");
            }
            return Err(e);
        }
        if header.type_code == 0 || header.type_code > MAX_TYPE_CODE {
            return Err(EnrichError::CorruptHeader(format!(
                "Unknown database type {}",
                header.type_code
            )));
        }

        Ok(Self {
            storage,
            header,
            flags,
            index_errors: AtomicU64::new(0),
        })
    }

    /// Replace the fields returned by the default lookups
    pub fn with_flags(mut self, flags: LookupFlags) -> Self {
        self.flags = flags;
        self
    }

    fn table(&self) -> RowTable<'_> {
        let reader = ByteReader::new(self.storage.as_slice(), &self.index_errors);
        RowTable::new(reader, &self.header)
    }

    /// Look up an IPv4 address with the configured flags
    pub fn lookup_ipv4(&self, addr: Ipv4Addr) -> Option<GeoRecord> {
        self.lookup_ipv4_with(addr, self.flags)
    }

    /// Look up an IPv6 address with the configured flags.
    ///
    /// IPv4-mapped addresses (`::ffff:a.b.c.d`) are answered from the IPv4 table.
    pub fn lookup_ipv6(&self, addr: Ipv6Addr) -> Option<GeoRecord> {
        self.lookup_ipv6_with(addr, self.flags)
    }

    /// Look up either address family with the configured flags
    pub fn lookup(&self, addr: IpAddr) -> Option<GeoRecord> {
        self.lookup_with(addr, self.flags)
    }

    /// Look up either address family, returning the fields in `flags`
    pub fn lookup_with(&self, addr: IpAddr, flags: LookupFlags) -> Option<GeoRecord> {
        match addr {
            IpAddr::V4(v4) => self.lookup_ipv4_with(v4, flags),
            IpAddr::V6(v6) => self.lookup_ipv6_with(v6, flags),
        }
    }

    fn lookup_ipv4_with(&self, addr: Ipv4Addr, flags: LookupFlags) -> Option<GeoRecord> {
        let table = self.table();
        let row = table.find_ipv4_row(u32::from(addr))?;
        table.read_record(row, flags)
    }

    fn lookup_ipv6_with(&self, addr: Ipv6Addr, flags: LookupFlags) -> Option<GeoRecord> {
        if let Some(v4) = addr.to_ipv4_mapped() {
            return self.lookup_ipv4_with(v4, flags);
        }
        let table = self.table();
        let row = table.find_ipv6_row(u128::from(addr))?;
        table.read_record(row, flags)
    }

    /// Out-of-bounds reads attempted so far.
    ///
    /// A non-zero count usually means a truncated file, or a shared region
    /// that was still being loaded by another process when attached.
    pub fn index_errors(&self) -> u64 {
        self.index_errors.load(Ordering::Relaxed)
    }

    /// Decoded header
    pub fn header(&self) -> &GeoHeader {
        &self.header
    }

    /// Build date of the database
    pub fn date(&self) -> GeoDate {
        self.header.date
    }

    /// Address families covered
    pub fn coverage(&self) -> Coverage {
        self.header.coverage()
    }

    /// Number of IPv4 rows
    pub fn ipv4_row_count(&self) -> u32 {
        self.header.ipv4_row_count
    }

    /// Number of IPv6 rows (raw header value)
    pub fn ipv6_row_count(&self) -> u32 {
        self.header.ipv6_row_count
    }

    /// Fields returned by the default lookups
    pub fn flags(&self) -> LookupFlags {
        self.flags
    }

    /// Size of the image in bytes
    pub fn size(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// True if the image lives in a named shared region
    pub fn is_shared(&self) -> bool {
        self.storage.is_shared()
    }

    /// True if this process attached to a region another process loaded
    pub fn is_attached(&self) -> bool {
        self.storage.is_attached()
    }
}

impl std::fmt::Debug for GeoDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDatabase")
            .field("header", &self.header)
            .field("flags", &self.flags)
            .field("size", &self.size())
            .field("index_errors", &self.index_errors())
            .finish()
    }
}

/// Lifecycle state of a [`GeoReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No database loaded
    Closed,
    /// Database open and answering lookups
    Ready,
    /// A header was rejected; every later open is refused
    PermanentlyBad,
}

enum ReaderInner {
    Closed,
    Ready(GeoDatabase),
    PermanentlyBad,
}

/// Owned geo reader with an explicit open/close lifecycle.
///
/// Lookups on a reader that is not `Ready` return `None`. Once a database
/// fails its header check the reader stays `PermanentlyBad` and refuses
/// to open anything else.
pub struct GeoReader {
    inner: ReaderInner,
}

impl Default for GeoReader {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoReader {
    /// Create a closed reader
    pub fn new() -> Self {
        Self {
            inner: ReaderInner::Closed,
        }
    }

    /// Open `path`, replacing any database already loaded.
    ///
    /// # Errors
    ///
    /// `EnrichError::Rejected` if an earlier open failed its header check.
    /// Otherwise the errors of [`GeoDatabase::open`]; an open failure leaves
    /// the reader `Closed`, a header failure makes it `PermanentlyBad`.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, options: &GeoOptions) -> Result<()> {
        if let ReaderInner::PermanentlyBad = self.inner {
            return Err(EnrichError::Rejected(
                "geo database previously failed its header check".to_string(),
            ));
        }

        self.inner = ReaderInner::Closed;
        match GeoDatabase::open(path, options) {
            Ok(db) => {
                self.inner = ReaderInner::Ready(db);
                Ok(())
            }
            Err(e @ EnrichError::CorruptHeader(_)) => {
                self.inner = ReaderInner::PermanentlyBad;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Open the database named by `config`.
    ///
    /// A disabled configuration, or one without `ip2location_bin_file`,
    /// closes the reader and returns `Ok`. Otherwise this is [`open`] with
    /// [`GeoConfig::open_options`].
    ///
    /// [`open`]: GeoReader::open
    pub fn open_config(&mut self, config: &GeoConfig) -> Result<()> {
        if !config.enable {
            debug!("Geo lookups disabled in configuration");
            self.close();
            return Ok(());
        }
        let Some(path) = &config.ip2location_bin_file else {
            debug!("No geo database configured");
            self.close();
            return Ok(());
        };
        self.open(path, &config.open_options())
    }

    /// Release the database. A `PermanentlyBad` reader stays bad.
    pub fn close(&mut self) {
        if let ReaderInner::Ready(_) = self.inner {
            self.inner = ReaderInner::Closed;
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReaderState {
        match self.inner {
            ReaderInner::Closed => ReaderState::Closed,
            ReaderInner::Ready(_) => ReaderState::Ready,
            ReaderInner::PermanentlyBad => ReaderState::PermanentlyBad,
        }
    }

    /// The open database, if `Ready`
    pub fn database(&self) -> Option<&GeoDatabase> {
        match &self.inner {
            ReaderInner::Ready(db) => Some(db),
            _ => None,
        }
    }

    /// Look up an IPv4 address
    pub fn lookup_ipv4(&self, addr: Ipv4Addr) -> Option<GeoRecord> {
        self.database()?.lookup_ipv4(addr)
    }

    /// Look up an IPv6 address
    pub fn lookup_ipv6(&self, addr: Ipv6Addr) -> Option<GeoRecord> {
        self.database()?.lookup_ipv6(addr)
    }

    /// Look up either address family
    pub fn lookup(&self, addr: IpAddr) -> Option<GeoRecord> {
        self.database()?.lookup(addr)
    }

    /// Out-of-bounds reads of the open database, 0 when not `Ready`
    pub fn index_errors(&self) -> u64 {
        self.database().map(|db| db.index_errors()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::builder::{GeoImageBuilder, GeoLocation};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_image() -> Vec<u8> {
        let mut builder = GeoImageBuilder::new(5).with_date(2021, 3, 4);
        builder
            .add_ipv4(Ipv4Addr::new(0, 0, 0, 0), GeoLocation::unknown())
            .unwrap();
        builder
            .add_ipv4(
                Ipv4Addr::new(10, 0, 0, 0),
                GeoLocation::new("NO", "Norway", "Oslo", "Oslo").with_position(59.91, 10.75),
            )
            .unwrap();
        builder
            .add_ipv4(Ipv4Addr::new(10, 1, 0, 0), GeoLocation::unknown())
            .unwrap();
        builder.build().unwrap()
    }

    fn write_temp(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_lookup_flags() {
        let db = GeoDatabase::from_bytes(sample_image()).unwrap();
        let addr = Ipv4Addr::new(10, 0, 200, 1);

        let record = db.lookup_ipv4(addr).unwrap();
        assert_eq!(record.country_short.as_deref(), Some("NO"));
        assert_eq!(record.city.as_deref(), Some("Oslo"));
        assert_eq!(record.country_long, None);
        assert_eq!(record.latitude, None);

        let all = LookupFlags::all();
        let record = db.lookup_with(IpAddr::V4(addr), all).unwrap();
        assert_eq!(record.country_long.as_deref(), Some("Norway"));
        assert_eq!(record.latitude, Some(59.91));
        assert_eq!(record.longitude, Some(10.75));
        assert_eq!(db.index_errors(), 0);
    }

    #[test]
    fn test_unknown_range_not_found() {
        let db = GeoDatabase::from_bytes(sample_image()).unwrap();
        assert!(db.lookup_ipv4(Ipv4Addr::new(9, 255, 255, 255)).is_none());
        assert!(db.lookup_ipv4(Ipv4Addr::new(10, 1, 0, 0)).is_none());
        assert!(db.lookup_ipv4(Ipv4Addr::BROADCAST).is_none());
    }

    #[test]
    fn test_mapped_ipv6_uses_ipv4_table() {
        let db = GeoDatabase::from_bytes(sample_image()).unwrap();
        let mapped = Ipv4Addr::new(10, 0, 0, 5).to_ipv6_mapped();
        assert_eq!(
            db.lookup_ipv6(mapped).unwrap().country_short.as_deref(),
            Some("NO")
        );
        // No IPv6 rows at all
        assert!(db.lookup_ipv6("2001:db8::1".parse().unwrap()).is_none());
        assert_eq!(db.index_errors(), 0);
    }

    #[test]
    fn test_implausible_header_rejected() {
        let mut image = sample_image();
        image[3] = 13; // month
        assert!(matches!(
            GeoDatabase::from_bytes(image),
            Err(EnrichError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_reader_lifecycle() {
        let good = write_temp(&sample_image());
        let mut reader = GeoReader::new();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(reader.lookup_ipv4(Ipv4Addr::new(10, 0, 0, 1)).is_none());

        reader.open(good.path(), &GeoOptions::default()).unwrap();
        assert_eq!(reader.state(), ReaderState::Ready);
        assert!(reader.lookup_ipv4(Ipv4Addr::new(10, 0, 0, 1)).is_some());

        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(reader.lookup_ipv4(Ipv4Addr::new(10, 0, 0, 1)).is_none());
    }

    #[test]
    fn test_open_failure_stays_closed() {
        let empty = write_temp(&[]);
        let mut reader = GeoReader::new();
        let err = reader.open(empty.path(), &GeoOptions::default()).unwrap_err();
        assert!(matches!(err, EnrichError::Open(_)));
        assert_eq!(reader.state(), ReaderState::Closed);
    }

    #[test]
    fn test_corrupt_header_is_permanent() {
        let mut image = sample_image();
        image[4] = 0; // day
        let bad = write_temp(&image);
        let good = write_temp(&sample_image());

        let mut reader = GeoReader::new();
        assert!(matches!(
            reader.open(bad.path(), &GeoOptions::default()),
            Err(EnrichError::CorruptHeader(_))
        ));
        assert_eq!(reader.state(), ReaderState::PermanentlyBad);

        assert!(matches!(
            reader.open(good.path(), &GeoOptions::default()),
            Err(EnrichError::Rejected(_))
        ));
        reader.close();
        assert_eq!(reader.state(), ReaderState::PermanentlyBad);
    }

    #[test]
    fn test_database_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GeoDatabase>();
        assert_send_sync::<GeoReader>();
    }

    fn private_config(path: Option<&Path>) -> GeoConfig {
        GeoConfig {
            ip2location_bin_file: path.map(Path::to_path_buf),
            shared_memory_name: None,
            show_position: true,
            ..GeoConfig::default()
        }
    }

    #[test]
    fn test_open_config() {
        let file = write_temp(&sample_image());
        let mut reader = GeoReader::new();
        reader.open_config(&private_config(Some(file.path()))).unwrap();
        assert_eq!(reader.state(), ReaderState::Ready);

        let record = reader.lookup_ipv4(Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(record.city.as_deref(), Some("Oslo"));
        assert_eq!(record.latitude, Some(59.91));
        assert!(!reader.database().unwrap().is_shared());
    }

    #[test]
    fn test_open_config_disabled() {
        let file = write_temp(&sample_image());
        let mut reader = GeoReader::new();
        reader.open(file.path(), &GeoOptions::default()).unwrap();

        let config = GeoConfig {
            enable: false,
            ..private_config(Some(file.path()))
        };
        reader.open_config(&config).unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(reader.lookup_ipv4(Ipv4Addr::new(10, 0, 0, 1)).is_none());
    }

    #[test]
    fn test_open_config_without_file() {
        let mut reader = GeoReader::new();
        reader.open_config(&private_config(None)).unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
    }
}
