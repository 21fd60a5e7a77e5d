//! Memory-mapped database storage, optionally shared between processes.
//!
//! A database file can be mapped in two ways:
//!
//! - **Private**: the file itself is mapped read-only. The OS page cache
//!   already shares the pages with any other process mapping the same file.
//! - **Shared**: the file contents are copied once into a named region under
//!   a shared-memory directory (`/dev/shm` on Linux). The first process to
//!   get there creates and loads the region; later processes attach to it
//!   without touching the database file again.
//!
//! # Consistency
//!
//! Before attaching, the region is compared with the database file: same
//! size, same leading bytes, and not older than the file. A region that
//! fails the comparison (left behind by a killed process, or copied from an
//! older database) is unlinked and loaded again. If the replacement is
//! itself stale, the file is mapped privately instead.
//!
//! A region that passes can still be mid-load by a live creator whose
//! leading bytes are already written. That shows up as out-of-bounds read
//! counts, never as undefined behaviour: all reads go through
//! bounds-checked accessors.
//!
//! # Example
//!
//! ```no_run
//! use ipenrich::mmap::{MapMode, MappedRegion};
//!
//! let region = MappedRegion::open("IP2LOCATION-LITE-DB11.BIN", &MapMode::Private)?;
//! println!("Size: {} bytes", region.size());
//! # Ok::<(), ipenrich::error::EnrichError>(())
//! ```

use crate::error::{EnrichError, Result};
use memmap2::{Mmap, MmapMut};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Name used for the shared region when none is configured
pub const DEFAULT_SHARED_NAME: &str = "IP2location_Shm";

/// Leading bytes compared against the database file before attaching
const VERIFY_LEN: u64 = 4096;

/// How the database file is brought into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapMode {
    /// Map the file directly
    Private,
    /// Create or attach a named region in `dir`
    Shared {
        /// Region name (a plain file name)
        name: String,
        /// Directory holding shared regions
        dir: PathBuf,
    },
}

impl MapMode {
    /// Shared mode in the platform's default shared-memory directory
    pub fn shared(name: impl Into<String>) -> Self {
        MapMode::Shared {
            name: name.into(),
            dir: default_shm_dir(),
        }
    }
}

/// Directory used for shared regions: `/dev/shm` when present, else the temp dir
pub fn default_shm_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// A read-only mapping of a database file.
///
/// Unmapped when dropped. A region this process created is also unlinked
/// on drop, unless another process has replaced it in the meantime;
/// processes already attached keep their mapping.
pub struct MappedRegion {
    map: Mmap,
    size: usize,
    attached: bool,
    owned_region: Option<OwnedRegion>,
}

/// Region file created by this process
#[derive(Debug)]
struct OwnedRegion {
    path: PathBuf,
    id: Option<FileId>,
}

/// What is known about the database file when deciding whether to attach
struct SourceInfo {
    len: u64,
    prefix: Vec<u8>,
    modified: Option<SystemTime>,
}

enum Attach {
    Mapped(MappedRegion),
    Stale(&'static str),
}

impl MappedRegion {
    /// Open and map `path`.
    ///
    /// # Errors
    ///
    /// Returns `EnrichError::Open` if the file cannot be opened or is empty,
    /// if the shared name is not a plain file name, or if the mapping fails.
    pub fn open<P: AsRef<Path>>(path: P, mode: &MapMode) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| EnrichError::Open(format!("Failed to open {}: {}", path.display(), e)))?;

        let meta = file
            .metadata()
            .map_err(|e| EnrichError::Open(format!("Failed to stat {}: {}", path.display(), e)))?;
        if meta.len() == 0 {
            return Err(EnrichError::Open(format!("{} is 0 bytes", path.display())));
        }

        match mode {
            MapMode::Private => Self::map_private(&file, path),
            MapMode::Shared { name, dir } => {
                let source = SourceInfo::read(&mut file, &meta).map_err(|e| {
                    EnrichError::Open(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::create_or_attach(&mut file, path, &source, name, dir)
            }
        }
    }

    fn map_private(file: &File, path: &Path) -> Result<Self> {
        // SAFETY: the mapping is read-only and every access is bounds-checked
        let map = unsafe { Mmap::map(file) }
            .map_err(|e| EnrichError::Open(format!("Failed to mmap {}: {}", path.display(), e)))?;
        let size = map.len();
        Ok(Self {
            map,
            size,
            attached: false,
            owned_region: None,
        })
    }

    fn create_or_attach(
        file: &mut File,
        path: &Path,
        source: &SourceInfo,
        name: &str,
        dir: &Path,
    ) -> Result<Self> {
        if name.is_empty() || name.contains(&['/', '\\'][..]) || name == "." || name == ".." {
            return Err(EnrichError::Open(format!("Invalid shared region name {:?}", name)));
        }
        let region_path = dir.join(name);

        // One replacement attempt; a second stale region means another
        // process is racing us, so stop sharing
        for _ in 0..2 {
            let region = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&region_path);

            match region {
                Ok(region) => return Self::create(&region, file, source.len, region_path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match Self::attach(&region_path, source)? {
                        Attach::Mapped(mapped) => return Ok(mapped),
                        Attach::Stale(reason) => {
                            warn!(region = %region_path.display(), reason, "Replacing stale shared region");
                            if let Err(e) = fs::remove_file(&region_path) {
                                if e.kind() != io::ErrorKind::NotFound {
                                    debug!(region = %region_path.display(), error = %e, "Failed to unlink stale region");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    return Err(EnrichError::Open(format!(
                        "Failed to create shared region {}: {}",
                        region_path.display(),
                        e
                    )))
                }
            }
        }

        warn!(region = %region_path.display(), "Shared region stays stale; mapping privately");
        Self::map_private(file, path)
    }

    fn create(region: &File, file: &mut File, file_len: u64, region_path: PathBuf) -> Result<Self> {
        let map = Self::load_region(region, file, file_len).map_err(|e| {
            let _ = fs::remove_file(&region_path);
            EnrichError::Open(format!(
                "Failed to load shared region {}: {}",
                region_path.display(),
                e
            ))
        })?;
        let id = region.metadata().ok().and_then(|meta| file_id(&meta));
        debug!(region = %region_path.display(), size = file_len, "Created shared region");
        Ok(Self {
            size: map.len(),
            map,
            attached: false,
            owned_region: Some(OwnedRegion {
                path: region_path,
                id,
            }),
        })
    }

    fn load_region(region: &File, file: &mut File, file_len: u64) -> io::Result<Mmap> {
        region.set_len(file_len)?;
        // SAFETY: the region was just created exclusively by this process
        let mut map = unsafe { MmapMut::map_mut(region)? };
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut map[..])?;
        map.flush()?;
        map.make_read_only()
    }

    fn attach(region_path: &Path, source: &SourceInfo) -> Result<Attach> {
        let region = match File::open(region_path) {
            Ok(region) => region,
            // Unlinked between our create attempt and now
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Attach::Stale("region vanished"))
            }
            Err(e) => {
                return Err(EnrichError::Open(format!(
                    "Failed to attach {}: {}",
                    region_path.display(),
                    e
                )))
            }
        };
        let meta = region.metadata().map_err(|e| {
            EnrichError::Open(format!("Failed to stat {}: {}", region_path.display(), e))
        })?;

        if meta.len() != source.len {
            return Ok(Attach::Stale("size differs from database file"));
        }
        if let (Some(source_time), Ok(region_time)) = (source.modified, meta.modified()) {
            if source_time > region_time {
                return Ok(Attach::Stale("database file is newer"));
            }
        }

        // SAFETY: read-only mapping; contents may still be loading (see module docs)
        let map = unsafe { Mmap::map(&region) }.map_err(|e| {
            EnrichError::Open(format!("Failed to mmap {}: {}", region_path.display(), e))
        })?;
        if map.get(..source.prefix.len()) != Some(&source.prefix[..]) {
            return Ok(Attach::Stale("contents differ from database file"));
        }

        debug!(region = %region_path.display(), size = map.len(), "Attached to existing shared region");
        Ok(Attach::Mapped(Self {
            size: map.len(),
            map,
            attached: true,
            owned_region: None,
        }))
    }

    /// Size of the mapped region in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// The mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.map[..]
    }

    /// True if this process attached to a region another process created
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// True if the region is a named shared region (created or attached)
    pub fn is_shared(&self) -> bool {
        self.attached || self.owned_region.is_some()
    }
}

impl SourceInfo {
    fn read(file: &mut File, meta: &fs::Metadata) -> io::Result<Self> {
        let len = meta.len();
        let mut prefix = vec![0u8; len.min(VERIFY_LEN) as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut prefix)?;
        Ok(Self {
            len,
            prefix,
            modified: meta.modified().ok(),
        })
    }
}

type FileId = (u64, u64);

#[cfg(unix)]
fn file_id(meta: &fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_id(_meta: &fs::Metadata) -> Option<FileId> {
    None
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        let Some(owned) = self.owned_region.take() else {
            return;
        };
        // Leave a region some other process has put in our place
        if let (Some(id), Ok(meta)) = (owned.id, fs::metadata(&owned.path)) {
            if file_id(&meta) != Some(id) {
                debug!(region = %owned.path.display(), "Shared region was replaced; not unlinking");
                return;
            }
        }
        if let Err(e) = fs::remove_file(&owned.path) {
            debug!(region = %owned.path.display(), error = %e, "Failed to unlink shared region");
        }
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("size", &self.size)
            .field("attached", &self.attached)
            .field("owned_region", &self.owned_region)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_file(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_empty_file() {
        let file = create_test_file(&[]);
        let result = MappedRegion::open(file.path(), &MapMode::Private);
        assert!(matches!(result, Err(EnrichError::Open(_))));
    }

    #[test]
    fn test_nonexistent_file() {
        let result = MappedRegion::open("/nonexistent/path/to/file.bin", &MapMode::Private);
        assert!(matches!(result, Err(EnrichError::Open(_))));
    }

    #[test]
    fn test_private_mapping() {
        let file = create_test_file(&[1, 2, 3, 4]);
        let region = MappedRegion::open(file.path(), &MapMode::Private).unwrap();
        assert_eq!(region.size(), 4);
        assert_eq!(region.as_slice(), &[1, 2, 3, 4]);
        assert!(!region.is_shared());
        assert!(!region.is_attached());
    }

    #[test]
    fn test_shared_create_then_attach() {
        let file = create_test_file(b"geo-bytes");
        let dir = TempDir::new().unwrap();
        let mode = MapMode::Shared {
            name: "test_region".to_string(),
            dir: dir.path().to_path_buf(),
        };

        let first = MappedRegion::open(file.path(), &mode).unwrap();
        assert!(first.is_shared());
        assert!(!first.is_attached());
        assert_eq!(first.as_slice(), b"geo-bytes");

        let second = MappedRegion::open(file.path(), &mode).unwrap();
        assert!(second.is_attached());
        assert_eq!(second.as_slice(), b"geo-bytes");

        drop(second);
        drop(first);
        assert!(!dir.path().join("test_region").exists());
    }

    #[test]
    fn test_invalid_shared_name() {
        let file = create_test_file(b"x");
        let dir = TempDir::new().unwrap();
        let mode = MapMode::Shared {
            name: "../escape".to_string(),
            dir: dir.path().to_path_buf(),
        };
        assert!(matches!(
            MappedRegion::open(file.path(), &mode),
            Err(EnrichError::Open(_))
        ));
    }

    fn shared_mode(dir: &TempDir, name: &str) -> MapMode {
        MapMode::Shared {
            name: name.to_string(),
            dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_zeroed_leftover_region_is_replaced() {
        let file = create_test_file(b"geo-bytes");
        let dir = TempDir::new().unwrap();
        // Left sized but unloaded by a killed creator
        fs::write(dir.path().join("leftover"), [0u8; 9]).unwrap();

        let region = MappedRegion::open(file.path(), &shared_mode(&dir, "leftover")).unwrap();
        assert!(!region.is_attached());
        assert!(region.is_shared());
        assert_eq!(region.as_slice(), b"geo-bytes");

        drop(region);
        assert!(!dir.path().join("leftover").exists());
    }

    #[test]
    fn test_region_of_other_size_is_replaced() {
        let file = create_test_file(b"new database");
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("region"), vec![0u8; 4096]).unwrap();

        let region = MappedRegion::open(file.path(), &shared_mode(&dir, "region")).unwrap();
        assert!(!region.is_attached());
        assert_eq!(region.as_slice(), b"new database");
    }

    #[test]
    fn test_region_from_older_database_is_replaced() {
        let file = create_test_file(b"new-bytes");
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("region"), b"old-bytes").unwrap();

        let region = MappedRegion::open(file.path(), &shared_mode(&dir, "region")).unwrap();
        assert!(!region.is_attached());
        assert_eq!(region.as_slice(), b"new-bytes");
    }

    #[test]
    fn test_region_older_than_database_is_replaced() {
        let file = create_test_file(b"same-bytes");
        let dir = TempDir::new().unwrap();
        let region_path = dir.path().join("region");
        fs::write(&region_path, b"same-bytes").unwrap();
        let an_hour_ago = SystemTime::now() - std::time::Duration::from_secs(3600);
        File::options()
            .write(true)
            .open(&region_path)
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();

        let region = MappedRegion::open(file.path(), &shared_mode(&dir, "region")).unwrap();
        assert!(!region.is_attached());
        assert_eq!(region.as_slice(), b"same-bytes");
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_region_is_not_unlinked() {
        let file = create_test_file(b"geo-bytes");
        let dir = TempDir::new().unwrap();
        let region_path = dir.path().join("region");

        let first = MappedRegion::open(file.path(), &shared_mode(&dir, "region")).unwrap();
        fs::remove_file(&region_path).unwrap();
        fs::write(&region_path, b"geo-bytes").unwrap();

        drop(first);
        assert!(region_path.exists());
    }
}
