//! Block list refresh policy
//!
//! Decides whether a list file is due for a download. Fetching and
//! replacing the file is left to the caller.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Tolerance for files checked out or copied moments ago
pub const DEFAULT_SLACK: Duration = Duration::from_secs(10);

const SECS_PER_DAY: u64 = 24 * 3600;

/// Maximum age allowed for a list file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Files older than this are due
    pub max_age: Duration,
    /// Subtracted from the expiry cut-off
    pub slack: Duration,
}

/// Why a file is (or is not) due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The file does not exist
    Missing,
    /// The file is empty
    Truncated,
    /// The file is older than the maximum age
    Expired,
    /// No update needed until `next_due`
    Fresh {
        /// When the file will become due
        next_due: SystemTime,
    },
}

impl RefreshReason {
    /// True unless the file is fresh
    pub fn is_due(&self) -> bool {
        !matches!(self, RefreshReason::Fresh { .. })
    }
}

impl RefreshPolicy {
    /// Files expire after `max_days` days
    pub fn from_days(max_days: u32) -> Self {
        Self {
            max_age: Duration::from_secs(max_days as u64 * SECS_PER_DAY),
            slack: DEFAULT_SLACK,
        }
    }

    /// Every existing file counts as expired
    pub fn forced() -> Self {
        Self {
            max_age: Duration::ZERO,
            slack: DEFAULT_SLACK,
        }
    }

    /// Check `path` against the policy at time `now`
    pub fn check(&self, path: &Path, now: SystemTime) -> io::Result<RefreshReason> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "List file missing");
                return Ok(RefreshReason::Missing);
            }
            Err(e) => return Err(e),
        };
        if meta.len() == 0 {
            debug!(path = %path.display(), "List file truncated");
            return Ok(RefreshReason::Truncated);
        }

        let mtime = meta.modified()?;
        let cutoff = now
            .checked_sub(self.max_age + self.slack)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if mtime > cutoff {
            let next_due = mtime + self.max_age;
            debug!(path = %path.display(), ?next_due, "List file is fresh");
            Ok(RefreshReason::Fresh { next_due })
        } else {
            debug!(path = %path.display(), "List file expired");
            Ok(RefreshReason::Expired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn list_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "24.233.0.0/19 ; SBL210084").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_and_truncated() {
        let policy = RefreshPolicy::from_days(10);
        let now = SystemTime::now();
        assert_eq!(
            policy.check(Path::new("/nonexistent/drop.txt"), now).unwrap(),
            RefreshReason::Missing
        );
        let empty = NamedTempFile::new().unwrap();
        assert_eq!(
            policy.check(empty.path(), now).unwrap(),
            RefreshReason::Truncated
        );
    }

    #[test]
    fn test_fresh_file() {
        let file = list_file();
        let reason = RefreshPolicy::from_days(10)
            .check(file.path(), SystemTime::now())
            .unwrap();
        assert!(!reason.is_due());
    }

    #[test]
    fn test_expired_file() {
        let file = list_file();
        let later = SystemTime::now() + Duration::from_secs(11 * SECS_PER_DAY);
        let reason = RefreshPolicy::from_days(10).check(file.path(), later).unwrap();
        assert_eq!(reason, RefreshReason::Expired);
    }

    #[test]
    fn test_slack_keeps_new_file_fresh() {
        // Zero max age still tolerates a file written seconds ago
        let file = list_file();
        let reason = RefreshPolicy::from_days(0)
            .check(file.path(), SystemTime::now())
            .unwrap();
        assert!(!reason.is_due());

        let later = SystemTime::now() + Duration::from_secs(60);
        let reason = RefreshPolicy::forced().check(file.path(), later).unwrap();
        assert_eq!(reason, RefreshReason::Expired);
    }
}
