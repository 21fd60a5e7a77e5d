//! Line-oriented list files with automatic gzip decompression
//!
//! Block lists and similar text sources are read line by line, each line
//! handed to a parser, and the parsed entries collected into a
//! [`SortedList`] for the caller to sort.
//!
//! Before a line reaches the parser, trailing line endings and leading
//! whitespace are stripped, and blank lines or comments (starting with `#`
//! or `;`) are dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use ipenrich::file_reader;
//!
//! // drop.txt.gz is decompressed on the fly
//! let list = file_reader::load_sorted("drop.txt.gz", |line| {
//!     line.split_whitespace().next().map(str::to_string)
//! })?;
//! println!("{} entries", list.len());
//! # Ok::<(), std::io::Error>(())
//! ```

use crate::sorted_list::SortedList;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Open a file with automatic gzip detection based on file extension
///
/// Files ending in `.gz` (case-insensitive) are decompressed.
///
/// # Errors
///
/// Returns an error if the file doesn't exist or cannot be opened.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let is_gzip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Read `path` and collect every entry `parser` accepts.
///
/// Lines the parser rejects are skipped. The returned list is unsorted.
pub fn load_sorted<P, T, F>(path: P, parser: F) -> io::Result<SortedList<T>>
where
    P: AsRef<Path>,
    F: FnMut(&str) -> Option<T>,
{
    let path = path.as_ref();
    let list = load_sorted_from_reader(open(path)?, parser)?;
    debug!(path = %path.display(), entries = list.len(), "Loaded list file");
    Ok(list)
}

/// Like [`load_sorted`], reading from an open reader
pub fn load_sorted_from_reader<R, T, F>(reader: R, mut parser: F) -> io::Result<SortedList<T>>
where
    R: BufRead,
    F: FnMut(&str) -> Option<T>,
{
    let mut list = SortedList::new();
    let mut skipped = 0usize;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches(&['\r', '\n'][..]).trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        match parser(line) {
            Some(entry) => list.append(entry),
            None => {
                debug!(line, "Skipping unparseable line");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Lines skipped while loading list");
    }
    Ok(list)
}
