//! Bounds-checked reads from a mapped geo database
//!
//! The geo database format addresses integers and floats with 1-based
//! positions (`read_u32_le(1)` reads the first four bytes of the file),
//! while string pointers stored in the row table are plain 0-based
//! offsets. `ByteReader` hides both conventions behind a view with an
//! explicit length.
//!
//! No read ever touches memory outside the view. A read that would cross
//! the end returns zero (or an empty string) and bumps a shared error
//! counter instead of failing, so a truncated or half-loaded file degrades
//! into "no data" rather than an error on every lookup.
//!
//! ```
//! use ipenrich::byte_reader::ByteReader;
//! use std::sync::atomic::AtomicU64;
//!
//! let errors = AtomicU64::new(0);
//! let data = [0x78, 0x56, 0x34, 0x12];
//! let reader = ByteReader::new(&data, &errors);
//!
//! assert_eq!(reader.read_u32_le(1), 0x12345678);
//! assert_eq!(reader.read_u32_le(2), 0); // would cross the end
//! assert_eq!(reader.index_errors(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Read-only view over mapped bytes with an out-of-bounds counter
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    errors: &'a AtomicU64,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over `data`, counting violations in `errors`
    pub fn new(data: &'a [u8], errors: &'a AtomicU64) -> Self {
        Self { data, errors }
    }

    /// Length of the view in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the view is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Out-of-bounds reads seen so far (shared with every reader on the counter)
    pub fn index_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    #[inline]
    fn violation(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// `width` bytes at 1-based `pos`, or `None` after counting a violation
    #[inline]
    fn window(&self, pos: u64, width: usize) -> Option<&'a [u8]> {
        let start = match pos.checked_sub(1) {
            Some(start) => start,
            None => {
                self.violation();
                return None;
            }
        };
        let end = start.checked_add(width as u64);
        match end {
            Some(end) if end <= self.data.len() as u64 => {
                Some(&self.data[start as usize..end as usize])
            }
            _ => {
                self.violation();
                None
            }
        }
    }

    /// Byte at 1-based `pos`
    pub fn read_u8(&self, pos: u64) -> u8 {
        self.window(pos, 1).map(|b| b[0]).unwrap_or(0)
    }

    /// Little-endian `u32` at 1-based `pos`
    pub fn read_u32_le(&self, pos: u64) -> u32 {
        self.window(pos, 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or(0)
    }

    /// Little-endian IEEE-754 `f32` at 1-based `pos`
    pub fn read_f32(&self, pos: u64) -> f32 {
        self.window(pos, 4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or(0.0)
    }

    /// Little-endian 128-bit value at 1-based `pos`
    ///
    /// IPv6 range boundaries are stored least-significant byte first.
    pub fn read_u128_le(&self, pos: u64) -> u128 {
        match self.window(pos, 16) {
            Some(b) => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(b);
                u128::from_le_bytes(raw)
            }
            None => 0,
        }
    }

    /// Length-prefixed string at 0-based `offset`, capped at `max_len` bytes
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_pascal_string(&self, offset: u64, max_len: usize) -> String {
        let len_pos = match usize::try_from(offset) {
            Ok(pos) if pos < self.data.len() => pos,
            _ => {
                self.violation();
                return String::new();
            }
        };

        let size = (self.data[len_pos] as usize).min(max_len);
        let start = len_pos + 1;
        match self.data.get(start..start + size) {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => {
                self.violation();
                String::new()
            }
        }
    }
}

impl std::fmt::Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteReader")
            .field("len", &self.data.len())
            .field("index_errors", &self.index_errors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u8_one_based() {
        let errors = AtomicU64::new(0);
        let reader = ByteReader::new(&[7, 8, 9], &errors);
        assert_eq!(reader.read_u8(1), 7);
        assert_eq!(reader.read_u8(3), 9);
        assert_eq!(reader.index_errors(), 0);
    }

    #[test]
    fn test_position_zero_is_violation() {
        let errors = AtomicU64::new(0);
        let reader = ByteReader::new(&[1, 2, 3, 4], &errors);
        assert_eq!(reader.read_u8(0), 0);
        assert_eq!(reader.index_errors(), 1);
    }

    #[test]
    fn test_read_past_end_counts_once() {
        let errors = AtomicU64::new(0);
        let data = [0u8; 8];
        let reader = ByteReader::new(&data, &errors);

        assert_eq!(reader.read_u32_le(8), 0);
        assert_eq!(reader.index_errors(), 1);
        assert_eq!(reader.read_u8(9), 0);
        assert_eq!(reader.index_errors(), 2);
        assert_eq!(reader.read_f32(u64::MAX), 0.0);
        assert_eq!(reader.index_errors(), 3);
        assert_eq!(reader.read_u128_le(1), 0);
        assert_eq!(reader.index_errors(), 4);
    }

    #[test]
    fn test_read_f32() {
        let errors = AtomicU64::new(0);
        let mut data = vec![0u8];
        data.extend_from_slice(&51.5f32.to_le_bytes());
        let reader = ByteReader::new(&data, &errors);
        assert_eq!(reader.read_f32(2), 51.5);
    }

    #[test]
    fn test_read_u128_le() {
        let errors = AtomicU64::new(0);
        let value: u128 = 0x2001_0db8_0000_0000_0000_0000_0000_0001;
        let data = value.to_le_bytes();
        let reader = ByteReader::new(&data, &errors);
        assert_eq!(reader.read_u128_le(1), value);
    }

    #[test]
    fn test_pascal_string() {
        let errors = AtomicU64::new(0);
        let data = [2, b'U', b'S', 13, b'U', b'n', b'i', b't', b'e', b'd'];
        let reader = ByteReader::new(&data, &errors);
        assert_eq!(reader.read_pascal_string(0, 2), "US");
        assert_eq!(reader.read_pascal_string(0, 1), "U");
        // Length byte claims 13 bytes but only 6 remain
        assert_eq!(reader.read_pascal_string(3, 30), "");
        assert_eq!(reader.index_errors(), 1);
        assert_eq!(reader.read_pascal_string(3, 6), "United");
        assert_eq!(reader.read_pascal_string(10, 2), "");
        assert_eq!(reader.index_errors(), 2);
    }

    #[test]
    fn test_shared_counter() {
        let errors = AtomicU64::new(0);
        let data = [0u8; 2];
        let a = ByteReader::new(&data, &errors);
        let b = ByteReader::new(&data, &errors);
        a.read_u32_le(1);
        b.read_u32_le(1);
        assert_eq!(errors.load(Ordering::Relaxed), 2);
    }
}
