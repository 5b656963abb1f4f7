use std::fs;
use std::path::{Path, PathBuf};

use crate::models::FileEntry;

const BINARY_SUFFIXES: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
const DECIMAL_SUFFIXES: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Anything that can be measured in bytes for display.
///
/// Implemented for raw byte counts, single paths and collections of paths
/// (which are summed). A path that cannot be stat'ed has no byte count.
pub trait ByteCount {
    fn byte_count(&self) -> Option<u64>;
}

impl ByteCount for u64 {
    fn byte_count(&self) -> Option<u64> {
        Some(*self)
    }
}

impl ByteCount for Path {
    fn byte_count(&self) -> Option<u64> {
        match fs::metadata(self) {
            Ok(metadata) if metadata.is_file() => Some(metadata.len()),
            _ => None,
        }
    }
}

impl ByteCount for PathBuf {
    fn byte_count(&self) -> Option<u64> {
        self.as_path().byte_count()
    }
}

impl ByteCount for [PathBuf] {
    fn byte_count(&self) -> Option<u64> {
        self.iter().map(|p| p.byte_count()).sum()
    }
}

impl ByteCount for Vec<PathBuf> {
    fn byte_count(&self) -> Option<u64> {
        self.as_slice().byte_count()
    }
}

impl ByteCount for [FileEntry] {
    fn byte_count(&self) -> Option<u64> {
        self.iter().map(|f| f.size().ok()).sum()
    }
}

/// Format a byte count, file or list of files as a human readable size.
///
/// Uses IEC suffixes (base 1024) when `binary` is set, SI suffixes (base 1000)
/// otherwise. The largest suffix keeping the scaled value at or above one is
/// chosen, and the value is printed with `precision` decimals. Zero bytes is
/// always `"0 B"`.
///
/// # Example
///
/// ```
/// use climate_archiver::utils::size::format_size;
///
/// assert_eq!(format_size(&1024u64, true, 2).as_deref(), Some("1.00 KiB"));
/// assert_eq!(format_size(&1000u64, false, 2).as_deref(), Some("1.00 kB"));
/// ```
pub fn format_size<T: ByteCount + ?Sized>(
    value: &T,
    binary: bool,
    precision: usize,
) -> Option<String> {
    let bytes = value.byte_count()?;
    if bytes == 0 {
        return Some("0 B".to_string());
    }

    let (base, suffixes) = if binary {
        (1024u64, &BINARY_SUFFIXES)
    } else {
        (1000u64, &DECIMAL_SUFFIXES)
    };

    let mut multiple = 0usize;
    let mut divisor = 1u128;
    while multiple + 1 < suffixes.len() && bytes as u128 >= divisor * base as u128 {
        divisor *= base as u128;
        multiple += 1;
    }

    let value = bytes as f64 / divisor as f64;
    Some(format!("{:.*} {}", precision, value, suffixes[multiple]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zero_bytes() {
        assert_eq!(format_size(&0u64, true, 2).unwrap(), "0 B");
        assert_eq!(format_size(&0u64, false, 5).unwrap(), "0 B");
    }

    #[test]
    fn test_binary_and_decimal_suffixes() {
        assert_eq!(format_size(&1024u64, true, 2).unwrap(), "1.00 KiB");
        assert_eq!(format_size(&1000u64, false, 2).unwrap(), "1.00 kB");
        assert_eq!(format_size(&1023u64, true, 2).unwrap(), "1023.00 B");
        assert_eq!(format_size(&1_000_000u64, false, 1).unwrap(), "1.0 MB");
        assert_eq!(format_size(&(10 * 1024 * 1024 * 1024u64), true, 2).unwrap(), "10.00 GiB");
        assert_eq!(format_size(&1536u64, true, 3).unwrap(), "1.500 KiB");
    }

    #[test]
    fn test_largest_value_stays_in_range() {
        assert_eq!(format_size(&u64::MAX, true, 2).unwrap(), "16.00 EiB");
    }

    #[test]
    fn test_paths_are_summed() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.nc");
        let b = temp_dir.path().join("b.nc");
        fs::write(&a, vec![0u8; 1000]).unwrap();
        fs::write(&b, vec![0u8; 1048]).unwrap();

        assert_eq!(format_size(a.as_path(), false, 2).unwrap(), "1.00 kB");
        assert_eq!(format_size(&vec![a, b], true, 2).unwrap(), "2.00 KiB");
        assert_eq!(format_size(&Vec::<PathBuf>::new(), true, 2).unwrap(), "0 B");
    }

    #[test]
    fn test_missing_path_has_no_size() {
        assert!(format_size(Path::new("/no/such/file.nc"), true, 2).is_none());
    }
}
