//! Raw binary array loading for partition files.
//!
//! Partition files are flat little-endian dumps of fixed-width elements;
//! the element count is the file size divided by the element size. A
//! missing or unreadable file is a tolerated data error: it loads as an
//! empty array and the condition is logged.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::warn;

/// Fixed-width element decodable from little-endian bytes.
pub trait LeElement: Copy {
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! le_element {
    ($($t:ty),* $(,)?) => {$(
        impl LeElement for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline]
            fn decode(bytes: &[u8]) -> Self {
                <$t>::from_le_bytes(bytes.try_into().unwrap())
            }
        }
    )*};
}

le_element!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Load a flat array of `T` from `path`. Trailing bytes that do not fill a
/// whole element are ignored.
pub fn load_array<T: LeElement>(path: impl AsRef<Path>) -> Vec<T> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open partition file");
            return Vec::new();
        }
    };
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot map partition file");
            return Vec::new();
        }
    };
    decode_array(&mmap)
}

/// Decode a flat little-endian element array from a byte slice.
pub fn decode_array<T: LeElement>(bytes: &[u8]) -> Vec<T> {
    let count = bytes.len() / T::SIZE;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        out.push(T::decode(&bytes[i * T::SIZE..(i + 1) * T::SIZE]));
    }
    out
}
