//! Types for compile-time endianity.

use byteorder::ByteOrder;
use core::fmt::Debug;

/// A trait describing the endianity of some buffer.
///
/// All methods are static; instances carry no data and exist only so that
/// the endianity can be chosen at compile time.
pub trait Endianity: Debug + Default + Clone + Copy + PartialEq + Eq {
    /// Return true for big endian byte order.
    fn is_big_endian() -> bool;

    /// Return true for little endian byte order.
    fn is_little_endian() -> bool {
        !Self::is_big_endian()
    }

    /// Read an unsigned 16 bit integer from the start of `buf`.
    ///
    /// # Panics
    ///
    /// Panics when `buf.len() < 2`.
    fn read_u16(buf: &[u8]) -> u16 {
        if Self::is_big_endian() {
            byteorder::BigEndian::read_u16(buf)
        } else {
            byteorder::LittleEndian::read_u16(buf)
        }
    }

    /// Read an unsigned 32 bit integer from the start of `buf`.
    ///
    /// # Panics
    ///
    /// Panics when `buf.len() < 4`.
    fn read_u32(buf: &[u8]) -> u32 {
        if Self::is_big_endian() {
            byteorder::BigEndian::read_u32(buf)
        } else {
            byteorder::LittleEndian::read_u32(buf)
        }
    }

    /// Read an unsigned 64 bit integer from the start of `buf`.
    ///
    /// # Panics
    ///
    /// Panics when `buf.len() < 8`.
    fn read_u64(buf: &[u8]) -> u64 {
        if Self::is_big_endian() {
            byteorder::BigEndian::read_u64(buf)
        } else {
            byteorder::LittleEndian::read_u64(buf)
        }
    }

    /// Read an unsigned `nbytes`-byte integer from the start of `buf`.
    ///
    /// # Panics
    ///
    /// Panics when `nbytes` is not in `1..=8` or `buf.len() < nbytes`.
    fn read_uint(buf: &[u8], nbytes: usize) -> u64 {
        if Self::is_big_endian() {
            byteorder::BigEndian::read_uint(buf, nbytes)
        } else {
            byteorder::LittleEndian::read_uint(buf, nbytes)
        }
    }
}

/// Little endian byte order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LittleEndian;

impl Endianity for LittleEndian {
    #[inline]
    fn is_big_endian() -> bool {
        false
    }
}

/// Big endian byte order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BigEndian;

impl Endianity for BigEndian {
    #[inline]
    fn is_big_endian() -> bool {
        true
    }
}

/// The native endianity for the target platform.
#[cfg(target_endian = "little")]
pub type NativeEndian = LittleEndian;

/// The native endianity for the target platform.
#[cfg(target_endian = "big")]
pub type NativeEndian = BigEndian;
