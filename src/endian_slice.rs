//! Working with byte slices that have an associated endianity.

use core::marker::PhantomData;

use crate::common::Format;
use crate::endianity::Endianity;
use crate::error::{Error, Result};

/// Convert a `u64` to a `usize`, failing when the value does not fit.
#[inline]
pub(crate) fn u64_to_offset(offset: u64) -> Result<usize> {
    usize::try_from(offset).map_err(|_| Error::UnsupportedOffset)
}

/// A `&[u8]` slice with compile-time endianity metadata.
///
/// This is the random-access, read-only byte source everything else decodes
/// from. Reads consume from the front of the slice; the original section
/// slice is never copied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    slice: &'input [u8],
    endian: PhantomData<Endian>,
}

impl<'input, Endian> EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `EndianSlice` over the given byte slice.
    #[inline]
    pub fn new(slice: &'input [u8]) -> EndianSlice<'input, Endian> {
        EndianSlice {
            slice,
            endian: PhantomData,
        }
    }

    /// The raw underlying slice of bytes.
    #[inline]
    pub fn slice(&self) -> &'input [u8] {
        self.slice
    }

    /// The number of bytes remaining.
    #[inline]
    pub fn len(&self) -> usize {
        self.slice.len()
    }

    /// Whether there are any bytes remaining.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slice.is_empty()
    }

    /// Return the subslice `start..end`, or `UnexpectedEof` when the range
    /// does not lie within this slice.
    pub fn range(&self, start: usize, end: usize) -> Result<EndianSlice<'input, Endian>> {
        if start > end || end > self.slice.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(EndianSlice::new(&self.slice[start..end]))
    }

    /// The distance in bytes of this slice's start from `base`'s start.
    ///
    /// `base` must be the slice this one was derived from.
    pub fn offset_from(&self, base: EndianSlice<'input, Endian>) -> usize {
        let base_ptr = base.slice.as_ptr() as usize;
        let ptr = self.slice.as_ptr() as usize;
        debug_assert!(base_ptr <= ptr);
        debug_assert!(ptr + self.slice.len() <= base_ptr + base.slice.len());
        ptr - base_ptr
    }

    /// Split off and return the first `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<EndianSlice<'input, Endian>> {
        if self.slice.len() < len {
            return Err(Error::UnexpectedEof);
        }
        let (taken, rest) = self.slice.split_at(len);
        self.slice = rest;
        Ok(EndianSlice::new(taken))
    }

    /// Advance past the next `len` bytes.
    #[inline]
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Read a `u8`.
    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.take(1)?;
        Ok(bytes.slice[0])
    }

    /// Read a `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(Endian::read_u16(bytes.slice))
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(Endian::read_u32(bytes.slice))
    }

    /// Read a `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(Endian::read_u64(bytes.slice))
    }

    /// Read an unsigned LEB128 encoded integer.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut rest = self.slice;
        let val = leb128::read::unsigned(&mut rest).map_err(|_| Error::BadUnsignedLeb128)?;
        self.slice = rest;
        Ok(val)
    }

    /// Read a signed LEB128 encoded integer.
    pub fn read_sleb128(&mut self) -> Result<i64> {
        let mut rest = self.slice;
        let val = leb128::read::signed(&mut rest).map_err(|_| Error::BadSignedLeb128)?;
        self.slice = rest;
        Ok(val)
    }

    /// Read an address of the given size.
    pub fn read_address(&mut self, address_size: u8) -> Result<u64> {
        match address_size {
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            n => {
                if n == 0 || n > 8 {
                    return Err(Error::UnsupportedOffset);
                }
                let bytes = self.take(usize::from(n))?;
                Ok(Endian::read_uint(bytes.slice, usize::from(n)))
            }
        }
    }

    /// Read a section offset of the size given by `format`.
    pub fn read_offset(&mut self, format: Format) -> Result<usize> {
        match format {
            Format::Dwarf32 => self.read_u32().map(|offset| offset as usize),
            Format::Dwarf64 => self.read_u64().and_then(u64_to_offset),
        }
    }

    /// Read the initial length field of a unit header and determine whether
    /// the unit is 32-bit or 64-bit DWARF.
    ///
    /// `0xffff_ffff` escapes to a 64-bit length; the remaining values at or
    /// above `0xffff_fff0` are reserved.
    pub fn read_initial_length(&mut self) -> Result<(u64, Format)> {
        let val = self.read_u32()?;
        if val < 0xffff_fff0 {
            Ok((u64::from(val), Format::Dwarf32))
        } else if val == 0xffff_ffff {
            self.read_u64().map(|val| (val, Format::Dwarf64))
        } else {
            Err(Error::UnknownReservedLength(val))
        }
    }

    /// Read a null-terminated byte sequence, excluding the final null byte,
    /// and advance past the null byte.
    pub fn read_null_terminated(&mut self) -> Result<EndianSlice<'input, Endian>> {
        let null = self
            .slice
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(Error::UnexpectedEof)?;
        let string = self.take(null)?;
        self.skip(1)?;
        Ok(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endianity::LittleEndian;
    use test_assembler::{Endian, Section};

    #[test]
    fn test_read_initial_length_32_ok() {
        let section = Section::with_endian(Endian::Little).L32(0x7856_3412);
        let buf = section.get_contents().unwrap();

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        match input.read_initial_length() {
            Ok((length, format)) => {
                assert_eq!(input.len(), 0);
                assert_eq!(format, Format::Dwarf32);
                assert_eq!(0x7856_3412, length);
            }
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_read_initial_length_64_ok() {
        let section = Section::with_endian(Endian::Little)
            .L32(0xffff_ffff)
            .L64(0x0123_4567_89ab_cdef);
        let buf = section.get_contents().unwrap();

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        match input.read_initial_length() {
            Ok((length, format)) => {
                assert_eq!(input.len(), 0);
                assert_eq!(format, Format::Dwarf64);
                assert_eq!(0x0123_4567_89ab_cdef, length);
            }
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_read_initial_length_unknown_reserved_value() {
        let section = Section::with_endian(Endian::Little).L32(0xffff_fffe);
        let buf = section.get_contents().unwrap();

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        match input.read_initial_length() {
            Err(Error::UnknownReservedLength(0xffff_fffe)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    fn test_read_initial_length_incomplete() {
        // Need at least 4 bytes.
        let buf = [0xff, 0xff, 0xff];

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        match input.read_initial_length() {
            Err(Error::UnexpectedEof) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    fn test_read_offset_32() {
        let section = Section::with_endian(Endian::Little).L32(0x0123_4567);
        let buf = section.get_contents().unwrap();

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.read_offset(Format::Dwarf32), Ok(0x0123_4567));
        assert_eq!(input.len(), 0);
    }

    #[test]
    fn test_read_offset_64() {
        let section = Section::with_endian(Endian::Little).L64(0x0123_4567);
        let buf = section.get_contents().unwrap();

        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.read_offset(Format::Dwarf64), Ok(0x0123_4567));
        assert_eq!(input.len(), 0);
    }

    #[test]
    fn test_read_uleb128() {
        let buf = [0xe5, 0x8e, 0x26, 0x01];
        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.read_uleb128(), Ok(624_485));
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_read_sleb128() {
        let buf = [0x9b, 0xf1, 0x59];
        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.read_sleb128(), Ok(-624_485));
        assert_eq!(input.len(), 0);
    }

    #[test]
    fn test_read_null_terminated() {
        let buf = [0x66, 0x6f, 0x6f, 0x00, 0x01];
        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        let string = input.read_null_terminated().unwrap();
        assert_eq!(string.slice(), b"foo");
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_read_null_terminated_no_null() {
        let buf = [0x66, 0x6f, 0x6f];
        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.read_null_terminated(), Err(Error::UnexpectedEof));
    }

    #[test]
    fn test_range() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        let input = EndianSlice::<LittleEndian>::new(&buf);
        assert_eq!(input.range(1, 3).unwrap().slice(), &[0x02, 0x03]);
        assert_eq!(input.range(2, 5), Err(Error::UnexpectedEof));
    }

    #[test]
    fn test_offset_from() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        let base = EndianSlice::<LittleEndian>::new(&buf);
        let derived = base.range(2, 4).unwrap();
        assert_eq!(derived.offset_from(base), 2);
    }
}
