//! The error type for parsing failures.
//!
//! There are two families of errors. Format errors mean the byte stream
//! itself is malformed or unsupported; they are fatal to the traversal that
//! hit them, because offsets past the failure point cannot be trusted.
//! Range errors (`OffsetOutOfUnitRange`, `NoUnitForOffset`) mean the caller
//! asked for an offset outside the declared byte range, which is a distinct
//! condition: the data may be fine and the caller's offset arithmetic wrong.

use core::fmt;
use core::result;

use crate::constants;

/// An error that occurred when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Hit the end of input before it was expected.
    UnexpectedEof,
    /// An error parsing an unsigned LEB128 value.
    BadUnsignedLeb128,
    /// An error parsing a signed LEB128 value.
    BadSignedLeb128,
    /// Found an unknown reserved initial length value.
    UnknownReservedLength(u32),
    /// Found a DWARF version we do not know how to parse.
    UnknownVersion(u64),
    /// An offset value was larger than this platform can address.
    UnsupportedOffset,
    /// An abbreviation declared that its tag is zero, but zero is reserved
    /// for null records.
    AbbreviationTagZero,
    /// An attribute specification declared that its name is zero, but zero
    /// is reserved for null records.
    AttributeNameZero,
    /// An attribute specification declared that its form is zero, but zero
    /// is reserved for null records.
    AttributeFormZero,
    /// The abbreviation's has-children byte was not one of
    /// `DW_CHILDREN_{yes,no}`.
    InvalidAbbreviationChildren(constants::DwChildren),
    /// Found an abbreviation code that has already been used.
    DuplicateAbbreviationCode(u64),
    /// An entry used an abbreviation code with no declaration in the unit's
    /// abbreviation table.
    InvalidAbbreviationCode(u64),
    /// Found an unknown `DW_FORM_*` value.
    UnknownForm(constants::DwForm),
    /// An attribute used a form that is not usable in its context, such as a
    /// sibling pointer in a non-reference form.
    UnsupportedAttributeForm(constants::DwForm),
    /// A reference escaped the byte range of the unit it was resolved
    /// against.
    OffsetOutOfUnitRange(usize),
    /// No unit's declared byte range contains the requested offset.
    NoUnitForOffset(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> result::Result<(), fmt::Error> {
        match *self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::BadUnsignedLeb128 => write!(f, "unsigned LEB128 overflow"),
            Error::BadSignedLeb128 => write!(f, "signed LEB128 overflow"),
            Error::UnknownReservedLength(val) => {
                write!(f, "unknown reserved length: 0x{val:x}")
            }
            Error::UnknownVersion(version) => write!(f, "unknown DWARF version: {version}"),
            Error::UnsupportedOffset => write!(f, "offset overflow"),
            Error::AbbreviationTagZero => write!(f, "invalid abbreviation tag: zero"),
            Error::AttributeNameZero => write!(f, "invalid attribute name: zero"),
            Error::AttributeFormZero => write!(f, "invalid attribute form: zero"),
            Error::InvalidAbbreviationChildren(val) => {
                write!(f, "invalid abbreviation children: 0x{:x}", val.0)
            }
            Error::DuplicateAbbreviationCode(val) => {
                write!(f, "duplicate abbreviation code: {val}")
            }
            Error::InvalidAbbreviationCode(val) => {
                write!(f, "invalid abbreviation code: {val}")
            }
            Error::UnknownForm(val) => write!(f, "unknown attribute form: 0x{:x}", val.0),
            Error::UnsupportedAttributeForm(val) => {
                write!(f, "unsupported attribute form: 0x{:x}", val.0)
            }
            Error::OffsetOutOfUnitRange(val) => {
                write!(f, "offset 0x{val:x} is outside the unit's range")
            }
            Error::NoUnitForOffset(val) => {
                write!(f, "no unit contains offset 0x{val:x}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// The result of a parse.
pub type Result<T> = result::Result<T, Error>;
