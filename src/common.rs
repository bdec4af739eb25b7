//! Types and definitions shared by every module.

/// Whether the data is the 32-bit or 64-bit flavor of DWARF.
///
/// This is a property of each unit, not of the whole file: a single section
/// may mix both flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// 64-bit DWARF: section offsets are 8 bytes, and the unit length is
    /// prefixed with the `0xffff_ffff` escape.
    Dwarf64,
    /// 32-bit DWARF: section offsets are 4 bytes.
    Dwarf32,
}

impl Format {
    /// The size in bytes of a section offset in this format.
    #[inline]
    pub fn word_size(self) -> u8 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 8,
        }
    }

    /// The size in bytes of the initial length field, including the
    /// `0xffff_ffff` escape for 64-bit DWARF.
    #[inline]
    pub fn initial_length_size(self) -> usize {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 12,
        }
    }
}

/// The combination of unit header fields that parameterize attribute
/// decoding: the format width, the unit's version, and the size of a target
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// Whether the unit is 32-bit or 64-bit DWARF.
    pub format: Format,

    /// The unit's DWARF version.
    pub version: u16,

    /// The size of an address on the debuggee's target architecture, in
    /// bytes.
    pub address_size: u8,
}

/// An offset into the `.debug_info` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebugInfoOffset(pub usize);

/// An offset into the `.debug_types` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebugTypesOffset(pub usize);

/// An offset into the `.debug_abbrev` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugAbbrevOffset(pub usize);

/// An offset into the `.debug_str` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugStrOffset(pub usize);

/// An offset into the current compilation or type unit, relative to the
/// start of that unit's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitOffset(pub usize);

/// The `DW_AT_signature` of a type unit: a 64-bit hash uniquely identifying
/// the type described by that unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugTypeSignature(pub u64);

/// The identity of a DWARF section, used when loading sections by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// The `.debug_abbrev` section.
    DebugAbbrev,
    /// The `.debug_info` section.
    DebugInfo,
    /// The `.debug_str` section.
    DebugStr,
    /// The `.debug_types` section.
    DebugTypes,
}

impl SectionId {
    /// Returns the ELF section name for this kind of section.
    pub fn name(self) -> &'static str {
        match self {
            SectionId::DebugAbbrev => ".debug_abbrev",
            SectionId::DebugInfo => ".debug_info",
            SectionId::DebugStr => ".debug_str",
            SectionId::DebugTypes => ".debug_types",
        }
    }
}
