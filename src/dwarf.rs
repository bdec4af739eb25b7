//! The top-level context owning the debugging sections of one file.

use std::sync::Arc;

use crate::abbrev::{Abbreviations, AbbreviationsCache, DebugAbbrev};
use crate::common::{DebugAbbrevOffset, DebugStrOffset, SectionId};
use crate::die::{Attribute, AttributeValue, Die};
use crate::endian_slice::EndianSlice;
use crate::endianity::Endianity;
use crate::error::{Error, Result};
use crate::unit::{
    CompilationUnit, CompilationUnitHeader, CompilationUnitHeadersIter, DebugInfo, DebugTypes,
    TreeEntry, TypeUnit, TypeUnitHeader, TypeUnitHeadersIter, Unit, UnitHeader,
};

/// A convenience trait for loading DWARF sections by identity.
pub trait Section<'input, Endian>: Sized
where
    Endian: Endianity,
{
    /// Which section this type represents.
    fn id() -> SectionId;

    /// The ELF section name for this type.
    fn section_name() -> &'static str {
        Self::id().name()
    }

    /// Construct this section from a byte slice.
    fn from_slice(section: &'input [u8]) -> Self;

    /// Construct this section by asking `loader` for its bytes.
    fn load<F, E>(loader: F) -> core::result::Result<Self, E>
    where
        F: FnOnce(SectionId) -> core::result::Result<&'input [u8], E>,
    {
        loader(Self::id()).map(Self::from_slice)
    }
}

impl<'input, Endian> Section<'input, Endian> for DebugAbbrev<'input, Endian>
where
    Endian: Endianity,
{
    fn id() -> SectionId {
        SectionId::DebugAbbrev
    }

    fn from_slice(section: &'input [u8]) -> Self {
        DebugAbbrev::new(section)
    }
}

impl<'input, Endian> Section<'input, Endian> for DebugInfo<'input, Endian>
where
    Endian: Endianity,
{
    fn id() -> SectionId {
        SectionId::DebugInfo
    }

    fn from_slice(section: &'input [u8]) -> Self {
        DebugInfo::new(section)
    }
}

impl<'input, Endian> Section<'input, Endian> for DebugTypes<'input, Endian>
where
    Endian: Endianity,
{
    fn id() -> SectionId {
        SectionId::DebugTypes
    }

    fn from_slice(section: &'input [u8]) -> Self {
        DebugTypes::new(section)
    }
}

/// The `DebugStr` struct represents the string table found in the
/// `.debug_str` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugStr<'input, Endian>
where
    Endian: Endianity,
{
    section: EndianSlice<'input, Endian>,
}

impl<'input, Endian> DebugStr<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `DebugStr` instance from the data in the `.debug_str`
    /// section.
    pub fn new(section: &'input [u8]) -> DebugStr<'input, Endian> {
        DebugStr {
            section: EndianSlice::new(section),
        }
    }

    /// Look up the null-terminated string at the given offset. The returned
    /// slice excludes the null byte.
    pub fn get_str(&self, offset: DebugStrOffset) -> Result<EndianSlice<'input, Endian>> {
        let mut input = self.section.range(offset.0, self.section.len())?;
        input.read_null_terminated()
    }

    pub(crate) fn section(&self) -> EndianSlice<'input, Endian> {
        self.section
    }
}

impl<'input, Endian> Section<'input, Endian> for DebugStr<'input, Endian>
where
    Endian: Endianity,
{
    fn id() -> SectionId {
        SectionId::DebugStr
    }

    fn from_slice(section: &'input [u8]) -> Self {
        DebugStr::new(section)
    }
}

/// The sections of one file's debugging information, and the caches shared
/// by all of its units.
///
/// Optionally carries the sections of a supplementary object file, which
/// imported-unit markers and supplementary references resolve against.
#[derive(Debug, Default)]
pub struct Dwarf<'input, Endian>
where
    Endian: Endianity,
{
    /// The `.debug_abbrev` section.
    pub debug_abbrev: DebugAbbrev<'input, Endian>,

    /// The `.debug_info` section.
    pub debug_info: DebugInfo<'input, Endian>,

    /// The `.debug_str` section.
    pub debug_str: DebugStr<'input, Endian>,

    /// The `.debug_types` section.
    pub debug_types: DebugTypes<'input, Endian>,

    /// Parsed abbreviation tables, shared by all units whose headers point
    /// at the same `.debug_abbrev` offset.
    pub abbreviations_cache: AbbreviationsCache,

    sup: Option<Arc<Dwarf<'input, Endian>>>,
}

impl<'input, Endian> Dwarf<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a context by asking `loader` for each section's bytes.
    pub fn load<F, E>(mut loader: F) -> core::result::Result<Dwarf<'input, Endian>, E>
    where
        F: FnMut(SectionId) -> core::result::Result<&'input [u8], E>,
    {
        Ok(Dwarf {
            debug_abbrev: Section::load(&mut loader)?,
            debug_info: Section::load(&mut loader)?,
            debug_str: Section::load(&mut loader)?,
            debug_types: Section::load(&mut loader)?,
            abbreviations_cache: AbbreviationsCache::new(),
            sup: None,
        })
    }

    /// Load the sections of the supplementary object file and attach them
    /// to this context.
    pub fn load_sup<F, E>(&mut self, loader: F) -> core::result::Result<(), E>
    where
        F: FnMut(SectionId) -> core::result::Result<&'input [u8], E>,
    {
        self.sup = Some(Arc::new(Self::load(loader)?));
        Ok(())
    }

    /// The supplementary object file's context, if one is attached.
    pub fn sup(&self) -> Option<&Dwarf<'input, Endian>> {
        self.sup.as_deref()
    }

    /// Iterate the compilation unit headers in `.debug_info`.
    pub fn units(&self) -> CompilationUnitHeadersIter<'input, Endian> {
        self.debug_info.units()
    }

    /// Iterate the type unit headers in `.debug_types`.
    pub fn type_units(&self) -> TypeUnitHeadersIter<'input, Endian> {
        self.debug_types.units()
    }

    /// Construct a compilation unit for the given header.
    pub fn unit(&self, header: CompilationUnitHeader) -> CompilationUnit<'_, 'input, Endian> {
        Unit::new(self, header)
    }

    /// Construct a type unit for the given header.
    pub fn type_unit(&self, header: TypeUnitHeader) -> TypeUnit<'_, 'input, Endian> {
        Unit::new(self, header)
    }

    /// The abbreviation table at the given `.debug_abbrev` offset, parsed
    /// at most once per distinct offset.
    pub fn abbreviations(&self, offset: DebugAbbrevOffset) -> Result<Arc<Abbreviations>> {
        self.abbreviations_cache.get(&self.debug_abbrev, offset)
    }

    /// Resolve a section-absolute `.debug_info` offset, such as the value
    /// of a `DW_FORM_ref_addr` reference, to the entry it names.
    ///
    /// Scans the compilation unit headers for the unit whose byte range
    /// contains `offset` and resolves the entry within it. When no unit's
    /// range contains the offset, the result is [`Error::NoUnitForOffset`].
    pub fn entry_at(&self, offset: usize) -> Result<Die<'input, Endian>> {
        let mut units = self.units();
        while let Some(header) = units.next()? {
            if header.contains(offset) {
                let mut unit = self.unit(header);
                let id = unit.entry_from_offset(offset)?;
                return Ok(unit.entry(id).clone());
            }
        }
        Err(Error::NoUnitForOffset(offset))
    }

    /// Resolve a section-absolute `.debug_info` offset and return the entry
    /// it names together with that entry's whole subtree, in depth-first
    /// pre-order with null terminator entries included.
    pub(crate) fn subtree_at(&self, offset: usize) -> Result<Vec<Die<'input, Endian>>> {
        let mut units = self.units();
        while let Some(header) = units.next()? {
            if header.contains(offset) {
                let mut unit = self.unit(header);
                let start = unit.entry_from_offset(offset)?;
                let mut dies = Vec::new();
                let mut entries = unit.entries_at(start);
                while let Some(entry) = entries.next()? {
                    match entry {
                        TreeEntry::Entry(id) => dies.push(entries.entry(id).clone()),
                        TreeEntry::Imported(die) => dies.push(die),
                    }
                }
                return Ok(dies);
            }
        }
        Err(Error::NoUnitForOffset(offset))
    }

    /// Return the string value of an attribute, following `.debug_str`
    /// references into this file and the supplementary file.
    pub fn attr_string(
        &self,
        attr: &Attribute<'input, Endian>,
    ) -> Option<EndianSlice<'input, Endian>> {
        match *attr.value() {
            AttributeValue::String(string) => Some(string),
            AttributeValue::DebugStrRef(offset) => self.debug_str.get_str(offset).ok(),
            AttributeValue::DebugStrRefSup(offset) => self
                .sup()
                .and_then(|sup| sup.debug_str.get_str(offset).ok()),
            _ => None,
        }
    }

    pub(crate) fn section(&self, id: SectionId) -> EndianSlice<'input, Endian> {
        match id {
            SectionId::DebugAbbrev => self.debug_abbrev.section(),
            SectionId::DebugInfo => self.debug_info.section(),
            SectionId::DebugStr => self.debug_str.section(),
            SectionId::DebugTypes => self.debug_types.section(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::endianity::LittleEndian;

    #[cfg_attr(rustfmt, rustfmt_skip)]
    const ABBREV_BUF: &[u8] = &[
        // Code 1: DW_TAG_compile_unit, DW_CHILDREN_yes,
        //         DW_AT_name: DW_FORM_string.
        0x01, 0x11, 0x01,
            0x03, 0x08,
        0x00, 0x00,

        // Code 2: DW_TAG_subprogram, DW_CHILDREN_no,
        //         DW_AT_name: DW_FORM_string.
        0x02, 0x2e, 0x00,
            0x03, 0x08,
        0x00, 0x00,

        // Null terminator.
        0x00,
    ];

    #[cfg_attr(rustfmt, rustfmt_skip)]
    const INFO_BUF: &[u8] = &[
        // First unit: length = 17.
        0x11, 0x00, 0x00, 0x00,
        // Version 4.
        0x04, 0x00,
        // debug_abbrev_offset = 0.
        0x00, 0x00, 0x00, 0x00,
        // Address size = 4.
        0x04,

        // Offset 11: root, code 1, name = "x".
        0x01, 0x78, 0x00,
        // Offset 14: child, code 2, name = "a".
        0x02, 0x61, 0x00,
        // Offset 17: child, code 2, name = "b".
        0x02, 0x62, 0x00,
        // Offset 20: null terminator.
        0x00,

        // Second unit at offset 21: length = 14.
        0x0e, 0x00, 0x00, 0x00,
        // Version 4.
        0x04, 0x00,
        // debug_abbrev_offset = 0.
        0x00, 0x00, 0x00, 0x00,
        // Address size = 4.
        0x04,

        // Offset 32: root, code 1, name = "y".
        0x01, 0x79, 0x00,
        // Offset 35: child, code 2, name = "c".
        0x02, 0x63, 0x00,
        // Offset 38: null terminator.
        0x00,
    ];

    const STR_BUF: &[u8] = b"hello\0world\0";

    fn test_dwarf() -> Dwarf<'static, LittleEndian> {
        Dwarf::load::<_, Error>(|id| {
            Ok(match id {
                SectionId::DebugAbbrev => ABBREV_BUF,
                SectionId::DebugInfo => INFO_BUF,
                SectionId::DebugStr => STR_BUF,
                SectionId::DebugTypes => &[],
            })
        })
        .expect("Should load sections")
    }

    #[test]
    fn test_load_and_iterate_units() {
        let dwarf = test_dwarf();
        let mut units = dwarf.units();
        let first = units.next().unwrap().expect("Should have first unit");
        let second = units.next().unwrap().expect("Should have second unit");
        assert_eq!(first.offset(), 0);
        assert_eq!(second.offset(), 21);
        assert_eq!(units.next(), Ok(None));
        assert_eq!(dwarf.type_units().next(), Ok(None));
    }

    #[test]
    fn test_abbreviations_shared_across_units() {
        let dwarf = test_dwarf();
        let first = dwarf
            .abbreviations(DebugAbbrevOffset(0))
            .expect("Should parse abbreviations");
        let second = dwarf
            .abbreviations(DebugAbbrevOffset(0))
            .expect("Should return cached abbreviations");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_get_str() {
        let dwarf = test_dwarf();
        let s = dwarf
            .debug_str
            .get_str(DebugStrOffset(6))
            .expect("Should find string");
        assert_eq!(s.slice(), b"world");
        match dwarf.debug_str.get_str(DebugStrOffset(100)) {
            Err(Error::UnexpectedEof) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    fn test_entry_at_finds_the_containing_unit() {
        let dwarf = test_dwarf();

        let die = dwarf.entry_at(35).expect("Should resolve entry");
        assert_eq!(die.offset(), 35);
        assert_eq!(die.tag(), Some(constants::DW_TAG_subprogram));

        let die = dwarf.entry_at(11).expect("Should resolve first root");
        assert_eq!(die.tag(), Some(constants::DW_TAG_compile_unit));
    }

    #[test]
    fn test_entry_at_range_errors() {
        let dwarf = test_dwarf();

        // Inside the first unit's header: the unit is found, but the offset
        // does not name an entry.
        match dwarf.entry_at(5) {
            Err(Error::OffsetOutOfUnitRange(5)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };

        // Past every unit.
        match dwarf.entry_at(100) {
            Err(Error::NoUnitForOffset(100)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    fn test_attr_string() {
        let dwarf = test_dwarf();
        let header = dwarf.units().next().unwrap().unwrap();
        let mut unit = dwarf.unit(header);
        let root = unit.root().expect("Should parse root");
        let attr = unit
            .entry(root)
            .attr(constants::DW_AT_name)
            .expect("Should have name")
            .clone();
        assert_eq!(dwarf.attr_string(&attr).map(|s| s.slice()), Some(&b"x"[..]));
    }
}
