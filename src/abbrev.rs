//! Functions for parsing DWARF debugging abbreviations.

use std::collections::hash_map;
use std::sync::{Arc, Mutex};

use crate::common::DebugAbbrevOffset;
use crate::constants;
use crate::endian_slice::EndianSlice;
use crate::endianity::Endianity;
use crate::error::{Error, Result};

/// The `DebugAbbrev` struct represents the abbreviations describing
/// entries' attribute names and forms found in the `.debug_abbrev`
/// section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugAbbrev<'input, Endian>
where
    Endian: Endianity,
{
    section: EndianSlice<'input, Endian>,
}

impl<'input, Endian> DebugAbbrev<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `DebugAbbrev` instance from the data in the
    /// `.debug_abbrev` section.
    ///
    /// It is the caller's responsibility to read the `.debug_abbrev` section
    /// and present it as a `&[u8]` slice. That means using some ELF loader on
    /// Linux, a Mach-O loader on macOS, etc.
    pub fn new(section: &'input [u8]) -> DebugAbbrev<'input, Endian> {
        DebugAbbrev {
            section: EndianSlice::new(section),
        }
    }

    /// Parse the abbreviations at the given `offset` within this
    /// `.debug_abbrev` section.
    ///
    /// The `offset` should generally be retrieved from a unit header.
    pub fn abbreviations(&self, offset: DebugAbbrevOffset) -> Result<Abbreviations> {
        let mut input = self.section.range(offset.0, self.section.len())?;
        Abbreviations::parse(&mut input)
    }

    pub(crate) fn section(&self) -> EndianSlice<'input, Endian> {
        self.section
    }
}

/// A set of type abbreviations.
#[derive(Debug, Default, Clone)]
pub struct Abbreviations {
    abbrevs: hash_map::HashMap<u64, Abbreviation>,
}

impl Abbreviations {
    /// Construct a new, empty set of abbreviations.
    fn empty() -> Abbreviations {
        Abbreviations {
            abbrevs: hash_map::HashMap::new(),
        }
    }

    /// Insert an abbreviation into the set.
    ///
    /// Returns `Err` if the set already contains an abbreviation with the
    /// given abbreviation's code.
    fn insert(&mut self, abbrev: Abbreviation) -> core::result::Result<(), ()> {
        match self.abbrevs.entry(abbrev.code) {
            hash_map::Entry::Occupied(_) => Err(()),
            hash_map::Entry::Vacant(entry) => {
                entry.insert(abbrev);
                Ok(())
            }
        }
    }

    /// Get the abbreviation associated with the given code.
    #[inline]
    pub fn get(&self, code: u64) -> Option<&Abbreviation> {
        self.abbrevs.get(&code)
    }

    /// Parse a series of abbreviations, terminated by a null abbreviation.
    fn parse<Endian>(input: &mut EndianSlice<'_, Endian>) -> Result<Abbreviations>
    where
        Endian: Endianity,
    {
        let mut abbrevs = Abbreviations::empty();

        while let Some(abbrev) = Abbreviation::parse(input)? {
            let code = abbrev.code;
            if abbrevs.insert(abbrev).is_err() {
                return Err(Error::DuplicateAbbreviationCode(code));
            }
        }

        Ok(abbrevs)
    }
}

/// An abbreviation describes the shape of an entry's type: its code, tag
/// type, whether it has children, and its set of attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbreviation {
    code: u64,
    tag: constants::DwTag,
    has_children: constants::DwChildren,
    attributes: Vec<AttributeSpecification>,
}

impl Abbreviation {
    /// Construct a new `Abbreviation`.
    ///
    /// # Panics
    ///
    /// Panics if `code` is `0`.
    pub fn new(
        code: u64,
        tag: constants::DwTag,
        has_children: constants::DwChildren,
        attributes: Vec<AttributeSpecification>,
    ) -> Abbreviation {
        assert_ne!(code, 0);
        Abbreviation {
            code,
            tag,
            has_children,
            attributes,
        }
    }

    /// Get this abbreviation's code.
    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Get this abbreviation's tag.
    #[inline]
    pub fn tag(&self) -> constants::DwTag {
        self.tag
    }

    /// Return true if this abbreviation's type has children, false otherwise.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.has_children == constants::DW_CHILDREN_yes
    }

    /// Get this abbreviation's attributes.
    #[inline]
    pub fn attributes(&self) -> &[AttributeSpecification] {
        &self.attributes
    }

    /// Parse an abbreviation's tag.
    fn parse_tag<Endian>(input: &mut EndianSlice<'_, Endian>) -> Result<constants::DwTag>
    where
        Endian: Endianity,
    {
        let val = input.read_uleb128()?;
        if val == 0 {
            Err(Error::AbbreviationTagZero)
        } else {
            Ok(constants::DwTag(val))
        }
    }

    /// Parse an abbreviation's "does the type have children?" byte.
    fn parse_has_children<Endian>(
        input: &mut EndianSlice<'_, Endian>,
    ) -> Result<constants::DwChildren>
    where
        Endian: Endianity,
    {
        let val = constants::DwChildren(input.read_u8()?);
        if val == constants::DW_CHILDREN_no || val == constants::DW_CHILDREN_yes {
            Ok(val)
        } else {
            Err(Error::InvalidAbbreviationChildren(val))
        }
    }

    /// Parse a series of attribute specifications, terminated by a null
    /// attribute specification.
    fn parse_attributes<Endian>(
        input: &mut EndianSlice<'_, Endian>,
    ) -> Result<Vec<AttributeSpecification>>
    where
        Endian: Endianity,
    {
        let mut attrs = Vec::new();
        while let Some(attr) = AttributeSpecification::parse(input)? {
            attrs.push(attr);
        }
        Ok(attrs)
    }

    /// Parse an abbreviation. Return `None` for the null abbreviation that
    /// terminates a series.
    fn parse<Endian>(input: &mut EndianSlice<'_, Endian>) -> Result<Option<Abbreviation>>
    where
        Endian: Endianity,
    {
        let code = input.read_uleb128()?;
        if code == 0 {
            return Ok(None);
        }

        let tag = Self::parse_tag(input)?;
        let has_children = Self::parse_has_children(input)?;
        let attributes = Self::parse_attributes(input)?;
        Ok(Some(Abbreviation::new(code, tag, has_children, attributes)))
    }
}

/// The description of an attribute in an abbreviated type. It is a pair of
/// name and form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpecification {
    name: constants::DwAt,
    form: constants::DwForm,
}

impl AttributeSpecification {
    /// Construct a new `AttributeSpecification` from the given name and form.
    pub fn new(name: constants::DwAt, form: constants::DwForm) -> AttributeSpecification {
        AttributeSpecification { name, form }
    }

    /// Get the attribute's name.
    #[inline]
    pub fn name(&self) -> constants::DwAt {
        self.name
    }

    /// Get the attribute's form.
    #[inline]
    pub fn form(&self) -> constants::DwForm {
        self.form
    }

    /// Parse an attribute specification. Return `None` for the null
    /// specification that terminates an abbreviation's attribute list.
    fn parse<Endian>(input: &mut EndianSlice<'_, Endian>) -> Result<Option<AttributeSpecification>>
    where
        Endian: Endianity,
    {
        let name = input.read_uleb128()?;
        let form = input.read_uleb128()?;
        match (name, form) {
            (0, 0) => Ok(None),
            (0, _) => Err(Error::AttributeNameZero),
            (_, 0) => Err(Error::AttributeFormZero),
            (name, form) => Ok(Some(AttributeSpecification::new(
                constants::DwAt(name),
                constants::DwForm(form),
            ))),
        }
    }
}

/// A cache of parsed abbreviation tables, keyed by their offset within the
/// `.debug_abbrev` section.
///
/// Many units point their headers at the same abbreviation table; sharing
/// one `Arc<Abbreviations>` per distinct offset avoids reparsing it for
/// every unit. Only successful parses are cached, so a bad offset is
/// re-attempted (and fails again) rather than poisoning the table.
#[derive(Debug, Default)]
pub struct AbbreviationsCache {
    abbrevs: Mutex<hash_map::HashMap<usize, Arc<Abbreviations>>>,
}

impl AbbreviationsCache {
    /// Construct a new, empty cache.
    pub fn new() -> AbbreviationsCache {
        AbbreviationsCache::default()
    }

    /// Parse the abbreviations at the given offset, or return the
    /// previously parsed table for that offset.
    pub fn get<Endian>(
        &self,
        debug_abbrev: &DebugAbbrev<'_, Endian>,
        offset: DebugAbbrevOffset,
    ) -> Result<Arc<Abbreviations>>
    where
        Endian: Endianity,
    {
        let mut cache = self.abbrevs.lock().unwrap();
        if let Some(abbrevs) = cache.get(&offset.0) {
            return Ok(abbrevs.clone());
        }
        let abbrevs = Arc::new(debug_abbrev.abbreviations(offset)?);
        cache.insert(offset.0, abbrevs.clone());
        Ok(abbrevs)
    }
}
