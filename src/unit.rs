//! Units and the entry tree within a unit.
//!
//! A unit owns a lazily populated cache of its entries. Parsing an entry at
//! a given offset happens at most once for the unit's lifetime; navigation
//! (children, subtrees, references) works in terms of [`DieId`] handles into
//! that cache.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::abbrev::Abbreviations;
use crate::common::{
    DebugAbbrevOffset, DebugInfoOffset, DebugTypeSignature, Encoding, SectionId, UnitOffset,
};
use crate::constants;
use crate::die::{AttributeValue, Die, DieId};
use crate::dwarf::Dwarf;
use crate::endian_slice::{u64_to_offset, EndianSlice};
use crate::endianity::Endianity;
use crate::error::{Error, Result};

/// The `DebugInfo` struct represents the DWARF debugging information found
/// in the `.debug_info` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugInfo<'input, Endian>
where
    Endian: Endianity,
{
    section: EndianSlice<'input, Endian>,
}

impl<'input, Endian> DebugInfo<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `DebugInfo` instance from the data in the
    /// `.debug_info` section.
    pub fn new(section: &'input [u8]) -> DebugInfo<'input, Endian> {
        DebugInfo {
            section: EndianSlice::new(section),
        }
    }

    /// Iterate the compilation unit headers in this section.
    pub fn units(&self) -> CompilationUnitHeadersIter<'input, Endian> {
        CompilationUnitHeadersIter {
            input: self.section,
            offset: 0,
        }
    }

    pub(crate) fn section(&self) -> EndianSlice<'input, Endian> {
        self.section
    }
}

/// The `DebugTypes` struct represents the type units found in the
/// `.debug_types` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugTypes<'input, Endian>
where
    Endian: Endianity,
{
    section: EndianSlice<'input, Endian>,
}

impl<'input, Endian> DebugTypes<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `DebugTypes` instance from the data in the
    /// `.debug_types` section.
    pub fn new(section: &'input [u8]) -> DebugTypes<'input, Endian> {
        DebugTypes {
            section: EndianSlice::new(section),
        }
    }

    /// Iterate the type unit headers in this section.
    pub fn units(&self) -> TypeUnitHeadersIter<'input, Endian> {
        TypeUnitHeadersIter {
            input: self.section,
            offset: 0,
        }
    }

    pub(crate) fn section(&self) -> EndianSlice<'input, Endian> {
        self.section
    }
}

/// Header fields common to compilation unit and type unit headers.
pub trait UnitHeader: Clone {
    /// The offset of this header from the start of its section.
    fn offset(&self) -> usize;

    /// The number of bytes the whole unit occupies in its section,
    /// including the length field itself.
    fn size(&self) -> usize;

    /// The fields that parameterize attribute decoding for this unit.
    fn encoding(&self) -> Encoding;

    /// The offset of this unit's abbreviations within `.debug_abbrev`.
    fn debug_abbrev_offset(&self) -> DebugAbbrevOffset;

    /// The section offset of the unit's first entry, immediately after the
    /// header.
    fn first_entry_offset(&self) -> usize;

    /// The section this kind of unit is stored in.
    fn section_id(&self) -> SectionId;

    /// Whether the given section offset falls within this unit's bytes.
    fn contains(&self, offset: usize) -> bool {
        self.offset() <= offset && offset < self.offset() + self.size()
    }
}

/// The header of a compilation unit in the `.debug_info` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilationUnitHeader {
    offset: usize,
    unit_length: usize,
    encoding: Encoding,
    debug_abbrev_offset: DebugAbbrevOffset,
}

impl CompilationUnitHeader {
    /// The unit's DWARF version.
    pub fn version(&self) -> u16 {
        self.encoding.version
    }

    /// The size of an address on the debuggee's target architecture, in
    /// bytes.
    pub fn address_size(&self) -> u8 {
        self.encoding.address_size
    }

    /// The unit's declared length, excluding the length field itself.
    pub fn unit_length(&self) -> usize {
        self.unit_length
    }

    fn parse<Endian>(
        input: &mut EndianSlice<'_, Endian>,
        offset: usize,
    ) -> Result<CompilationUnitHeader>
    where
        Endian: Endianity,
    {
        let (unit_length, encoding, debug_abbrev_offset) = parse_header_fields(input)?;
        Ok(CompilationUnitHeader {
            offset,
            unit_length,
            encoding,
            debug_abbrev_offset,
        })
    }
}

impl UnitHeader for CompilationUnitHeader {
    fn offset(&self) -> usize {
        self.offset
    }

    fn size(&self) -> usize {
        self.unit_length + self.encoding.format.initial_length_size()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn debug_abbrev_offset(&self) -> DebugAbbrevOffset {
        self.debug_abbrev_offset
    }

    fn first_entry_offset(&self) -> usize {
        // Length, version, abbreviation offset, address size.
        self.offset
            + self.encoding.format.initial_length_size()
            + 2
            + usize::from(self.encoding.format.word_size())
            + 1
    }

    fn section_id(&self) -> SectionId {
        SectionId::DebugInfo
    }
}

/// The header of a type unit in the `.debug_types` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeUnitHeader {
    offset: usize,
    unit_length: usize,
    encoding: Encoding,
    debug_abbrev_offset: DebugAbbrevOffset,
    type_signature: DebugTypeSignature,
    type_offset: UnitOffset,
}

impl TypeUnitHeader {
    /// The unit's DWARF version.
    pub fn version(&self) -> u16 {
        self.encoding.version
    }

    /// The size of an address on the debuggee's target architecture, in
    /// bytes.
    pub fn address_size(&self) -> u8 {
        self.encoding.address_size
    }

    /// The unit's declared length, excluding the length field itself.
    pub fn unit_length(&self) -> usize {
        self.unit_length
    }

    /// The signature of the type this unit describes.
    pub fn type_signature(&self) -> DebugTypeSignature {
        self.type_signature
    }

    /// The unit-relative offset of the entry describing the type.
    pub fn type_offset(&self) -> UnitOffset {
        self.type_offset
    }

    fn parse<Endian>(input: &mut EndianSlice<'_, Endian>, offset: usize) -> Result<TypeUnitHeader>
    where
        Endian: Endianity,
    {
        let (unit_length, encoding, debug_abbrev_offset) = parse_header_fields(input)?;
        let type_signature = DebugTypeSignature(input.read_u64()?);
        let type_offset = UnitOffset(input.read_offset(encoding.format)?);
        Ok(TypeUnitHeader {
            offset,
            unit_length,
            encoding,
            debug_abbrev_offset,
            type_signature,
            type_offset,
        })
    }
}

impl UnitHeader for TypeUnitHeader {
    fn offset(&self) -> usize {
        self.offset
    }

    fn size(&self) -> usize {
        self.unit_length + self.encoding.format.initial_length_size()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn debug_abbrev_offset(&self) -> DebugAbbrevOffset {
        self.debug_abbrev_offset
    }

    fn first_entry_offset(&self) -> usize {
        // Length, version, abbreviation offset, address size, type
        // signature, type offset.
        self.offset
            + self.encoding.format.initial_length_size()
            + 2
            + usize::from(self.encoding.format.word_size())
            + 1
            + 8
            + usize::from(self.encoding.format.word_size())
    }

    fn section_id(&self) -> SectionId {
        SectionId::DebugTypes
    }
}

/// Parse the fields shared by both unit header layouts.
fn parse_header_fields<Endian>(
    input: &mut EndianSlice<'_, Endian>,
) -> Result<(usize, Encoding, DebugAbbrevOffset)>
where
    Endian: Endianity,
{
    let (unit_length, format) = input.read_initial_length()?;
    let unit_length = u64_to_offset(unit_length)?;
    let version = input.read_u16()?;
    if !(2..=4).contains(&version) {
        return Err(Error::UnknownVersion(u64::from(version)));
    }
    let debug_abbrev_offset = DebugAbbrevOffset(input.read_offset(format)?);
    let address_size = input.read_u8()?;
    Ok((
        unit_length,
        Encoding {
            format,
            version,
            address_size,
        },
        debug_abbrev_offset,
    ))
}

/// An iterator over the compilation unit headers in a `.debug_info` section.
///
/// A parse failure ends the iteration; the error is returned once and
/// subsequent calls yield `None`.
#[derive(Debug, Clone, Copy)]
pub struct CompilationUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    input: EndianSlice<'input, Endian>,
    offset: usize,
}

impl<'input, Endian> CompilationUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    /// Advance the iterator to the next unit header.
    pub fn next(&mut self) -> Result<Option<CompilationUnitHeader>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let offset = self.offset;
        let mut rest = self.input;
        match CompilationUnitHeader::parse(&mut rest, offset).and_then(|header| {
            self.input.skip(header.size())?;
            Ok(header)
        }) {
            Ok(header) => {
                self.offset += header.size();
                Ok(Some(header))
            }
            Err(e) => {
                self.input = EndianSlice::new(&[]);
                Err(e)
            }
        }
    }
}

impl<'input, Endian> fallible_iterator::FallibleIterator for CompilationUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    type Item = CompilationUnitHeader;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Self::Item>> {
        CompilationUnitHeadersIter::next(self)
    }
}

/// An iterator over the type unit headers in a `.debug_types` section.
///
/// A parse failure ends the iteration; the error is returned once and
/// subsequent calls yield `None`.
#[derive(Debug, Clone, Copy)]
pub struct TypeUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    input: EndianSlice<'input, Endian>,
    offset: usize,
}

impl<'input, Endian> TypeUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    /// Advance the iterator to the next unit header.
    pub fn next(&mut self) -> Result<Option<TypeUnitHeader>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let offset = self.offset;
        let mut rest = self.input;
        match TypeUnitHeader::parse(&mut rest, offset).and_then(|header| {
            self.input.skip(header.size())?;
            Ok(header)
        }) {
            Ok(header) => {
                self.offset += header.size();
                Ok(Some(header))
            }
            Err(e) => {
                self.input = EndianSlice::new(&[]);
                Err(e)
            }
        }
    }
}

impl<'input, Endian> fallible_iterator::FallibleIterator for TypeUnitHeadersIter<'input, Endian>
where
    Endian: Endianity,
{
    type Item = TypeUnitHeader;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Self::Item>> {
        TypeUnitHeadersIter::next(self)
    }
}

/// A single unit and its cache of parsed entries.
///
/// The cache is keyed by section offset and populated lazily: an entry is
/// parsed the first time any navigation path reaches its offset, and every
/// later path gets the same [`DieId`] back.
#[derive(Debug)]
pub struct Unit<'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    dwarf: &'ctx Dwarf<'input, Endian>,
    header: H,
    section: EndianSlice<'input, Endian>,
    abbrevs: Option<Arc<Abbreviations>>,
    // Arena of parsed entries plus an ascending-offset index into it. The
    // root is tracked separately so lookups at other offsets cannot
    // displace it.
    arena: Vec<Die<'input, Endian>>,
    index: Vec<(usize, DieId)>,
    root: Option<DieId>,
}

/// A compilation unit from the `.debug_info` section.
pub type CompilationUnit<'ctx, 'input, Endian> =
    Unit<'ctx, 'input, Endian, CompilationUnitHeader>;

/// A type unit from the `.debug_types` section.
pub type TypeUnit<'ctx, 'input, Endian> = Unit<'ctx, 'input, Endian, TypeUnitHeader>;

impl<'ctx, 'input, Endian, H> Unit<'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    /// Construct a unit for the given header, backed by `dwarf`'s sections.
    pub fn new(dwarf: &'ctx Dwarf<'input, Endian>, header: H) -> Unit<'ctx, 'input, Endian, H> {
        let section = dwarf.section(header.section_id());
        Unit {
            dwarf,
            header,
            section,
            abbrevs: None,
            arena: Vec::new(),
            index: Vec::new(),
            root: None,
        }
    }

    /// This unit's header.
    pub fn header(&self) -> &H {
        &self.header
    }

    /// Look up a cached entry by handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this unit.
    pub fn entry(&self, id: DieId) -> &Die<'input, Endian> {
        &self.arena[id.0]
    }

    fn die_mut(&mut self, id: DieId) -> &mut Die<'input, Endian> {
        &mut self.arena[id.0]
    }

    /// This unit's abbreviation table, parsed on first use and shared
    /// through the context's cache.
    pub fn abbreviations(&mut self) -> Result<Arc<Abbreviations>> {
        if let Some(ref abbrevs) = self.abbrevs {
            return Ok(abbrevs.clone());
        }
        let abbrevs = self
            .dwarf
            .abbreviations(self.header.debug_abbrev_offset())?;
        self.abbrevs = Some(abbrevs.clone());
        Ok(abbrevs)
    }

    /// Whether the root entry has been parsed and cached.
    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// The unit's root entry, parsed and cached on first call.
    ///
    /// Every other cache fill goes through [`Unit::cached_entry`], which
    /// caches the root first, so the root is parsed exactly once.
    pub fn root(&mut self) -> Result<DieId> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let offset = self.header.first_entry_offset();
        let mut die = self.parse_die(offset)?;
        die.translate_indirect_attributes();
        let id = self.insert(die);
        self.root = Some(id);
        Ok(id)
    }

    /// The entry at the given section offset, parsed at most once.
    pub fn cached_entry(&mut self, offset: usize) -> Result<DieId> {
        self.root()?;
        match self.index.binary_search_by_key(&offset, |&(o, _)| o) {
            Ok(pos) => Ok(self.index[pos].1),
            Err(_) => {
                let die = self.parse_die(offset)?;
                Ok(self.insert(die))
            }
        }
    }

    /// Resolve a section offset obtained from a reference attribute to an
    /// entry of this unit.
    ///
    /// The offset must be section-absolute; callers holding a unit-relative
    /// value add the unit's header offset first. An offset outside
    /// `first_entry_offset .. offset + size` is
    /// [`Error::OffsetOutOfUnitRange`], which leaves the cache untouched and
    /// says nothing about whether the underlying bytes are valid.
    pub fn entry_from_offset(&mut self, offset: usize) -> Result<DieId> {
        let start = self.header.first_entry_offset();
        let end = self.header.offset() + self.header.size();
        if offset < start || offset >= end {
            return Err(Error::OffsetOutOfUnitRange(offset));
        }
        self.cached_entry(offset)
    }

    /// Iterate the direct children of an entry.
    ///
    /// Yields nothing for entries whose abbreviation declares no children.
    /// Fetched children get their `parent` annotation set; reaching the
    /// terminating null entry records it on `die` and ends the iteration
    /// without yielding the null.
    pub fn children(&mut self, die: DieId) -> EntriesChildren<'_, 'ctx, 'input, Endian, H> {
        let entry = self.entry(die);
        let state = if entry.has_children() {
            ChildrenState::Start(entry.offset() + entry.size())
        } else {
            ChildrenState::Done
        };
        EntriesChildren {
            unit: self,
            parent: die,
            state,
        }
    }

    /// Iterate the whole unit tree in depth-first pre-order, starting at
    /// the root entry. Null terminator entries are included.
    pub fn entries(&mut self) -> Result<EntriesSubtree<'_, 'ctx, 'input, Endian, H>> {
        let root = self.root()?;
        Ok(self.entries_at(root))
    }

    /// Iterate the subtree below `die` in depth-first pre-order, starting
    /// with `die` itself. Null terminator entries are included.
    ///
    /// An imported-unit marker whose import reference points into the
    /// supplementary file is substituted with the referenced entry's whole
    /// subtree when the context has a supplementary file attached; the walk
    /// then resumes after the local marker. This substitution happens only
    /// on this path; [`Unit::children`] and [`Unit::entry_from_offset`]
    /// always yield the local marker.
    pub fn entries_at(&mut self, die: DieId) -> EntriesSubtree<'_, 'ctx, 'input, Endian, H> {
        EntriesSubtree {
            unit: self,
            start: Some(die),
            stack: Vec::new(),
            imported: VecDeque::new(),
        }
    }

    fn parse_die(&mut self, offset: usize) -> Result<Die<'input, Endian>> {
        let abbrevs = self.abbreviations()?;
        Die::parse(self.section, offset, self.header.encoding(), &abbrevs)
    }

    fn insert(&mut self, die: Die<'input, Endian>) -> DieId {
        let id = DieId(self.arena.len());
        let offset = die.offset();
        self.arena.push(die);
        let pos = self.index.partition_point(|&(o, _)| o < offset);
        self.index.insert(pos, (offset, id));
        id
    }

    /// The section offset one past the end of `child`'s whole subtree.
    fn next_sibling_offset(&mut self, child: DieId) -> Result<usize> {
        let (offset, size, has_children) = {
            let die = self.entry(child);
            (die.offset(), die.size(), die.has_children())
        };

        if !has_children {
            return Ok(offset + size);
        }

        if let Some(attr) = self.entry(child).attr(constants::DW_AT_sibling) {
            return match *attr.value() {
                AttributeValue::UnitRef(UnitOffset(offset)) => Ok(self.header.offset() + offset),
                AttributeValue::DebugInfoRef(DebugInfoOffset(offset)) => Ok(offset),
                _ => Err(Error::UnsupportedAttributeForm(attr.form())),
            };
        }

        // No shortcut. Walk the child's own children to exhaustion; that
        // discovers and records its terminator, and warms the cache for the
        // entries in between.
        let mut children = self.children(child);
        while children.next()?.is_some() {}
        let terminator = self
            .entry(child)
            .terminator()
            .ok_or(Error::UnexpectedEof)?;
        let terminator = self.entry(terminator);
        Ok(terminator.offset() + terminator.size())
    }
}

/// An iterator over the direct children of an entry.
///
/// Obtained from [`Unit::children`]. Can be re-created at any time; already
/// cached children are handed back without reparsing.
#[derive(Debug)]
pub struct EntriesChildren<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    unit: &'unit mut Unit<'ctx, 'input, Endian, H>,
    parent: DieId,
    state: ChildrenState,
}

#[derive(Debug, Clone, Copy)]
enum ChildrenState {
    /// Before the first child, which starts at the given offset.
    Start(usize),
    /// The offset to continue at is the given child's next-sibling offset,
    /// computed when the iterator is advanced.
    After(DieId),
    Done,
}

impl<'unit, 'ctx, 'input, Endian, H> EntriesChildren<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    /// Look up a cached entry while the iterator still borrows the unit.
    pub fn entry(&self, id: DieId) -> &Die<'input, Endian> {
        self.unit.entry(id)
    }

    /// Advance the iterator and return the next child.
    pub fn next(&mut self) -> Result<Option<DieId>> {
        let offset = match self.state {
            ChildrenState::Start(offset) => offset,
            ChildrenState::After(prev) => self.unit.next_sibling_offset(prev)?,
            ChildrenState::Done => return Ok(None),
        };

        let child = self.unit.cached_entry(offset)?;
        self.unit.die_mut(child).set_parent(self.parent);

        if self.unit.entry(child).is_null() {
            self.unit.die_mut(self.parent).set_terminator(child);
            self.state = ChildrenState::Done;
            return Ok(None);
        }

        self.state = ChildrenState::After(child);
        Ok(Some(child))
    }
}

impl<'unit, 'ctx, 'input, Endian, H> fallible_iterator::FallibleIterator
    for EntriesChildren<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    type Item = DieId;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Self::Item>> {
        EntriesChildren::next(self)
    }
}

/// An item yielded by [`EntriesSubtree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry<'input, Endian>
where
    Endian: Endianity,
{
    /// An entry in the iterating unit's cache.
    Entry(DieId),
    /// The supplementary file's entry substituted for an imported-unit
    /// marker.
    Imported(Die<'input, Endian>),
}

#[derive(Debug)]
struct SubtreeFrame {
    parent: DieId,
    next_offset: usize,
}

/// A depth-first pre-order iterator over a subtree, including the null
/// entries that terminate each child list.
///
/// Obtained from [`Unit::entries`] or [`Unit::entries_at`].
#[derive(Debug)]
pub struct EntriesSubtree<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    unit: &'unit mut Unit<'ctx, 'input, Endian, H>,
    start: Option<DieId>,
    stack: Vec<SubtreeFrame>,
    // Supplementary entries still to yield for the marker most recently
    // substituted.
    imported: VecDeque<Die<'input, Endian>>,
}

impl<'unit, 'ctx, 'input, Endian, H> EntriesSubtree<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    /// Look up a cached entry while the iterator still borrows the unit.
    pub fn entry(&self, id: DieId) -> &Die<'input, Endian> {
        self.unit.entry(id)
    }

    /// Advance the iterator and return the next entry of the subtree.
    pub fn next(&mut self) -> Result<Option<TreeEntry<'input, Endian>>> {
        if let Some(die) = self.imported.pop_front() {
            return Ok(Some(TreeEntry::Imported(die)));
        }

        if let Some(root) = self.start.take() {
            let (has_children, end) = {
                let die = self.unit.entry(root);
                (die.has_children(), die.offset() + die.size())
            };
            if has_children {
                self.stack.push(SubtreeFrame {
                    parent: root,
                    next_offset: end,
                });
            }
            return self.resolve(root).map(Some);
        }

        let (parent, offset) = match self.stack.last() {
            Some(frame) => (frame.parent, frame.next_offset),
            None => return Ok(None),
        };

        let child = self.unit.cached_entry(offset)?;
        self.unit.die_mut(child).set_parent(parent);

        let (is_null, end, has_children) = {
            let die = self.unit.entry(child);
            (die.is_null(), die.offset() + die.size(), die.has_children())
        };

        if is_null {
            self.unit.die_mut(parent).set_terminator(child);
            self.stack.pop();
            // Resume the enclosing child list after the list that just
            // closed.
            if let Some(outer) = self.stack.last_mut() {
                outer.next_offset = end;
            }
            return Ok(Some(TreeEntry::Entry(child)));
        }

        if has_children {
            self.stack.push(SubtreeFrame {
                parent: child,
                next_offset: end,
            });
        } else if let Some(frame) = self.stack.last_mut() {
            frame.next_offset = end;
        }

        self.resolve(child).map(Some)
    }

    /// Substitute an imported-unit marker with the supplementary subtree it
    /// refers to, when possible.
    ///
    /// The referenced entry is returned and the rest of its subtree is
    /// queued, so the caller's walk continues after the local marker once
    /// the queue drains.
    fn resolve(&mut self, id: DieId) -> Result<TreeEntry<'input, Endian>> {
        let die = self.unit.entry(id);
        if die.tag() == Some(constants::DW_TAG_imported_unit) {
            if let (Some(attr), Some(sup)) =
                (die.attr(constants::DW_AT_import), self.unit.dwarf.sup())
            {
                if let AttributeValue::DebugInfoRefSup(offset) = *attr.value() {
                    let mut dies = sup.subtree_at(offset.0)?.into_iter();
                    let first = dies.next().ok_or(Error::UnexpectedEof)?;
                    self.imported.extend(dies);
                    return Ok(TreeEntry::Imported(first));
                }
            }
        }
        Ok(TreeEntry::Entry(id))
    }
}

impl<'unit, 'ctx, 'input, Endian, H> fallible_iterator::FallibleIterator
    for EntriesSubtree<'unit, 'ctx, 'input, Endian, H>
where
    Endian: Endianity,
    H: UnitHeader,
{
    type Item = TreeEntry<'input, Endian>;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Self::Item>> {
        EntriesSubtree::next(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abbrev::DebugAbbrev;
    use crate::common::Format;
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
        // Unit length = 17.
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
        // Offset 20: null terminator of the root's children.
        0x00,
    ];

    #[cfg_attr(rustfmt, rustfmt_skip)]
    const TYPES_BUF: &[u8] = &[
        // Unit length = 26.
        0x1a, 0x00, 0x00, 0x00,
        // Version 4.
        0x04, 0x00,
        // debug_abbrev_offset = 0.
        0x00, 0x00, 0x00, 0x00,
        // Address size = 4.
        0x04,
        // Type signature.
        0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
        // Type offset (unit-relative).
        0x1a, 0x00, 0x00, 0x00,

        // Offset 23: root, code 1, name = "t".
        0x01, 0x74, 0x00,
        // Offset 26: child, code 2, name = "u".
        0x02, 0x75, 0x00,
        // Offset 29: null terminator.
        0x00,
    ];

    fn test_dwarf() -> Dwarf<'static, LittleEndian> {
        let mut dwarf = Dwarf::default();
        dwarf.debug_abbrev = DebugAbbrev::new(ABBREV_BUF);
        dwarf.debug_info = DebugInfo::new(INFO_BUF);
        dwarf.debug_types = DebugTypes::new(TYPES_BUF);
        dwarf
    }

    fn name_of<'input>(die: &Die<'input, LittleEndian>) -> &'input [u8] {
        match die.attr(constants::DW_AT_name).map(|attr| attr.value()) {
            Some(&AttributeValue::String(s)) => s.slice(),
            otherwise => panic!("Unexpected attribute value: {:?}", otherwise),
        }
    }

    #[test]
    fn test_units_parse_compilation_unit_header() {
        let dwarf = test_dwarf();
        let mut units = dwarf.debug_info.units();

        let header = units
            .next()
            .expect("Should parse unit header")
            .expect("Should have a unit");
        assert_eq!(header.offset(), 0);
        assert_eq!(header.unit_length(), 17);
        assert_eq!(header.size(), 21);
        assert_eq!(header.version(), 4);
        assert_eq!(header.debug_abbrev_offset(), DebugAbbrevOffset(0));
        assert_eq!(header.address_size(), 4);
        assert_eq!(header.encoding().format, Format::Dwarf32);
        assert_eq!(header.first_entry_offset(), 11);
        assert!(header.contains(0));
        assert!(header.contains(20));
        assert!(!header.contains(21));

        assert_eq!(units.next(), Ok(None));
    }

    #[test]
    fn test_units_parse_type_unit_header() {
        let dwarf = test_dwarf();
        let mut units = dwarf.debug_types.units();

        let header = units
            .next()
            .expect("Should parse unit header")
            .expect("Should have a unit");
        assert_eq!(header.offset(), 0);
        assert_eq!(header.size(), 30);
        assert_eq!(header.type_signature(), DebugTypeSignature(0x8877_6655_4433_2211));
        assert_eq!(header.type_offset(), UnitOffset(26));
        assert_eq!(header.first_entry_offset(), 23);

        assert_eq!(units.next(), Ok(None));
    }

    #[test]
    fn test_units_unknown_version() {
        let buf = [
            0x07, 0x00, 0x00, 0x00, // Unit length = 7.
            0x2a, 0x00, // Version 42.
            0x00, 0x00, 0x00, 0x00, // debug_abbrev_offset.
            0x04, // Address size.
        ];
        let debug_info = DebugInfo::<LittleEndian>::new(&buf);
        let mut units = debug_info.units();
        match units.next() {
            Err(Error::UnknownVersion(42)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
        // The error ends the iteration.
        assert_eq!(units.next(), Ok(None));
    }

    #[test]
    fn test_root_is_cached() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);

        assert!(!unit.has_root());
        let root = unit.root().expect("Should parse root");
        assert!(unit.has_root());
        assert_eq!(unit.root().expect("Should return cached root"), root);

        let die = unit.entry(root);
        assert_eq!(die.offset(), 11);
        assert_eq!(die.tag(), Some(constants::DW_TAG_compile_unit));
        assert_eq!(name_of(die), b"x");
        assert_eq!(die.parent(), None);
    }

    #[test]
    fn test_children_and_terminator() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);
        let root = unit.root().unwrap();

        let mut children = unit.children(root);
        let a = children.next().unwrap().expect("Should yield first child");
        let b = children.next().unwrap().expect("Should yield second child");
        assert_eq!(children.next(), Ok(None));
        assert_eq!(children.next(), Ok(None));

        assert_eq!(name_of(unit.entry(a)), b"a");
        assert_eq!(name_of(unit.entry(b)), b"b");
        assert_eq!(unit.entry(a).parent(), Some(root));
        assert_eq!(unit.entry(b).parent(), Some(root));

        let terminator = unit
            .entry(root)
            .terminator()
            .expect("Terminator should be recorded");
        assert!(unit.entry(terminator).is_null());
        assert_eq!(unit.entry(terminator).offset(), 20);
    }

    #[test]
    fn test_children_of_leaf_is_empty() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);
        let root = unit.root().unwrap();
        let a = unit.children(root).next().unwrap().unwrap();

        let mut children = unit.children(a);
        assert_eq!(children.next(), Ok(None));
    }

    #[test]
    fn test_root_survives_in_header_offset_lookup() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);
        let root = unit.root().expect("Should parse root");

        // Offset 5 is inside the unit header; the byte there happens to
        // parse as a null entry with a smaller offset than the root's.
        let stray = unit.cached_entry(5).expect("Should parse the stray offset");
        assert!(unit.entry(stray).is_null());

        assert!(unit.has_root());
        assert_eq!(unit.root().expect("Root stays cached"), root);
    }

    #[test]
    fn test_cached_entry_is_idempotent() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);

        let first = unit.cached_entry(14).expect("Should parse entry");
        let second = unit.cached_entry(14).expect("Should return cached entry");
        assert_eq!(first, second);
        assert!(unit.has_root());
    }

    #[test]
    fn test_entry_from_offset_bounds() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);

        // One before the first entry: inside the header, not resolvable.
        match unit.entry_from_offset(10) {
            Err(Error::OffsetOutOfUnitRange(10)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
        // One past the end of the unit.
        match unit.entry_from_offset(21) {
            Err(Error::OffsetOutOfUnitRange(21)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
        // At the first entry.
        let root = unit.root().unwrap();
        assert_eq!(unit.entry_from_offset(11), Ok(root));
        // The last valid offset, the null entry.
        let terminator = unit.entry_from_offset(20).expect("Should parse null entry");
        assert!(unit.entry(terminator).is_null());
    }

    #[test]
    fn test_entries_preorder_includes_nulls() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_info.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);

        let mut ids = Vec::new();
        let mut entries = unit.entries().expect("Should build subtree iterator");
        while let Some(entry) = entries.next().expect("Should iterate subtree") {
            match entry {
                TreeEntry::Entry(id) => ids.push(id),
                TreeEntry::Imported(_) => panic!("No imports in this unit"),
            }
        }
        let offsets: Vec<_> = ids.iter().map(|&id| unit.entry(id).offset()).collect();
        assert_eq!(offsets, [11, 14, 17, 20]);
    }

    #[test]
    fn test_type_unit_navigation() {
        let dwarf = test_dwarf();
        let header = dwarf.debug_types.units().next().unwrap().unwrap();
        let mut unit = Unit::new(&dwarf, header);

        let root = unit.root().expect("Should parse type unit root");
        assert_eq!(unit.entry(root).offset(), 23);
        assert_eq!(name_of(unit.entry(root)), b"t");

        let mut children = unit.children(root);
        let child = children.next().unwrap().expect("Should yield child");
        assert_eq!(children.next(), Ok(None));
        assert_eq!(name_of(unit.entry(child)), b"u");
    }
}
