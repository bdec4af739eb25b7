//! Debugging information entries and their attribute values.

use crate::abbrev::{Abbreviations, AttributeSpecification};
use crate::common::{DebugInfoOffset, DebugStrOffset, DebugTypeSignature, Encoding, UnitOffset};
use crate::constants;
use crate::endian_slice::EndianSlice;
use crate::endianity::Endianity;
use crate::error::{Error, Result};

/// A handle to an entry in a unit's cache.
///
/// Handles are only meaningful for the unit that produced them. Two handles
/// compare equal exactly when they designate the same cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DieId(pub(crate) usize);

/// A parsed debugging information entry.
///
/// An entry is immutable once parsed, apart from the `parent` and
/// `terminator` annotations that navigation fills in lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Die<'input, Endian>
where
    Endian: Endianity,
{
    offset: usize,
    tag: Option<constants::DwTag>,
    has_children: bool,
    size: usize,
    attrs: Vec<Attribute<'input, Endian>>,
    parent: Option<DieId>,
    terminator: Option<DieId>,
}

impl<'input, Endian> Die<'input, Endian>
where
    Endian: Endianity,
{
    /// The offset of this entry from the start of its section.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// This entry's tag, or `None` for a null entry.
    #[inline]
    pub fn tag(&self) -> Option<constants::DwTag> {
        self.tag
    }

    /// Whether this is a null entry, i.e. a child-list terminator.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.tag.is_none()
    }

    /// Whether this entry's abbreviation declares children.
    ///
    /// Null entries never have children.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// The number of bytes this entry occupies in its section, including
    /// the abbreviation code.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// This entry's attributes, in the order the abbreviation declares them.
    #[inline]
    pub fn attrs(&self) -> &[Attribute<'input, Endian>] {
        &self.attrs
    }

    /// Find the first attribute with the given name.
    pub fn attr(&self, name: constants::DwAt) -> Option<&Attribute<'input, Endian>> {
        self.attrs.iter().find(|attr| attr.name() == name)
    }

    /// The entry's parent, once navigation has discovered it.
    ///
    /// The root entry has no parent. For any other entry this is `None`
    /// until the entry has been reached through its parent's children.
    #[inline]
    pub fn parent(&self) -> Option<DieId> {
        self.parent
    }

    /// The null entry terminating this entry's children, once child
    /// iteration has run to completion for it.
    #[inline]
    pub fn terminator(&self) -> Option<DieId> {
        self.terminator
    }

    pub(crate) fn set_parent(&mut self, parent: DieId) {
        if self.parent.is_none() {
            self.parent = Some(parent);
        }
    }

    pub(crate) fn set_terminator(&mut self, terminator: DieId) {
        if self.terminator.is_none() {
            self.terminator = Some(terminator);
        }
    }

    /// Rewrite attributes parsed from `DW_FORM_indirect` to their concrete
    /// form and value.
    ///
    /// Only applied to a unit's root entry, where consumers expect to see
    /// the concrete forms directly.
    pub(crate) fn translate_indirect_attributes(&mut self) {
        for attr in &mut self.attrs {
            if let AttributeValue::Indirect { form, ref value } = attr.value {
                let value = (**value).clone();
                attr.form = form;
                attr.value = value;
            }
        }
    }

    /// Parse the entry at `offset` within `section`.
    ///
    /// `section` must be the full section slice so that `offset` is
    /// section-absolute. A code of zero produces a null entry with no
    /// attributes.
    pub(crate) fn parse(
        section: EndianSlice<'input, Endian>,
        offset: usize,
        encoding: Encoding,
        abbrevs: &Abbreviations,
    ) -> Result<Die<'input, Endian>> {
        let mut input = section.range(offset, section.len())?;

        let code = input.read_uleb128()?;
        if code == 0 {
            return Ok(Die {
                offset,
                tag: None,
                has_children: false,
                size: input.offset_from(section) - offset,
                attrs: Vec::new(),
                parent: None,
                terminator: None,
            });
        }

        let abbrev = abbrevs
            .get(code)
            .ok_or(Error::InvalidAbbreviationCode(code))?;

        let mut attrs = Vec::with_capacity(abbrev.attributes().len());
        for spec in abbrev.attributes() {
            attrs.push(parse_attribute(&mut input, encoding, *spec)?);
        }

        Ok(Die {
            offset,
            tag: Some(abbrev.tag()),
            has_children: abbrev.has_children(),
            size: input.offset_from(section) - offset,
            attrs,
            parent: None,
            terminator: None,
        })
    }
}

/// An attribute in an entry, consisting of a name, the form it was encoded
/// with, and its value.
///
/// The form is retained because reference-class values need to be
/// reinterpreted relative to their unit or section by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'input, Endian>
where
    Endian: Endianity,
{
    name: constants::DwAt,
    form: constants::DwForm,
    value: AttributeValue<'input, Endian>,
}

impl<'input, Endian> Attribute<'input, Endian>
where
    Endian: Endianity,
{
    /// Get this attribute's name.
    #[inline]
    pub fn name(&self) -> constants::DwAt {
        self.name
    }

    /// Get the form this attribute's value was encoded with.
    #[inline]
    pub fn form(&self) -> constants::DwForm {
        self.form
    }

    /// Get this attribute's value.
    #[inline]
    pub fn value(&self) -> &AttributeValue<'input, Endian> {
        &self.value
    }

    /// Try to convert this attribute's value to an unsigned integer.
    pub fn udata_value(&self) -> Option<u64> {
        Some(match self.value {
            AttributeValue::Data1(ref data) => u64::from(data[0]),
            AttributeValue::Data2(ref data) => u64::from(Endian::read_u16(data)),
            AttributeValue::Data4(ref data) => u64::from(Endian::read_u32(data)),
            AttributeValue::Data8(ref data) => Endian::read_u64(data),
            AttributeValue::Udata(data) => data,
            _ => return None,
        })
    }

    /// Try to convert this attribute's value to a signed integer.
    pub fn sdata_value(&self) -> Option<i64> {
        Some(match self.value {
            AttributeValue::Data1(ref data) => i64::from(data[0] as i8),
            AttributeValue::Data2(ref data) => i64::from(Endian::read_u16(data) as i16),
            AttributeValue::Data4(ref data) => i64::from(Endian::read_u32(data) as i32),
            AttributeValue::Data8(ref data) => Endian::read_u64(data) as i64,
            AttributeValue::Sdata(data) => data,
            _ => return None,
        })
    }
}

/// The value of an attribute in an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue<'input, Endian>
where
    Endian: Endianity,
{
    /// "Refers to some location in the address space of the described
    /// program."
    Addr(u64),

    /// A slice of an arbitrary number of bytes.
    Block(EndianSlice<'input, Endian>),

    /// A one byte constant data value. How to interpret the byte depends on
    /// context.
    Data1([u8; 1]),

    /// A two byte constant data value. How to interpret the bytes depends on
    /// context.
    Data2([u8; 2]),

    /// A four byte constant data value. How to interpret the bytes depends
    /// on context.
    Data4([u8; 4]),

    /// An eight byte constant data value. How to interpret the bytes depends
    /// on context.
    Data8([u8; 8]),

    /// A signed integer constant.
    Sdata(i64),

    /// An unsigned integer constant.
    Udata(u64),

    /// "The information bytes contain a DWARF expression or location
    /// description."
    Exprloc(EndianSlice<'input, Endian>),

    /// A boolean typically used to describe the presence or absence of
    /// another attribute.
    Flag(bool),

    /// An offset into another section. Which section this is an offset into
    /// depends on context.
    SecOffset(usize),

    /// An offset into the current unit, relative to the start of its header.
    UnitRef(UnitOffset),

    /// An offset into the `.debug_info` section of the current file, but
    /// possibly a different unit from the current one.
    DebugInfoRef(DebugInfoOffset),

    /// An offset into the `.debug_info` section of the supplementary object
    /// file.
    DebugInfoRefSup(DebugInfoOffset),

    /// A type signature.
    DebugTypesRef(DebugTypeSignature),

    /// An offset into the `.debug_str` section.
    DebugStrRef(DebugStrOffset),

    /// An offset into the `.debug_str` section of the supplementary object
    /// file.
    DebugStrRefSup(DebugStrOffset),

    /// A null terminated byte sequence, excluding the final null byte. Not
    /// guaranteed to be UTF-8 or anything like that.
    String(EndianSlice<'input, Endian>),

    /// A value encoded behind `DW_FORM_indirect`: the concrete form read
    /// from the entry's data, and the value decoded with that form.
    Indirect {
        /// The concrete form.
        form: constants::DwForm,
        /// The value decoded with the concrete form.
        value: Box<AttributeValue<'input, Endian>>,
    },
}

fn length_u8_value<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
) -> Result<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    let len = input.read_u8()?;
    input.take(usize::from(len))
}

fn length_u16_value<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
) -> Result<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    let len = input.read_u16()?;
    input.take(usize::from(len))
}

fn length_u32_value<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
) -> Result<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    let len = input.read_u32()?;
    input.take(len as usize)
}

fn length_uleb_value<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
) -> Result<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    let len = input.read_uleb128()?;
    let len = crate::endian_slice::u64_to_offset(len)?;
    input.take(len)
}

fn read_u8_array<A, Endian>(input: &mut EndianSlice<'_, Endian>) -> Result<A>
where
    A: Default + AsMut<[u8]>,
    Endian: Endianity,
{
    let mut array = A::default();
    let len = array.as_mut().len();
    let bytes = input.take(len)?;
    array.as_mut().copy_from_slice(bytes.slice());
    Ok(array)
}

/// Parse an attribute specified by `spec`, advancing `input` past its
/// encoded value.
pub(crate) fn parse_attribute<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
    encoding: Encoding,
    spec: AttributeSpecification,
) -> Result<Attribute<'input, Endian>>
where
    Endian: Endianity,
{
    let value = parse_form_value(input, encoding, spec.form())?;
    Ok(Attribute {
        name: spec.name(),
        form: spec.form(),
        value,
    })
}

/// Parse a single value encoded with the given form.
fn parse_form_value<'input, Endian>(
    input: &mut EndianSlice<'input, Endian>,
    encoding: Encoding,
    form: constants::DwForm,
) -> Result<AttributeValue<'input, Endian>>
where
    Endian: Endianity,
{
    let value = match form {
        constants::DW_FORM_indirect => {
            // The concrete form is stored with the value, not in the
            // abbreviation. Decode with it and keep the pair so the caller
            // can see the concrete encoding.
            let concrete = constants::DwForm(input.read_uleb128()?);
            if concrete == constants::DW_FORM_indirect {
                return Err(Error::UnknownForm(concrete));
            }
            let value = parse_form_value(input, encoding, concrete)?;
            AttributeValue::Indirect {
                form: concrete,
                value: Box::new(value),
            }
        }
        constants::DW_FORM_addr => {
            let addr = input.read_address(encoding.address_size)?;
            AttributeValue::Addr(addr)
        }
        constants::DW_FORM_block1 => AttributeValue::Block(length_u8_value(input)?),
        constants::DW_FORM_block2 => AttributeValue::Block(length_u16_value(input)?),
        constants::DW_FORM_block4 => AttributeValue::Block(length_u32_value(input)?),
        constants::DW_FORM_block => AttributeValue::Block(length_uleb_value(input)?),
        constants::DW_FORM_data1 => AttributeValue::Data1(read_u8_array(input)?),
        constants::DW_FORM_data2 => AttributeValue::Data2(read_u8_array(input)?),
        constants::DW_FORM_data4 => AttributeValue::Data4(read_u8_array(input)?),
        constants::DW_FORM_data8 => AttributeValue::Data8(read_u8_array(input)?),
        constants::DW_FORM_udata => AttributeValue::Udata(input.read_uleb128()?),
        constants::DW_FORM_sdata => AttributeValue::Sdata(input.read_sleb128()?),
        constants::DW_FORM_exprloc => AttributeValue::Exprloc(length_uleb_value(input)?),
        constants::DW_FORM_flag => {
            let present = input.read_u8()?;
            AttributeValue::Flag(present != 0)
        }
        constants::DW_FORM_flag_present => {
            // This form has no representation in the entry's data; the
            // abbreviation alone asserts the flag.
            AttributeValue::Flag(true)
        }
        constants::DW_FORM_sec_offset => {
            AttributeValue::SecOffset(input.read_offset(encoding.format)?)
        }
        constants::DW_FORM_ref1 => {
            let reference = input.read_u8()?;
            AttributeValue::UnitRef(UnitOffset(usize::from(reference)))
        }
        constants::DW_FORM_ref2 => {
            let reference = input.read_u16()?;
            AttributeValue::UnitRef(UnitOffset(usize::from(reference)))
        }
        constants::DW_FORM_ref4 => {
            let reference = input.read_u32()?;
            AttributeValue::UnitRef(UnitOffset(reference as usize))
        }
        constants::DW_FORM_ref8 => {
            let reference = input.read_u64()?;
            AttributeValue::UnitRef(UnitOffset(crate::endian_slice::u64_to_offset(reference)?))
        }
        constants::DW_FORM_ref_udata => {
            let reference = input.read_uleb128()?;
            AttributeValue::UnitRef(UnitOffset(crate::endian_slice::u64_to_offset(reference)?))
        }
        constants::DW_FORM_ref_addr => {
            // DWARF version 2 made this the same size as a target address;
            // version 3 changed it to a section offset.
            let offset = if encoding.version == 2 {
                let addr = input.read_address(encoding.address_size)?;
                crate::endian_slice::u64_to_offset(addr)?
            } else {
                input.read_offset(encoding.format)?
            };
            AttributeValue::DebugInfoRef(DebugInfoOffset(offset))
        }
        constants::DW_FORM_ref_sig8 => {
            let signature = input.read_u64()?;
            AttributeValue::DebugTypesRef(DebugTypeSignature(signature))
        }
        constants::DW_FORM_string => AttributeValue::String(input.read_null_terminated()?),
        constants::DW_FORM_strp => {
            let offset = input.read_offset(encoding.format)?;
            AttributeValue::DebugStrRef(DebugStrOffset(offset))
        }
        constants::DW_FORM_GNU_ref_alt => {
            let offset = input.read_offset(encoding.format)?;
            AttributeValue::DebugInfoRefSup(DebugInfoOffset(offset))
        }
        constants::DW_FORM_GNU_strp_alt => {
            let offset = input.read_offset(encoding.format)?;
            AttributeValue::DebugStrRefSup(DebugStrOffset(offset))
        }
        _ => return Err(Error::UnknownForm(form)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Format;
    use crate::endianity::LittleEndian;

    fn encoding() -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version: 4,
            address_size: 4,
        }
    }

    fn single_abbrev(
        code: u64,
        tag: constants::DwTag,
        has_children: constants::DwChildren,
        attributes: Vec<AttributeSpecification>,
    ) -> Abbreviations {
        let buf = abbrev_bytes(code, tag, has_children, &attributes);
        crate::abbrev::DebugAbbrev::<LittleEndian>::new(&buf)
            .abbreviations(crate::common::DebugAbbrevOffset(0))
            .expect("Should parse abbreviations")
    }

    // Encode a one-abbreviation table. Codes, tags, names, and forms in the
    // tests all fit in a single LEB128 byte.
    fn abbrev_bytes(
        code: u64,
        tag: constants::DwTag,
        has_children: constants::DwChildren,
        attributes: &[AttributeSpecification],
    ) -> Vec<u8> {
        let mut buf = vec![code as u8, tag.0 as u8, has_children.0];
        for spec in attributes {
            buf.push(spec.name().0 as u8);
            buf.push(spec.form().0 as u8);
        }
        buf.extend_from_slice(&[0x00, 0x00, 0x00]);
        buf
    }

    #[test]
    #[cfg_attr(rustfmt, rustfmt_skip)]
    fn test_parse_die_ok() {
        let abbrevs = single_abbrev(
            1,
            constants::DW_TAG_subprogram,
            constants::DW_CHILDREN_no,
            vec![
                AttributeSpecification::new(constants::DW_AT_name, constants::DW_FORM_string),
                AttributeSpecification::new(constants::DW_AT_low_pc, constants::DW_FORM_addr),
            ],
        );

        let buf = [
            // Padding so the entry is not at offset zero.
            0xaa, 0xbb,

            // Code
            0x01,
            // DW_AT_name = "foo"
            0x66, 0x6f, 0x6f, 0x00,
            // DW_AT_low_pc
            0x78, 0x56, 0x34, 0x12,
        ];

        let section = EndianSlice::<LittleEndian>::new(&buf);
        let die = Die::parse(section, 2, encoding(), &abbrevs).expect("Should parse entry");

        assert_eq!(die.offset(), 2);
        assert_eq!(die.tag(), Some(constants::DW_TAG_subprogram));
        assert!(!die.has_children());
        assert_eq!(die.size(), 9);
        assert_eq!(die.attrs().len(), 2);

        let name = die.attr(constants::DW_AT_name).expect("Should have name");
        assert_eq!(
            *name.value(),
            AttributeValue::String(EndianSlice::new(b"foo"))
        );

        let low_pc = die.attr(constants::DW_AT_low_pc).expect("Should have low_pc");
        assert_eq!(*low_pc.value(), AttributeValue::Addr(0x1234_5678));
    }

    #[test]
    fn test_parse_null_die() {
        let abbrevs = Abbreviations::default();
        let buf = [0x00, 0xff];

        let section = EndianSlice::<LittleEndian>::new(&buf);
        let die = Die::parse(section, 0, encoding(), &abbrevs).expect("Should parse null entry");

        assert!(die.is_null());
        assert_eq!(die.tag(), None);
        assert!(!die.has_children());
        assert_eq!(die.size(), 1);
        assert!(die.attrs().is_empty());
    }

    #[test]
    fn test_parse_die_unknown_code() {
        let abbrevs = Abbreviations::default();
        let buf = [0x63];

        let section = EndianSlice::<LittleEndian>::new(&buf);
        match Die::parse(section, 0, encoding(), &abbrevs) {
            Err(Error::InvalidAbbreviationCode(0x63)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    #[cfg_attr(rustfmt, rustfmt_skip)]
    fn test_parse_indirect_and_translate() {
        let abbrevs = single_abbrev(
            1,
            constants::DW_TAG_compile_unit,
            constants::DW_CHILDREN_yes,
            vec![
                AttributeSpecification::new(constants::DW_AT_language, constants::DW_FORM_indirect),
            ],
        );

        let buf = [
            // Code
            0x01,
            // Concrete form = DW_FORM_data2
            0x05,
            // Value
            0x0c, 0x00,
        ];

        let section = EndianSlice::<LittleEndian>::new(&buf);
        let mut die = Die::parse(section, 0, encoding(), &abbrevs).expect("Should parse entry");

        let attr = die.attr(constants::DW_AT_language).expect("Should have language");
        assert_eq!(attr.form(), constants::DW_FORM_indirect);
        assert_eq!(
            *attr.value(),
            AttributeValue::Indirect {
                form: constants::DW_FORM_data2,
                value: Box::new(AttributeValue::Data2([0x0c, 0x00])),
            }
        );

        die.translate_indirect_attributes();
        let attr = die.attr(constants::DW_AT_language).expect("Should have language");
        assert_eq!(attr.form(), constants::DW_FORM_data2);
        assert_eq!(*attr.value(), AttributeValue::Data2([0x0c, 0x00]));
        assert_eq!(attr.udata_value(), Some(0x0c));
    }

    #[test]
    fn test_parse_attribute_unknown_form() {
        let buf = [0x01];
        let input = &mut EndianSlice::<LittleEndian>::new(&buf);
        let spec =
            AttributeSpecification::new(constants::DW_AT_name, constants::DwForm(0x9999));
        match parse_attribute(input, encoding(), spec) {
            Err(Error::UnknownForm(constants::DwForm(0x9999))) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        };
    }

    #[test]
    fn test_set_parent_idempotent() {
        let abbrevs = Abbreviations::default();
        let buf = [0x00];
        let section = EndianSlice::<LittleEndian>::new(&buf);
        let mut die = Die::parse(section, 0, encoding(), &abbrevs).unwrap();

        assert_eq!(die.parent(), None);
        die.set_parent(DieId(3));
        die.set_parent(DieId(7));
        assert_eq!(die.parent(), Some(DieId(3)));
    }
}
