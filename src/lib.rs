//! A lazy, zero-copy reader for the tree of debugging information entries
//! (DIEs) in the DWARF debugging format.
//!
//! * **Zero-copy:** entry attributes are references into the original
//!   section buffers. No copies of the input data ever get made.
//!
//! * **Lazy:** an entry is parsed the first time some navigation path
//!   reaches its offset, and never again. Skip over a unit and its entries
//!   don't get parsed; walk a child list twice and the second walk is pure
//!   cache hits.
//!
//! * **Cross-platform:** `durin` isn't coupled to any platform or object
//!   file format. Use your own ELF parser on Linux or a Mach-O parser on
//!   macOS and hand the raw section bytes over.
//!
//! This library targets the second through fourth editions of the standard,
//! with type units as stored in `.debug_types` per the fourth edition.
//!
//! ## Example Usage
//!
//! Load the sections, then walk every unit's tree:
//!
//! ```rust
//! use durin::{Dwarf, LittleEndian, SectionId, TreeEntry};
//!
//! # fn example() -> durin::Result<()> {
//! # let debug_abbrev: &[u8] = &[0x01, 0x11, 0x01, 0x03, 0x08, 0x00, 0x00, 0x00];
//! # let debug_info: &[u8] = &[
//! #     0x0b, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
//! #     0x01, 0x78, 0x00, 0x00,
//! # ];
//! // Read the sections with whatever object loader you're using.
//! let dwarf: Dwarf<LittleEndian> = Dwarf::load(|id| {
//!     Ok::<_, durin::Error>(match id {
//!         SectionId::DebugAbbrev => debug_abbrev,
//!         SectionId::DebugInfo => debug_info,
//!         _ => &[],
//!     })
//! })?;
//!
//! let mut units = dwarf.units();
//! while let Some(header) = units.next()? {
//!     let mut unit = dwarf.unit(header);
//!     let mut entries = unit.entries()?;
//!     while let Some(entry) = entries.next()? {
//!         if let TreeEntry::Entry(id) = entry {
//!             println!("found an entry: {:?}", entries.entry(id).tag());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## API Structure
//!
//! * Basic familiarity with DWARF is assumed.
//!
//! * Each section gets its own type: [`DebugInfo`] for `.debug_info`,
//!   [`DebugTypes`] for `.debug_types`, [`DebugAbbrev`] for
//!   `.debug_abbrev`, and [`DebugStr`] for `.debug_str`. The [`Dwarf`]
//!   context gathers one of each, plus the caches they share and an
//!   optional supplementary file for `dwz`-style imported units.
//!
//! * A [`Unit`] pairs one unit header with a cache of that unit's parsed
//!   entries. Navigation methods hand out [`DieId`] handles into the cache;
//!   two handles are equal exactly when they came from the same parse.
//!
//! * Offsets into a section are strongly typed: an offset into
//!   `.debug_info` is the [`DebugInfoOffset`] type and cannot be confused
//!   with an offset into `.debug_abbrev`. [`UnitOffset`] is relative to a
//!   unit's header rather than to a section.
//!
//! ## Using with `FallibleIterator`
//!
//! The standard library's `Iterator` trait does not play well with
//! iterators where the `next` operation is fallible. Every lazy iterator in
//! this crate therefore also implements the
//! [`fallible-iterator`](https://crates.io/crates/fallible-iterator)
//! crate's `FallibleIterator` trait; import that trait to get the usual
//! `map`, `filter`, and friends over units and entries.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod constants;
pub use crate::constants::*;

mod common;
pub use crate::common::{
    DebugAbbrevOffset, DebugInfoOffset, DebugStrOffset, DebugTypeSignature, DebugTypesOffset,
    Encoding, Format, SectionId, UnitOffset,
};

mod endianity;
pub use crate::endianity::{BigEndian, Endianity, LittleEndian, NativeEndian};

mod endian_slice;
pub use crate::endian_slice::EndianSlice;

mod error;
pub use crate::error::{Error, Result};

mod abbrev;
pub use crate::abbrev::{
    Abbreviation, Abbreviations, AbbreviationsCache, AttributeSpecification, DebugAbbrev,
};

mod die;
pub use crate::die::{Attribute, AttributeValue, Die, DieId};

mod unit;
pub use crate::unit::{
    CompilationUnit, CompilationUnitHeader, CompilationUnitHeadersIter, DebugInfo, DebugTypes,
    EntriesChildren, EntriesSubtree, TreeEntry, TypeUnit, TypeUnitHeader, TypeUnitHeadersIter,
    Unit, UnitHeader,
};

mod dwarf;
pub use crate::dwarf::{DebugStr, Dwarf, Section};
