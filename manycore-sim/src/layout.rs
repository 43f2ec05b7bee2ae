// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Named word fields in tile DMEM.
//!
//! The host driver and a tile program agree on where each configuration word
//! lives. Fields are placed either from the start of DMEM or back from its
//! end, so a [`Layout`] can only be turned into concrete offsets once the
//! DMEM size is known. [`Layout::validate`] checks that no two fields overlap
//! for a given size.

use crate::address::{Npa, TILE_EPA_DMEM_BASE};
use crate::memory::Dmem;
use crate::sim_error;
use crate::types::{Coordinate, SimError, SimResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Placement {
    /// Byte offset from the start of DMEM.
    Start(u32),
    /// Byte distance back from the end of DMEM.
    End(u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub placement: Placement,
}

impl Field {
    #[must_use]
    pub const fn start(name: &'static str, offset: u32) -> Self {
        Self {
            name,
            placement: Placement::Start(offset),
        }
    }

    #[must_use]
    pub const fn end(name: &'static str, distance: u32) -> Self {
        Self {
            name,
            placement: Placement::End(distance),
        }
    }

    /// Byte offset of the field within a DMEM of `dmem_size` bytes.
    pub fn offset(&self, dmem_size: u32) -> Result<u32, SimError> {
        let offset = match self.placement {
            Placement::Start(offset) => Some(offset),
            Placement::End(distance) if distance >= 4 => dmem_size.checked_sub(distance),
            Placement::End(_) => None,
        };
        match offset {
            Some(offset) if offset % 4 == 0 && offset < dmem_size && dmem_size - offset >= 4 => {
                Ok(offset)
            }
            _ => sim_error!(format!(
                "field '{}' ({:?}) does not fit a {dmem_size} byte DMEM",
                self.name, self.placement
            )),
        }
    }

    /// Network address of the field on `tile`.
    pub fn npa(&self, tile: Coordinate, dmem_size: u32) -> Result<Npa, SimError> {
        Ok(Npa::new(tile, TILE_EPA_DMEM_BASE + self.offset(dmem_size)?))
    }
}

/// An ordered set of fields shared by a host driver and a tile program.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Layout {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn offset_of(&self, name: &str, dmem_size: u32) -> Result<u32, SimError> {
        match self.field(name) {
            Some(field) => field.offset(dmem_size),
            None => sim_error!(format!("layout '{}' has no field '{name}'", self.name)),
        }
    }

    /// Every field fits and no two fields share a word.
    pub fn validate(&self, dmem_size: u32) -> SimResult {
        let mut offsets = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let offset = field.offset(dmem_size)?;
            if let Some((other, _)) = offsets.iter().find(|(_, o)| *o == offset) {
                return sim_error!(format!(
                    "layout '{}': fields '{other}' and '{}' overlap at 0x{offset:x}",
                    self.name, field.name
                ));
            }
            offsets.push((field.name, offset));
        }
        Ok(())
    }
}

/// A typed view of a [`Layout`]: one word per field, in field order.
pub trait DmemRecord: Sized {
    const LAYOUT: Layout;

    fn to_words(&self) -> Vec<u32>;

    fn from_words(words: &[u32]) -> Result<Self, SimError>;

    /// Read every field from a tile's DMEM.
    fn load(dmem: &Dmem) -> Result<Self, SimError> {
        let words = Self::LAYOUT
            .fields
            .iter()
            .map(|f| dmem.read(f))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_words(&words)
    }

    /// Write every field into a tile's DMEM.
    fn store(&self, dmem: &mut Dmem) -> SimResult {
        Self::LAYOUT.validate(dmem.size_bytes())?;
        for (field, word) in Self::LAYOUT.fields.iter().zip(self.to_words()) {
            dmem.write(field, word)?;
        }
        Ok(())
    }

    /// The host writes needed to place this record on `tile`.
    fn host_writes(&self, tile: Coordinate, dmem_size: u32) -> Result<Vec<(Npa, u32)>, SimError> {
        Self::LAYOUT.validate(dmem_size)?;
        Self::LAYOUT
            .fields
            .iter()
            .zip(self.to_words())
            .map(|(field, word)| Ok((field.npa(tile, dmem_size)?, word)))
            .collect()
    }
}

/// Check a slice of words has one entry per layout field.
pub fn check_word_count(layout: &Layout, words: &[u32]) -> SimResult {
    if words.len() != layout.fields.len() {
        return sim_error!(format!(
            "layout '{}' needs {} words, got {}",
            layout.name,
            layout.fields.len(),
            words.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[Field] = &[
        Field::start("base", 0),
        Field::start("len", 4),
        Field::end("result", 4),
    ];
    const LAYOUT: Layout = Layout {
        name: "test",
        fields: FIELDS,
    };

    #[derive(Debug, PartialEq)]
    struct Record {
        base: u32,
        len: u32,
        result: u32,
    }

    impl DmemRecord for Record {
        const LAYOUT: Layout = LAYOUT;

        fn to_words(&self) -> Vec<u32> {
            vec![self.base, self.len, self.result]
        }

        fn from_words(words: &[u32]) -> Result<Self, SimError> {
            check_word_count(&Self::LAYOUT, words)?;
            Ok(Self {
                base: words[0],
                len: words[1],
                result: words[2],
            })
        }
    }

    #[test]
    fn offsets() {
        assert_eq!(LAYOUT.offset_of("len", 64).unwrap(), 4);
        assert_eq!(LAYOUT.offset_of("result", 64).unwrap(), 60);
        assert_eq!(LAYOUT.offset_of("result", 4096).unwrap(), 4092);
        assert!(LAYOUT.offset_of("missing", 64).is_err());
        assert!(Field::end("bad", 0).offset(64).is_err());
        assert!(Field::start("bad", 64).offset(64).is_err());
        assert!(Field::start("bad", 2).offset(64).is_err());
    }

    #[test]
    fn overlap_detected() {
        // With an 8 byte DMEM the end field lands on top of "len"
        assert!(LAYOUT.validate(8).is_err());
        assert!(LAYOUT.validate(12).is_ok());
    }

    #[test]
    fn record_load_store() {
        let mut dmem = Dmem::new(64);
        let record = Record {
            base: 0x8000_0000,
            len: 32,
            result: 0,
        };
        record.store(&mut dmem).unwrap();
        assert_eq!(dmem.read_word(4).unwrap(), 32);
        assert_eq!(Record::load(&dmem).unwrap(), record);

        let writes = record.host_writes(Coordinate::new(1, 2), 64).unwrap();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[2].0, Npa::new(Coordinate::new(1, 2), TILE_EPA_DMEM_BASE + 60));

        assert!(Record::from_words(&[1, 2]).is_err());
    }
}
