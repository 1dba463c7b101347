//! Chunk and section model for the legacy (pre-flattening) chunk layout.
//!
//! A legacy chunk payload looks like:
//! `{ Level: { Sections: [ { Y: byte, Blocks: byte[4096], Data: byte[2048], ... } ] } }`

use std::collections::HashMap;

use fastnbt::Value;
use serde::Deserialize;

use crate::CHUNK_SECTIONS;
use crate::error::SectionFormatError;

/// Block arrays a section may carry, with the only length each may have.
pub const BLOCK_ARRAYS: [(&str, usize); 5] = [
    ("Blocks", 4096),
    ("Data", 2048),
    ("BlockLight", 2048),
    ("SkyLight", 2048),
    ("Add", 2048),
];

/// Keys of the palette section layout, which this model cannot hold.
const PALETTE_KEYS: [&str; 2] = ["BlockStates", "Palette"];

/// Canonical length of a block array, `None` for names outside [`BLOCK_ARRAYS`].
pub fn canonical_len(name: &str) -> Option<usize> {
    array_slot(name).map(|slot| BLOCK_ARRAYS[slot].1)
}

fn array_slot(name: &str) -> Option<usize> {
    BLOCK_ARRAYS.iter().position(|(known, _)| *known == name)
}

/// One 16x16x16 slice of a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    arrays: [Option<Box<[u8]>>; BLOCK_ARRAYS.len()],
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `name`, replacing any previous array.
    ///
    /// Fails if `name` is not a known block array or if the length differs
    /// from its canonical length. Nothing is padded or cut.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Result<(), SectionFormatError> {
        let slot = array_slot(name).ok_or_else(|| SectionFormatError::UnknownArray(name.to_string()))?;
        let (name, expected) = BLOCK_ARRAYS[slot];
        let bytes = bytes.into();
        if bytes.len() != expected {
            return Err(SectionFormatError::LengthMismatch {
                name,
                expected,
                actual: bytes.len(),
            });
        }
        self.arrays[slot] = Some(bytes.into_boxed_slice());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        array_slot(name).and_then(|slot| self.arrays[slot].as_deref())
    }

    /// Block ids, the `Blocks` array.
    pub fn blocks(&self) -> Option<&[u8]> {
        self.arrays[0].as_deref()
    }

    /// Present arrays in [`BLOCK_ARRAYS`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[u8])> + '_ {
        BLOCK_ARRAYS
            .iter()
            .zip(self.arrays.iter())
            .filter_map(|((name, _), array)| array.as_deref().map(|bytes| (*name, bytes)))
    }

    /// Number of arrays present.
    pub fn len(&self) -> usize {
        self.arrays.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A column of up to 16 sections, indexed by vertical slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    sections: [Option<Section>; CHUNK_SECTIONS],
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, y: usize) -> Option<&Section> {
        self.sections.get(y).and_then(Option::as_ref)
    }

    /// Place a section at slot `y`, returning the one it replaced.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not less than 16.
    pub fn insert(&mut self, y: usize, section: Section) -> Option<Section> {
        assert!(y < CHUNK_SECTIONS, "section slot {y} out of bounds");
        self.sections[y].replace(section)
    }

    /// Present sections, bottom to top.
    pub fn sections(&self) -> impl Iterator<Item = (usize, &Section)> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter_map(|(y, section)| section.as_ref().map(|section| (y, section)))
    }

    /// Number of present sections.
    pub fn len(&self) -> usize {
        self.sections.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Only the parts of the chunk this format keeps. Everything else in the
// payload (entities, heightmaps, biomes...) is skipped by serde.
#[derive(Deserialize)]
struct LegacyChunk {
    #[serde(rename = "Level")]
    level: LegacyLevel,
}

#[derive(Deserialize)]
struct LegacyLevel {
    #[serde(rename = "Sections", default)]
    sections: Vec<HashMap<String, Value>>,
}

/// Build a [`Chunk`] from a decompressed legacy chunk payload.
pub fn extract(payload: &[u8]) -> Result<Chunk, SectionFormatError> {
    let legacy: LegacyChunk = fastnbt::from_bytes(payload)?;

    let mut chunk = Chunk::new();
    for mut entry in legacy.level.sections {
        let y = entry
            .get("Y")
            .and_then(Value::as_i64)
            .ok_or(SectionFormatError::MissingSlot)?;
        let slot = usize::try_from(y)
            .ok()
            .filter(|slot| *slot < CHUNK_SECTIONS)
            .ok_or(SectionFormatError::SlotOutOfRange(y))?;
        if chunk.section(slot).is_some() {
            return Err(SectionFormatError::DuplicateSlot(slot as u8));
        }
        if let Some(key) = PALETTE_KEYS.into_iter().find(|key| entry.contains_key(*key)) {
            return Err(SectionFormatError::UnsupportedLayout(key));
        }

        let mut section = Section::new();
        for (name, _) in BLOCK_ARRAYS {
            match entry.remove(name) {
                None => {}
                Some(Value::ByteArray(array)) => {
                    let bytes: Vec<u8> = array.into_inner().into_iter().map(|b| b as u8).collect();
                    section.insert(name, bytes)?;
                }
                Some(_) => return Err(SectionFormatError::WrongTagType(name)),
            }
        }
        chunk.insert(slot, section);
    }

    Ok(chunk)
}
