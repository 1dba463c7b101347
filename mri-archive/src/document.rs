//! Mapping between a [`Region`] and the archive NBT tree.
//!
//! ```text
//! Region (compound)
//! ├── "MRI Version": "1.0"
//! ├── "16,27" (compound, one per chunk)
//! │   ├── "0" (compound, one per section)
//! │   │   ├── "Blocks": byte[4096]
//! │   │   └── ...
//! ```

use std::collections::HashMap;

use fastnbt::{ByteArray, Value};
use mri_anvil::{CHUNK_SECTIONS, Chunk, REGION_SIZE, Region, Section, SectionFormatError, canonical_len};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ArchiveFormatError;
use crate::{VERSION, VERSION_KEY};

pub(crate) fn chunk_key(x: usize, z: usize) -> String {
    format!("{x},{z}")
}

pub(crate) fn section_key(y: usize) -> String {
    y.to_string()
}

/// Only the canonical spelling is accepted, so two keys never alias one chunk.
fn parse_chunk_key(key: &str) -> Option<(usize, usize)> {
    let (x, z) = key.split_once(',')?;
    let (x, z): (usize, usize) = (x.parse().ok()?, z.parse().ok()?);
    (x < REGION_SIZE && z < REGION_SIZE && chunk_key(x, z) == key).then_some((x, z))
}

fn parse_section_key(key: &str) -> Option<usize> {
    let y: usize = key.parse().ok()?;
    (y < CHUNK_SECTIONS && section_key(y) == key).then_some(y)
}

/// Serializes a region in slot order so identical regions give identical bytes.
pub(crate) struct RegionDoc<'a>(pub &'a Region);

struct ChunkDoc<'a>(&'a Chunk);

struct SectionDoc<'a>(&'a Section);

impl Serialize for RegionDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.0.len()))?;
        map.serialize_entry(VERSION_KEY, VERSION)?;
        for ((x, z), chunk) in self.0.chunks() {
            map.serialize_entry(&chunk_key(x, z), &ChunkDoc(chunk))?;
        }
        map.end()
    }
}

impl Serialize for ChunkDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (y, section) in self.0.sections() {
            map.serialize_entry(&section_key(y), &SectionDoc(section))?;
        }
        map.end()
    }
}

impl Serialize for SectionDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, bytes) in self.0.iter() {
            let array = ByteArray::new(bytes.iter().map(|&b| b as i8).collect());
            map.serialize_entry(name, &array)?;
        }
        map.end()
    }
}

/// Rebuild a region from the decoded root compound.
///
/// Children may come in any order; only their keys matter.
pub(crate) fn region_from_root(mut root: HashMap<String, Value>) -> Result<Region, ArchiveFormatError> {
    match root.remove(VERSION_KEY) {
        Some(Value::String(version)) if version == VERSION => {}
        Some(Value::String(version)) => return Err(ArchiveFormatError::UnsupportedVersion(version)),
        Some(_) => {
            return Err(ArchiveFormatError::UnexpectedTag {
                path: VERSION_KEY.to_string(),
                expected: "string",
            });
        }
        None => return Err(ArchiveFormatError::MissingVersion),
    }

    let mut region = Region::new();
    for (key, value) in root {
        let (x, z) = parse_chunk_key(&key).ok_or_else(|| ArchiveFormatError::ChunkKey(key.clone()))?;
        let Value::Compound(sections) = value else {
            return Err(ArchiveFormatError::UnexpectedTag { path: key, expected: "compound" });
        };
        let chunk = chunk_from_compound(&key, sections)?;
        region.insert(x, z, chunk);
    }
    Ok(region)
}

fn chunk_from_compound(chunk_key: &str, sections: HashMap<String, Value>) -> Result<Chunk, ArchiveFormatError> {
    let mut chunk = Chunk::new();
    for (key, value) in sections {
        let y = parse_section_key(&key).ok_or_else(|| ArchiveFormatError::SectionKey {
            chunk: chunk_key.to_string(),
            key: key.clone(),
        })?;
        let path = format!("{chunk_key}/{key}");
        let Value::Compound(arrays) = value else {
            return Err(ArchiveFormatError::UnexpectedTag { path, expected: "compound" });
        };
        let section = section_from_compound(&path, arrays)?;
        chunk.insert(y, section);
    }
    Ok(chunk)
}

fn section_from_compound(path: &str, arrays: HashMap<String, Value>) -> Result<Section, ArchiveFormatError> {
    let mut section = Section::new();
    for (name, value) in arrays {
        if canonical_len(&name).is_none() {
            return Err(ArchiveFormatError::Section {
                path: path.to_string(),
                source: SectionFormatError::UnknownArray(name),
            });
        }
        let Value::ByteArray(array) = value else {
            return Err(ArchiveFormatError::UnexpectedTag {
                path: format!("{path}/{name}"),
                expected: "byte array",
            });
        };
        let bytes: Vec<u8> = array.into_inner().into_iter().map(|b| b as u8).collect();
        section
            .insert(&name, bytes)
            .map_err(|source| ArchiveFormatError::Section { path: path.to_string(), source })?;
    }
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_keys() {
        assert_eq!(chunk_key(16, 27), "16,27");
        assert_eq!(parse_chunk_key("16,27"), Some((16, 27)));
        assert_eq!(parse_chunk_key("31,0"), Some((31, 0)));
        assert_eq!(parse_chunk_key("32,0"), None);
        assert_eq!(parse_chunk_key("016,27"), None);
        assert_eq!(parse_chunk_key("16;27"), None);
        assert_eq!(parse_chunk_key("-1,0"), None);
    }

    #[test]
    fn test_section_keys() {
        assert_eq!(parse_section_key("0"), Some(0));
        assert_eq!(parse_section_key("15"), Some(15));
        assert_eq!(parse_section_key("16"), None);
        assert_eq!(parse_section_key("+3"), None);
    }
}
