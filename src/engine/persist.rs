//! Snapshot persistence for the graph engine.
//!
//! The on-disk image is a small framed file: a magic tag, a format version,
//! the body length, a CRC32 of the body, then the bincode-serialized body
//! (configuration, search parameter, capacity, entry point, and every slot
//! with its label, vector, tombstone flag, and per-layer links). A snapshot
//! is always complete, never incremental, and a failed verification rejects
//! the whole image — there is no partial-index recovery.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::engine::config::HnswConfig;
use crate::engine::graph::{HnswEngine, SlotNode};
use crate::error::{Result, VicinityError};
use crate::registry::SlotId;
use crate::space::SpaceKind;

const MAGIC: &[u8; 4] = b"VCNI";
const FORMAT_VERSION: u32 = 1;

/// The serialized body of an index image.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    config: HnswConfig,
    ef_search: usize,
    capacity: usize,
    entry_point: Option<SlotId>,
    max_layer: usize,
    slots: Vec<SlotNode>,
}

/// Serialize the full index to a file.
///
/// Reads the graph under a read guard; callers must quiesce concurrent
/// mutation for the snapshot to be consistent.
pub fn save(engine: &HnswEngine, path: impl AsRef<Path>) -> Result<()> {
    let body = {
        let state = engine.state().read();
        let image = PersistedIndex {
            config: engine.config().clone(),
            ef_search: engine.ef_search(),
            capacity: state.capacity,
            entry_point: state.entry_point,
            max_layer: state.max_layer,
            slots: state.slots.clone(),
        };
        bincode::serialize(&image)
            .map_err(|e| VicinityError::internal(format!("snapshot serialization failed: {e}")))?
    };

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    writer.write_u64::<LittleEndian>(body.len() as u64)?;
    writer.write_u32::<LittleEndian>(crc32fast::hash(&body))?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Reconstruct an engine from a persisted image.
///
/// The dimensionality must match the image; the space is caller-selected
/// and replaces the persisted one, mirroring the creation-time contract.
pub fn load(path: impl AsRef<Path>, dimension: usize, space: SpaceKind) -> Result<HnswEngine> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(VicinityError::corrupted("not an index image"));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(VicinityError::corrupted(format!(
            "unsupported image format version {version}"
        )));
    }

    let body_len = reader.read_u64::<LittleEndian>()? as usize;
    let checksum = reader.read_u32::<LittleEndian>()?;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body)?;
    if crc32fast::hash(&body) != checksum {
        return Err(VicinityError::corrupted("image checksum mismatch"));
    }

    let image: PersistedIndex = bincode::deserialize(&body)
        .map_err(|e| VicinityError::corrupted(format!("undecodable image body: {e}")))?;

    if image.config.dimension != dimension {
        return Err(VicinityError::corrupted(format!(
            "dimension mismatch: image has {}, caller requested {dimension}",
            image.config.dimension
        )));
    }

    let mut config = image.config;
    config.space = space;

    HnswEngine::from_parts(
        config,
        image.ef_search,
        image.capacity,
        image.entry_point,
        image.max_layer,
        image.slots,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_engine() -> HnswEngine {
        let engine = HnswEngine::new(
            HnswConfig::new(2, 10).with_m(4).with_ef_construction(16),
        )
        .unwrap();
        engine.insert(&[1.0, 0.0], 1).unwrap();
        engine.insert(&[0.0, 1.0], 2).unwrap();
        engine.mark_deleted(2).unwrap();
        engine
    }

    #[test]
    fn test_save_load_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vcni");

        let engine = sample_engine();
        engine.set_ef_search(77);
        save(&engine, &path).unwrap();

        let loaded = load(&path, 2, SpaceKind::Euclidean).unwrap();
        assert_eq!(loaded.count(), 2);
        assert_eq!(loaded.deleted_count(), 1);
        assert_eq!(loaded.capacity(), 10);
        assert_eq!(loaded.ef_search(), 77);

        let slot = loaded.registry().get(1).unwrap();
        assert_eq!(loaded.vector_for(slot).unwrap(), vec![1.0, 0.0]);
        assert!(!loaded.is_deleted(slot));
    }

    #[test]
    fn test_load_rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.vcni");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not an index at all")
            .unwrap();

        assert!(matches!(
            load(&path, 2, SpaceKind::Euclidean).unwrap_err(),
            VicinityError::Corrupted(_)
        ));
    }

    #[test]
    fn test_load_rejects_corrupted_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vcni");
        save(&sample_engine(), &path).unwrap();

        // Flip a byte in the body; the checksum must catch it.
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load(&path, 2, SpaceKind::Euclidean).unwrap_err(),
            VicinityError::Corrupted(_)
        ));
    }

    #[test]
    fn test_load_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vcni");
        save(&sample_engine(), &path).unwrap();

        assert!(matches!(
            load(&path, 8, SpaceKind::Euclidean).unwrap_err(),
            VicinityError::Corrupted(_)
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            load("/nonexistent/index.vcni", 2, SpaceKind::Euclidean).unwrap_err(),
            VicinityError::Io(_)
        ));
    }
}
