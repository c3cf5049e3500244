use chunkvault_common::{BlockPos, Chunk, ChunkPos, EntityRecord, GameMode};
use chunkvault_provider::{ChunkLoad, Provider, ProviderError};
use chunkvault_provider::contract::{DEFAULT_GAME_MODE, DEFAULT_SPAWN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Current schema version of `world.meta.json`.
const META_SCHEMA_VERSION: u32 = 1;

/// Errors from the file backend itself. The [`Provider`] impl maps these
/// into the contract taxonomy at the trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("hash mismatch for {filename}: expected {expected}, got {actual}")]
    HashMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("store is closed")]
    Closed,
}

/// When writes reach the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Every save hits the disk before returning.
    #[default]
    WriteThrough,
    /// Chunk and entity saves are buffered in memory and written by
    /// `flush` or `close`. Close returning Ok guarantees the flush ran.
    WriteBack,
}

/// Metadata stored in world.meta.json.
///
/// The hash manifest maps payload filenames to their SHA-256, enabling
/// corruption detection on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorldMeta {
    schema_version: u32,
    name: String,
    spawn: BlockPos,
    time: i64,
    time_cycle: bool,
    game_mode: GameMode,
    payload_hashes: BTreeMap<String, String>,
}

impl WorldMeta {
    fn fresh(name: &str) -> Self {
        Self {
            schema_version: META_SCHEMA_VERSION,
            name: name.to_string(),
            spawn: DEFAULT_SPAWN,
            time: 0,
            time_cycle: true,
            game_mode: DEFAULT_GAME_MODE,
            payload_hashes: BTreeMap::new(),
        }
    }
}

/// File-backed provider for one world.
///
/// Exclusively owns the store directory between [`FileProvider::open`] and
/// [`Provider::close`]. Single-call close: a second close is an error, and
/// saves after close fail.
pub struct FileProvider {
    root: PathBuf,
    meta: WorldMeta,
    durability: Durability,
    pending_chunks: HashMap<ChunkPos, Chunk>,
    pending_entities: HashMap<ChunkPos, Vec<EntityRecord>>,
    meta_dirty: bool,
    closed: bool,
}

impl FileProvider {
    /// Open or create a write-through store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, Durability::WriteThrough)
    }

    /// Open or create a store with an explicit durability mode.
    pub fn open_with(path: impl AsRef<Path>, durability: Durability) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("chunks"))?;
        std::fs::create_dir_all(root.join("entities"))?;

        let meta_path = root.join("world.meta.json");
        let meta = if meta_path.exists() {
            let meta: WorldMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != META_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: META_SCHEMA_VERSION,
                });
            }
            meta
        } else {
            let meta = WorldMeta::fresh("");
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            meta
        };

        tracing::debug!(root = %root.display(), ?durability, "opened world store");
        Ok(Self {
            root,
            meta,
            durability,
            pending_chunks: HashMap::new(),
            pending_entities: HashMap::new(),
            meta_dirty: false,
            closed: false,
        })
    }

    /// Path to the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Chunk positions with block data on disk, in manifest order.
    pub fn saved_chunks(&self) -> Vec<ChunkPos> {
        self.meta
            .payload_hashes
            .keys()
            .filter_map(|name| parse_payload_name(name, "c"))
            .collect()
    }

    /// Recompute every hash in the manifest against the files on disk.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        for (filename, expected) in &self.meta.payload_hashes {
            let path = self.payload_path(filename);
            let data = std::fs::read(&path)?;
            let actual = sha256_hex(&data);
            if &actual != expected {
                return Err(StoreError::HashMismatch {
                    filename: filename.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Write all buffered payloads and metadata to disk.
    ///
    /// A payload leaves the buffer only once its write succeeded; a failed
    /// flush keeps everything unwritten buffered so a later flush or close
    /// can retry without losing accepted saves.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let positions: Vec<ChunkPos> = self.pending_chunks.keys().copied().collect();
        for pos in positions {
            if let Some(chunk) = self.pending_chunks.remove(&pos) {
                if let Err(e) = self.write_payload(&chunk_file_name(pos), &chunk) {
                    self.pending_chunks.insert(pos, chunk);
                    return Err(e);
                }
            }
        }
        let positions: Vec<ChunkPos> = self.pending_entities.keys().copied().collect();
        for pos in positions {
            if let Some(list) = self.pending_entities.remove(&pos) {
                if let Err(e) = self.write_payload(&entity_file_name(pos), &list) {
                    self.pending_entities.insert(pos, list);
                    return Err(e);
                }
            }
        }
        if self.meta_dirty {
            self.save_meta()?;
            self.meta_dirty = false;
        }
        Ok(())
    }

    fn payload_path(&self, filename: &str) -> PathBuf {
        let dir = if filename.starts_with("c.") {
            "chunks"
        } else {
            "entities"
        };
        self.root.join(dir).join(filename)
    }

    fn write_payload<T: Serialize>(&mut self, filename: &str, value: &T) -> Result<(), StoreError> {
        let cbor_bytes = cbor_serialize(value)?;
        let compressed = zstd_compress(&cbor_bytes)?;
        let hash = sha256_hex(&compressed);
        std::fs::write(self.payload_path(filename), &compressed)?;
        self.meta.payload_hashes.insert(filename.to_string(), hash);
        self.save_meta()?;
        self.meta_dirty = false;
        Ok(())
    }

    /// Read and decode a payload file. `Ok(None)` means no file was ever
    /// written; any present-but-unverifiable file is an error.
    fn read_payload<T: for<'de> Deserialize<'de>>(
        &self,
        filename: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.payload_path(filename);
        if !path.exists() {
            return Ok(None);
        }
        let compressed = std::fs::read(&path)?;
        if let Some(expected) = self.meta.payload_hashes.get(filename) {
            let actual = sha256_hex(&compressed);
            if &actual != expected {
                return Err(StoreError::HashMismatch {
                    filename: filename.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        let cbor_bytes = zstd_decompress(&compressed)?;
        Ok(Some(cbor_deserialize(&cbor_bytes)?))
    }

    /// Persist metadata now (write-through) or mark it for the next flush.
    fn meta_changed(&mut self) {
        match self.durability {
            Durability::WriteThrough => {
                if let Err(e) = self.save_meta() {
                    // Metadata setters are infallible by contract; surface
                    // the failure in the log and retry on the next flush.
                    tracing::error!(error = %e, "failed to persist world metadata");
                    self.meta_dirty = true;
                } else {
                    self.meta_dirty = false;
                }
            }
            Durability::WriteBack => self.meta_dirty = true,
        }
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join("world.meta.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }
}

impl Provider for FileProvider {
    fn world_name(&self) -> String {
        self.meta.name.clone()
    }

    fn set_world_name(&mut self, name: &str) {
        self.meta.name = name.to_string();
        self.meta_changed();
    }

    fn world_spawn(&self) -> BlockPos {
        self.meta.spawn
    }

    fn set_world_spawn(&mut self, pos: BlockPos) {
        self.meta.spawn = pos;
        self.meta_changed();
    }

    fn load_chunk(&self, pos: ChunkPos) -> Result<ChunkLoad, ProviderError> {
        if self.closed {
            return Err(ProviderError::read(format!("chunk {pos}"), StoreError::Closed));
        }
        if let Some(chunk) = self.pending_chunks.get(&pos) {
            return Ok(ChunkLoad::Found(chunk.clone()));
        }
        match self.read_payload::<Chunk>(&chunk_file_name(pos)) {
            Ok(Some(chunk)) => Ok(ChunkLoad::Found(chunk)),
            Ok(None) => Ok(ChunkLoad::NotFound),
            Err(e) => Err(ProviderError::read(format!("chunk {pos}"), e)),
        }
    }

    fn save_chunk(&mut self, pos: ChunkPos, chunk: &Chunk) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::write(format!("chunk {pos}"), StoreError::Closed));
        }
        match self.durability {
            Durability::WriteThrough => self
                .write_payload(&chunk_file_name(pos), chunk)
                .map_err(|e| ProviderError::write(format!("chunk {pos}"), e)),
            Durability::WriteBack => {
                self.pending_chunks.insert(pos, chunk.clone());
                Ok(())
            }
        }
    }

    fn load_entities(&self, pos: ChunkPos) -> Result<Vec<EntityRecord>, ProviderError> {
        if self.closed {
            return Err(ProviderError::read(format!("entities {pos}"), StoreError::Closed));
        }
        if let Some(list) = self.pending_entities.get(&pos) {
            return Ok(list.clone());
        }
        match self.read_payload::<Vec<EntityRecord>>(&entity_file_name(pos)) {
            Ok(Some(list)) => Ok(list),
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(ProviderError::read(format!("entities {pos}"), e)),
        }
    }

    fn save_entities(
        &mut self,
        pos: ChunkPos,
        entities: &[EntityRecord],
    ) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::write(format!("entities {pos}"), StoreError::Closed));
        }
        match self.durability {
            Durability::WriteThrough => self
                .write_payload(&entity_file_name(pos), &entities.to_vec())
                .map_err(|e| ProviderError::write(format!("entities {pos}"), e)),
            Durability::WriteBack => {
                self.pending_entities.insert(pos, entities.to_vec());
                Ok(())
            }
        }
    }

    fn load_time(&self) -> i64 {
        self.meta.time
    }

    fn save_time(&mut self, time: i64) {
        self.meta.time = time;
        self.meta_changed();
    }

    fn load_time_cycle(&self) -> bool {
        self.meta.time_cycle
    }

    fn save_time_cycle(&mut self, running: bool) {
        self.meta.time_cycle = running;
        self.meta_changed();
    }

    fn default_game_mode(&self) -> GameMode {
        self.meta.game_mode
    }

    fn set_default_game_mode(&mut self, mode: GameMode) {
        self.meta.game_mode = mode;
        self.meta_changed();
    }

    /// Flushes buffered writes, then retires the store. Single-call: a
    /// second close is an error, as is any load or save afterwards.
    /// Metadata getters are infallible by signature and keep returning the
    /// last cached values.
    fn close(&mut self) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::close(StoreError::Closed));
        }
        self.flush().map_err(ProviderError::close)?;
        self.closed = true;
        tracing::debug!(root = %self.root.display(), "closed world store");
        Ok(())
    }
}

fn chunk_file_name(pos: ChunkPos) -> String {
    format!("c.{}.{}.cbor.zst", pos.x, pos.z)
}

fn entity_file_name(pos: ChunkPos) -> String {
    format!("e.{}.{}.cbor.zst", pos.x, pos.z)
}

/// Parse `<prefix>.<x>.<z>.cbor.zst` back into a position.
fn parse_payload_name(name: &str, prefix: &str) -> Option<ChunkPos> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('.')?;
    let rest = rest.strip_suffix(".cbor.zst")?;
    let (x, z) = rest.split_once('.')?;
    Some(ChunkPos::new(x.parse().ok()?, z.parse().ok()?))
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileProvider::open(tmp.path().join("world_data")).unwrap();
        assert!(store.root().join("chunks").is_dir());
        assert!(store.root().join("entities").is_dir());
        assert!(store.root().join("world.meta.json").is_file());
        assert!(store.saved_chunks().is_empty());
    }

    #[test]
    fn never_saved_position_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileProvider::open(tmp.path().join("world_data")).unwrap();
        assert_eq!(
            store.load_chunk(ChunkPos::new(3, -2)).unwrap(),
            ChunkLoad::NotFound
        );
        assert!(store.load_entities(ChunkPos::new(3, -2)).unwrap().is_empty());
    }

    #[test]
    fn chunk_round_trip_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let pos = ChunkPos::new(0, 0);
        let chunk = Chunk::from_blocks(vec![5; 64]);

        {
            let mut store = FileProvider::open(&path).unwrap();
            store.save_chunk(pos, &chunk).unwrap();
            store.close().unwrap();
        }

        let store = FileProvider::open(&path).unwrap();
        assert_eq!(store.load_chunk(pos).unwrap(), ChunkLoad::Found(chunk));
        assert_eq!(store.saved_chunks(), vec![pos]);
    }

    #[test]
    fn second_save_fully_replaces_first() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileProvider::open(tmp.path().join("world_data")).unwrap();
        let pos = ChunkPos::new(-7, 12);

        store.save_chunk(pos, &Chunk::from_blocks(vec![1, 1, 1])).unwrap();
        store.save_chunk(pos, &Chunk::from_blocks(vec![2])).unwrap();
        assert_eq!(
            store.load_chunk(pos).unwrap(),
            ChunkLoad::Found(Chunk::from_blocks(vec![2]))
        );

        store
            .save_entities(pos, &[EntityRecord::new("pig", Vec3::ZERO)])
            .unwrap();
        store.save_entities(pos, &[]).unwrap();
        assert!(store.load_entities(pos).unwrap().is_empty());
    }

    #[test]
    fn entity_round_trip_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let pos = ChunkPos::new(4, 4);
        let list = vec![
            EntityRecord::new("cow", Vec3::new(65.0, 70.0, 65.5)),
            EntityRecord::new("item", Vec3::new(64.0, 68.0, 64.0)),
        ];

        {
            let mut store = FileProvider::open(&path).unwrap();
            store.save_entities(pos, &list).unwrap();
            store.close().unwrap();
        }

        let store = FileProvider::open(&path).unwrap();
        let loaded = store.load_entities(pos).unwrap();
        assert_eq!(loaded.len(), list.len());
        assert!(list.iter().all(|e| loaded.contains(e)));
    }

    #[test]
    fn metadata_survives_reopen_and_setters_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");

        {
            let mut store = FileProvider::open(&path).unwrap();
            store.set_world_name("overworld");
            store.set_world_spawn(BlockPos::new(8, 65, -8));
            store.save_time(24000);
            store.close().unwrap();
        }

        let mut store = FileProvider::open(&path).unwrap();
        assert_eq!(store.world_name(), "overworld");
        assert_eq!(store.world_spawn(), BlockPos::new(8, 65, -8));
        assert_eq!(store.load_time(), 24000);
        assert!(store.load_time_cycle());
        assert_eq!(store.default_game_mode(), GameMode::Adventure);

        // A later setter does not disturb the other fields.
        store.set_default_game_mode(GameMode::Survival);
        assert_eq!(store.world_name(), "overworld");
        assert_eq!(store.world_spawn(), BlockPos::new(8, 65, -8));
        assert_eq!(store.load_time(), 24000);
    }

    #[test]
    fn corrupt_chunk_loads_as_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let pos = ChunkPos::new(2, 2);

        let mut store = FileProvider::open(&path).unwrap();
        store.save_chunk(pos, &Chunk::from_blocks(vec![3; 32])).unwrap();

        // Corrupt the payload file on disk.
        let file = path.join("chunks").join("c.2.2.cbor.zst");
        let mut data = std::fs::read(&file).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&file, &data).unwrap();

        // Found-but-corrupt, not NotFound: the caller may fall back to
        // generation, but the condition is reported.
        let err = store.load_chunk(pos).unwrap_err();
        assert!(matches!(err, ProviderError::Read { .. }));
        assert!(store.verify_integrity().is_err());

        // An untouched position is still a clean NotFound.
        assert_eq!(
            store.load_chunk(ChunkPos::new(9, 9)).unwrap(),
            ChunkLoad::NotFound
        );
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        drop(FileProvider::open(&path).unwrap());

        let meta_path = path.join("world.meta.json");
        let mut meta: serde_json::Value =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta["schema_version"] = serde_json::json!(999);
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match FileProvider::open(&path) {
            Err(StoreError::SchemaMismatch { file_version, .. }) => assert_eq!(file_version, 999),
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn write_back_buffers_until_close() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let pos = ChunkPos::new(1, -1);
        let chunk = Chunk::from_blocks(vec![11, 12]);

        {
            let mut store = FileProvider::open_with(&path, Durability::WriteBack).unwrap();
            store.save_chunk(pos, &chunk).unwrap();

            // Not on disk yet, but visible to the same provider.
            assert!(!path.join("chunks").join("c.1.-1.cbor.zst").exists());
            assert_eq!(store.load_chunk(pos).unwrap(), ChunkLoad::Found(chunk.clone()));

            store.close().unwrap();
            assert!(path.join("chunks").join("c.1.-1.cbor.zst").exists());
        }

        let store = FileProvider::open(&path).unwrap();
        assert_eq!(store.load_chunk(pos).unwrap(), ChunkLoad::Found(chunk));
    }

    #[test]
    fn failed_flush_keeps_buffered_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let pos = ChunkPos::new(0, 3);
        let chunk = Chunk::from_blocks(vec![21; 8]);

        let mut store = FileProvider::open_with(&path, Durability::WriteBack).unwrap();
        store.save_chunk(pos, &chunk).unwrap();

        // Break the payload directory so the flush write fails.
        let chunks_dir = path.join("chunks");
        std::fs::remove_dir_all(&chunks_dir).unwrap();
        std::fs::write(&chunks_dir, b"in the way").unwrap();
        assert!(store.flush().is_err());

        // The accepted save is still buffered, not silently dropped: once
        // the directory is repaired the next flush lands it.
        assert_eq!(store.load_chunk(pos).unwrap(), ChunkLoad::Found(chunk.clone()));
        std::fs::remove_file(&chunks_dir).unwrap();
        std::fs::create_dir_all(&chunks_dir).unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        let store = FileProvider::open(&path).unwrap();
        assert_eq!(store.load_chunk(pos).unwrap(), ChunkLoad::Found(chunk));
    }

    #[test]
    fn close_is_single_call() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileProvider::open(tmp.path().join("world_data")).unwrap();
        store.close().unwrap();
        assert!(matches!(store.close(), Err(ProviderError::Close { .. })));
        assert!(matches!(
            store.save_chunk(ChunkPos::new(0, 0), &Chunk::empty()),
            Err(ProviderError::Write { .. })
        ));
        // Loads are retired along with saves.
        assert!(matches!(
            store.load_chunk(ChunkPos::new(0, 0)),
            Err(ProviderError::Read { .. })
        ));
        assert!(matches!(
            store.load_entities(ChunkPos::new(0, 0)),
            Err(ProviderError::Read { .. })
        ));
    }

    #[test]
    fn verify_integrity_passes_on_clean_store() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileProvider::open(tmp.path().join("world_data")).unwrap();
        store
            .save_chunk(ChunkPos::new(0, 0), &Chunk::from_blocks(vec![1]))
            .unwrap();
        store
            .save_entities(ChunkPos::new(0, 0), &[EntityRecord::new("pig", Vec3::ZERO)])
            .unwrap();
        store.verify_integrity().unwrap();
    }
}
