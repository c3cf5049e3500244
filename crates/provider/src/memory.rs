use crate::contract::{ChunkLoad, DEFAULT_GAME_MODE, DEFAULT_SPAWN, Provider, ProviderError};
use chunkvault_common::{BlockPos, Chunk, ChunkPos, EntityRecord, GameMode};
use std::collections::HashMap;

/// A volatile provider backed by in-process maps.
///
/// Honors the full contract semantics — round-trip, overwrite-replace, the
/// tri-state load — but loses everything when dropped. Used by contract
/// tests and by ephemeral worlds that still want within-session persistence.
#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    spawn: BlockPos,
    time: i64,
    time_cycle: bool,
    game_mode: GameMode,
    chunks: HashMap<ChunkPos, Chunk>,
    entities: HashMap<ChunkPos, Vec<EntityRecord>>,
}

impl MemoryProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spawn: DEFAULT_SPAWN,
            time: 0,
            time_cycle: true,
            game_mode: DEFAULT_GAME_MODE,
            chunks: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    /// Number of chunk positions with saved block data.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new("")
    }
}

impl Provider for MemoryProvider {
    fn world_name(&self) -> String {
        self.name.clone()
    }

    fn set_world_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn world_spawn(&self) -> BlockPos {
        self.spawn
    }

    fn set_world_spawn(&mut self, pos: BlockPos) {
        self.spawn = pos;
    }

    fn load_chunk(&self, pos: ChunkPos) -> Result<ChunkLoad, ProviderError> {
        Ok(match self.chunks.get(&pos) {
            Some(chunk) => ChunkLoad::Found(chunk.clone()),
            None => ChunkLoad::NotFound,
        })
    }

    fn save_chunk(&mut self, pos: ChunkPos, chunk: &Chunk) -> Result<(), ProviderError> {
        self.chunks.insert(pos, chunk.clone());
        Ok(())
    }

    fn load_entities(&self, pos: ChunkPos) -> Result<Vec<EntityRecord>, ProviderError> {
        Ok(self.entities.get(&pos).cloned().unwrap_or_default())
    }

    fn save_entities(
        &mut self,
        pos: ChunkPos,
        entities: &[EntityRecord],
    ) -> Result<(), ProviderError> {
        self.entities.insert(pos, entities.to_vec());
        Ok(())
    }

    fn load_time(&self) -> i64 {
        self.time
    }

    fn save_time(&mut self, time: i64) {
        self.time = time;
    }

    fn load_time_cycle(&self) -> bool {
        self.time_cycle
    }

    fn save_time_cycle(&mut self, running: bool) {
        self.time_cycle = running;
    }

    fn default_game_mode(&self) -> GameMode {
        self.game_mode
    }

    fn set_default_game_mode(&mut self, mode: GameMode) {
        self.game_mode = mode;
    }

    /// Nothing to flush or release; tolerated more than once.
    fn close(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }
}
