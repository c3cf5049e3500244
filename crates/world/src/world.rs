use chunkvault_common::{BlockPos, Chunk, ChunkPos, EntityRecord, GameMode};
use chunkvault_provider::{ChunkLoad, Provider, ProviderError};
use std::collections::{HashMap, HashSet};

/// A chunk-based world bound to one storage provider.
///
/// The world pulls everything: the provider never calls back in. Loaded
/// chunks and entity lists are cached here and owned by the world; the
/// provider only sees them again when dirty state is flushed.
pub struct World {
    name: String,
    provider: Box<dyn Provider>,
    chunks: HashMap<ChunkPos, Chunk>,
    entities: HashMap<ChunkPos, Vec<EntityRecord>>,
    dirty_chunks: HashSet<ChunkPos>,
    dirty_entities: HashSet<ChunkPos>,
    /// Elapsed ticks, mirrored from the provider at construction and
    /// written back on flush so a tick loop never does per-tick I/O.
    time: i64,
    time_cycle: bool,
    closed: bool,
}

impl World {
    /// Create a world around an injected provider, adopting the provider's
    /// stored name and time state.
    pub fn new(provider: Box<dyn Provider>) -> Self {
        let name = provider.world_name();
        let time = provider.load_time();
        let time_cycle = provider.load_time_cycle();
        Self {
            name,
            provider,
            chunks: HashMap::new(),
            entities: HashMap::new(),
            dirty_chunks: HashSet::new(),
            dirty_entities: HashSet::new(),
            time,
            time_cycle,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the world, mirroring the name into the provider.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.provider.set_world_name(name);
    }

    pub fn spawn(&self) -> BlockPos {
        self.provider.world_spawn()
    }

    pub fn set_spawn(&mut self, pos: BlockPos) {
        self.provider.set_world_spawn(pos);
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn set_time(&mut self, time: i64) {
        self.time = time;
    }

    pub fn time_cycle(&self) -> bool {
        self.time_cycle
    }

    pub fn set_time_cycle(&mut self, running: bool) {
        self.time_cycle = running;
    }

    pub fn default_game_mode(&self) -> GameMode {
        self.provider.default_game_mode()
    }

    pub fn set_default_game_mode(&mut self, mode: GameMode) {
        self.provider.set_default_game_mode(mode);
    }

    /// Read-only access to the owned provider.
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Number of chunks currently held in memory.
    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Get the chunk at `pos`, loading it from the provider or generating
    /// it when the provider has nothing valid.
    ///
    /// Never-saved positions generate silently; corrupt data is logged and
    /// regenerated. Generated chunks are marked dirty so the next flush
    /// persists them.
    pub fn load_or_generate(
        &mut self,
        pos: ChunkPos,
        generate: impl FnOnce(ChunkPos) -> Chunk,
    ) -> &Chunk {
        assert!(!self.closed, "world used after close");
        if !self.chunks.contains_key(&pos) {
            let chunk = match self.provider.load_chunk(pos) {
                Ok(ChunkLoad::Found(chunk)) => chunk,
                Ok(ChunkLoad::NotFound) => {
                    tracing::trace!(%pos, "chunk not saved, generating");
                    self.dirty_chunks.insert(pos);
                    generate(pos)
                }
                Err(e) => {
                    tracing::warn!(%pos, error = %e, "saved chunk unreadable, regenerating");
                    self.dirty_chunks.insert(pos);
                    generate(pos)
                }
            };
            self.chunks.insert(pos, chunk);
        }
        &self.chunks[&pos]
    }

    /// Mutable access to a loaded chunk, marking it dirty.
    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        let chunk = self.chunks.get_mut(&pos)?;
        self.dirty_chunks.insert(pos);
        Some(chunk)
    }

    /// Entities at `pos`, loaded from the provider on first access.
    /// Unreadable entity data is surfaced to the caller, who decides
    /// whether to drop or retry.
    pub fn entities(&mut self, pos: ChunkPos) -> Result<&[EntityRecord], ProviderError> {
        assert!(!self.closed, "world used after close");
        if !self.entities.contains_key(&pos) {
            let list = self.provider.load_entities(pos)?;
            self.entities.insert(pos, list);
        }
        Ok(&self.entities[&pos])
    }

    /// Replace the entity set for a chunk position.
    pub fn set_entities(&mut self, pos: ChunkPos, entities: Vec<EntityRecord>) {
        self.entities.insert(pos, entities);
        self.dirty_entities.insert(pos);
    }

    /// Save a chunk to the provider and drop it from memory, as on cache
    /// eviction. Clean chunks are dropped without a write.
    pub fn evict(&mut self, pos: ChunkPos) -> Result<(), ProviderError> {
        if self.dirty_chunks.contains(&pos)
            && let Some(chunk) = self.chunks.get(&pos)
        {
            self.provider.save_chunk(pos, chunk)?;
            self.dirty_chunks.remove(&pos);
        }
        self.chunks.remove(&pos);
        if self.dirty_entities.contains(&pos)
            && let Some(list) = self.entities.get(&pos)
        {
            self.provider.save_entities(pos, list)?;
            self.dirty_entities.remove(&pos);
        }
        self.entities.remove(&pos);
        Ok(())
    }

    /// Write all dirty chunks, entity sets, and time state to the provider.
    ///
    /// Stops at the first write failure; everything not yet saved stays
    /// dirty, so the caller may retry the flush or drop the writes.
    pub fn flush(&mut self) -> Result<(), ProviderError> {
        let dirty: Vec<ChunkPos> = self.dirty_chunks.iter().copied().collect();
        for pos in dirty {
            if let Some(chunk) = self.chunks.get(&pos) {
                self.provider.save_chunk(pos, chunk)?;
            }
            self.dirty_chunks.remove(&pos);
        }
        let dirty: Vec<ChunkPos> = self.dirty_entities.iter().copied().collect();
        for pos in dirty {
            if let Some(list) = self.entities.get(&pos) {
                self.provider.save_entities(pos, list)?;
            }
            self.dirty_entities.remove(&pos);
        }
        self.provider.save_time(self.time);
        self.provider.save_time_cycle(self.time_cycle);
        Ok(())
    }

    /// Swap in a new provider: flush and close the old one, then adopt the
    /// new provider's stored name and time state.
    pub fn replace_provider(&mut self, provider: Box<dyn Provider>) -> Result<(), ProviderError> {
        self.flush()?;
        self.provider.close()?;
        self.provider = provider;
        self.name = self.provider.world_name();
        self.time = self.provider.load_time();
        self.time_cycle = self.provider.load_time_cycle();
        // Cached chunks remain valid; dirty state was already flushed.
        tracing::debug!(name = %self.name, "world provider replaced");
        Ok(())
    }

    /// Flush and close the provider. Single-call: using the world after a
    /// successful close is a programmer error.
    pub fn close(&mut self) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::close("world is already closed"));
        }
        self.flush()?;
        self.provider.close()?;
        self.closed = true;
        Ok(())
    }
}
