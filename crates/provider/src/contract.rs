use chunkvault_common::{BlockPos, Chunk, ChunkPos, EntityRecord, GameMode};

/// Spawn point reported for a world with no saved spawn. Sits above the
/// world floor so a fresh player never spawns inside terrain.
pub const DEFAULT_SPAWN: BlockPos = BlockPos::new(0, 30, 0);

/// Game mode assigned when no default was ever saved. Adventure is the most
/// permissive mode that cannot damage the world.
pub const DEFAULT_GAME_MODE: GameMode = GameMode::Adventure;

/// Errors a storage backend may surface through the contract.
///
/// "Not found" is never one of these: a missing chunk or absent metadata is
/// a first-class success outcome (see [`ChunkLoad::NotFound`] and the
/// documented metadata defaults).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Data was present at the key but is corrupt or undecodable.
    #[error("unreadable data at {subject}: {detail}")]
    Read { subject: String, detail: String },
    /// A persistence attempt failed. The caller decides whether to retry,
    /// drop the write, or abort the save cycle; the backend never retries.
    #[error("write to {subject} failed: {detail}")]
    Write { subject: String, detail: String },
    /// Flushing buffered writes or releasing backend resources failed.
    #[error("close failed: {detail}")]
    Close { detail: String },
}

impl ProviderError {
    pub fn read(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::Read {
            subject: subject.into(),
            detail: detail.to_string(),
        }
    }

    pub fn write(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::Write {
            subject: subject.into(),
            detail: detail.to_string(),
        }
    }

    pub fn close(detail: impl ToString) -> Self {
        Self::Close {
            detail: detail.to_string(),
        }
    }
}

/// Successful outcome of a chunk load.
///
/// Together with the `Err` arm of [`Provider::load_chunk`] this forms the
/// tri-state result: found-valid, never-saved, or found-but-corrupt. The
/// world answers `NotFound` with procedural generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkLoad {
    /// Valid saved data. Ownership transfers to the caller.
    Found(Chunk),
    /// Nothing was ever saved at this position. Not an error.
    NotFound,
}

impl ChunkLoad {
    /// Collapse to an option, discarding the found/not-found distinction.
    pub fn into_option(self) -> Option<Chunk> {
        match self {
            ChunkLoad::Found(chunk) => Some(chunk),
            ChunkLoad::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ChunkLoad::Found(_))
    }
}

/// Storage for exactly one world's chunks, per-chunk entity lists, and
/// metadata, plus a release-of-resources operation.
///
/// The contract is synchronous and caller-driven: every operation completes
/// before returning, backends never call into the world, and no internal
/// retries happen. A backend doing disk I/O may block the calling thread;
/// callers wanting non-blocking behavior offload to a worker.
///
/// Metadata fields are independently settable — there is no atomicity
/// across setters. The provider owns its backend handles from construction
/// until [`Provider::close`]; no two worlds may share one provider.
pub trait Provider {
    /// Name of the world this provider stores. A world adopting this
    /// provider replaces its own name with this one.
    fn world_name(&self) -> String;

    fn set_world_name(&mut self, name: &str);

    /// The single spawn point used for all new-player spawns.
    fn world_spawn(&self) -> BlockPos;

    fn set_world_spawn(&mut self, pos: BlockPos);

    /// Load the chunk at `pos`. `Ok(Found)` is valid saved data,
    /// `Ok(NotFound)` means the position was never saved and the caller
    /// must generate, `Err(Read)` means data was present but unreadable.
    fn load_chunk(&self, pos: ChunkPos) -> Result<ChunkLoad, ProviderError>;

    /// Persist a chunk, overwriting any prior data at that position. The
    /// backend must not retain a borrow of `chunk` past this call; any
    /// retention is by owned copy or encoded bytes.
    fn save_chunk(&mut self, pos: ChunkPos, chunk: &Chunk) -> Result<(), ProviderError>;

    /// Entities previously saved at `pos`, in saved order, or an empty
    /// list if none were.
    fn load_entities(&self, pos: ChunkPos) -> Result<Vec<EntityRecord>, ProviderError>;

    /// Replace the entity set at `pos` wholesale. No merging: saving an
    /// empty list erases the set.
    fn save_entities(&mut self, pos: ChunkPos, entities: &[EntityRecord])
    -> Result<(), ProviderError>;

    /// Elapsed world time in ticks. The contract imposes no monotonicity.
    fn load_time(&self) -> i64;

    fn save_time(&mut self, time: i64);

    /// Whether in-world time advances automatically.
    fn load_time_cycle(&self) -> bool;

    fn save_time_cycle(&mut self, running: bool);

    /// Mode assigned to newly joining players with no saved mode.
    fn default_game_mode(&self) -> GameMode;

    fn set_default_game_mode(&mut self, mode: GameMode);

    /// Flush buffered writes and release backend resources. No operation
    /// is valid afterwards; backends document whether a second close is
    /// tolerated or an error.
    fn close(&mut self) -> Result<(), ProviderError>;
}
