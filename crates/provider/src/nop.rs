use crate::contract::{ChunkLoad, DEFAULT_GAME_MODE, DEFAULT_SPAWN, Provider, ProviderError};
use chunkvault_common::{BlockPos, Chunk, ChunkPos, EntityRecord, GameMode};

/// A provider that performs no I/O and retains no state.
///
/// Every chunk position is always freshly generated, every save is accepted
/// and discarded, and every load reports the documented defaults for a world
/// with no prior state. Intended for ephemeral worlds: tests, temporary
/// instances, preview servers. Proves the contract is satisfiable with
/// trivial state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopProvider;

impl Provider for NopProvider {
    fn world_name(&self) -> String {
        String::new()
    }

    fn set_world_name(&mut self, _name: &str) {}

    fn world_spawn(&self) -> BlockPos {
        DEFAULT_SPAWN
    }

    fn set_world_spawn(&mut self, _pos: BlockPos) {}

    fn load_chunk(&self, _pos: ChunkPos) -> Result<ChunkLoad, ProviderError> {
        Ok(ChunkLoad::NotFound)
    }

    fn save_chunk(&mut self, _pos: ChunkPos, _chunk: &Chunk) -> Result<(), ProviderError> {
        Ok(())
    }

    fn load_entities(&self, _pos: ChunkPos) -> Result<Vec<EntityRecord>, ProviderError> {
        Ok(Vec::new())
    }

    fn save_entities(
        &mut self,
        _pos: ChunkPos,
        _entities: &[EntityRecord],
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    fn load_time(&self) -> i64 {
        0
    }

    fn save_time(&mut self, _time: i64) {}

    fn load_time_cycle(&self) -> bool {
        true
    }

    fn save_time_cycle(&mut self, _running: bool) {}

    fn default_game_mode(&self) -> GameMode {
        DEFAULT_GAME_MODE
    }

    fn set_default_game_mode(&mut self, _mode: GameMode) {}

    /// Always succeeds, including when called more than once.
    fn close(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_report_documented_defaults() {
        let p = NopProvider;
        assert_eq!(p.world_name(), "");
        assert_eq!(p.world_spawn(), BlockPos::new(0, 30, 0));
        assert_eq!(p.load_time(), 0);
        assert!(p.load_time_cycle());
        assert_eq!(p.default_game_mode(), GameMode::Adventure);
        assert_eq!(p.load_chunk(ChunkPos::new(3, -2)).unwrap(), ChunkLoad::NotFound);
        assert!(p.load_entities(ChunkPos::new(3, -2)).unwrap().is_empty());
    }

    #[test]
    fn saves_are_discarded() {
        let mut p = NopProvider;
        let pos = ChunkPos::new(0, 0);
        p.save_chunk(pos, &Chunk::from_blocks(vec![1, 2, 3])).unwrap();
        p.save_entities(pos, &[EntityRecord::new("pig", glam::Vec3::ZERO)])
            .unwrap();
        p.save_time(1200);
        p.save_time_cycle(false);
        p.set_world_name("ignored");
        p.set_world_spawn(BlockPos::new(9, 9, 9));
        p.set_default_game_mode(GameMode::Creative);

        // Every load behaves as if no save ever happened.
        assert_eq!(p.load_chunk(pos).unwrap(), ChunkLoad::NotFound);
        assert!(p.load_entities(pos).unwrap().is_empty());
        assert_eq!(p.load_time(), 0);
        assert!(p.load_time_cycle());
        assert_eq!(p.world_name(), "");
        assert_eq!(p.world_spawn(), BlockPos::new(0, 30, 0));
        assert_eq!(p.default_game_mode(), GameMode::Adventure);
    }

    #[test]
    fn close_is_idempotent() {
        let mut p = NopProvider;
        p.close().unwrap();
        p.close().unwrap();
    }
}
