//! The top-level engine object: owns the cache (C8) and arena (C7), and
//! orchestrates translation, linking, and flush-and-retry. Per spec.md
//! §9's "Global mutable state" redesign note, there is no module-level
//! storage anywhere in this crate — every operation in §4 goes through one
//! of these methods on an explicit object the embedder owns.

use crate::arena::CodeArena;
use crate::block::{self, BlockError, GuestMemory, TranslationResult};
use crate::cache::{CacheStats, TranslationCache};
use crate::config::EngineConfig;
use crate::opt::{self, LinkError};

/// Cumulative counters an embedder can poll, grounded on `aero-jit-proto`'s
/// `telemetry_snapshot()` (spec.md §4.E).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub flush_count: u64,
    pub bytes_used: usize,
}

/// Owns the cache and arena for one guest address space. Not `Sync`;
/// spec.md §5 assigns one engine view per guest thread, with the cache and
/// arena as the only structures shared across threads (a future embedding
/// wraps both in the locking discipline §5 describes — out of scope here).
pub struct Engine {
    cache: TranslationCache,
    arena: CodeArena,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Engine, crate::arena::ArenaError> {
        let cache = TranslationCache::new(config.cache_slots_log2, config.hot_threshold);
        let arena = CodeArena::new(config.arena_capacity)?;
        Ok(Engine {
            cache,
            arena,
            config,
        })
    }

    /// `translate(guest_pc) -> TranslationResult` (spec.md §6). On arena
    /// exhaustion, performs exactly one flush-and-retry (spec.md §4.7/§7)
    /// before giving up.
    pub fn translate(
        &mut self,
        memory: &dyn GuestMemory,
        pc: u64,
    ) -> Result<TranslationResult, BlockError> {
        match block::translate(memory, pc, &mut self.cache, &mut self.arena, &self.config) {
            Err(BlockError::ArenaExhausted) => {
                self.flush();
                block::translate(memory, pc, &mut self.cache, &mut self.arena, &self.config)
            }
            other => other,
        }
    }

    /// `link(from_pc, to_pc, slot)` (spec.md §4.9/§6): patch `from_pc`'s
    /// trampoline to branch directly into `to_pc`'s translation, and
    /// record the chain in the cache.
    pub fn link(&mut self, from_pc: u64, to_pc: u64, slot: usize) -> Result<(), LinkError> {
        let from = self.cache.lookup(from_pc).ok_or(LinkError::NoTrampoline)?;
        let to = self.cache.lookup(to_pc).ok_or(LinkError::NoTrampoline)?;

        let region = unsafe {
            std::slice::from_raw_parts_mut(from.host_addr as *mut u8, from.size)
        };
        self.arena.make_writable()?;
        opt::link(region, from.host_addr as i64, to.host_addr as i64)?;
        self.arena.make_executable()?;

        self.cache.chain(from_pc, to_pc, slot);
        self.cache.set_linked(from_pc, true);
        Ok(())
    }

    /// `unlink(pc)` (spec.md §4.9/§6): clear the chain bookkeeping for
    /// `pc`. Per spec.md §4.9, the original `RET` trampoline is NOT
    /// restored — a subsequent re-translation or flush re-establishes one.
    pub fn unlink(&mut self, pc: u64) {
        self.cache.set_linked(pc, false);
    }

    pub fn invalidate(&mut self, pc: u64) -> bool {
        self.cache.invalidate(pc)
    }

    /// Stop-the-world flush (spec.md §5): clears the cache and rewinds the
    /// arena cursor. Callers are responsible for the thread-quiescence
    /// barrier spec.md §5 requires before calling this.
    pub fn flush(&mut self) {
        self.cache.flush();
        self.arena.reset();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn telemetry(&self) -> Telemetry {
        let stats = self.cache_stats();
        Telemetry {
            cache_hits: stats.hits,
            cache_misses: stats.misses,
            flush_count: stats.flushes,
            bytes_used: self.arena.cursor(),
        }
    }
}
