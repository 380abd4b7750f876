//! Engine tuning knobs (SPEC_FULL.md §4.C). Defined here rather than in the
//! root facade crate because `xbt-jit::block`/`cache`/`arena`/`engine` all
//! consume these fields directly; the facade crate re-exports the type so
//! it still presents as "the" `EngineConfig` to embedders, matching
//! `aero-jit`'s thin-wrapper-crate pattern (`DESIGN.md`).

/// Tunables for one [`crate::engine::Engine`] instance. Constructed
/// programmatically by the embedding process — no file- or env-based
/// parsing is in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// `k`; the translation cache holds `2^k` direct-mapped slots.
    pub cache_slots_log2: u32,
    /// Bytes per code arena region.
    pub arena_capacity: usize,
    /// Hit-counter threshold past which a cache slot is considered hot.
    pub hot_threshold: u32,
    /// Bound on instructions translated per block (spec.md §4.6 step 3).
    pub max_block_instructions: usize,
    /// Capacity of the scratch buffer a block is assembled in before
    /// being copied into the arena (spec.md §4.6 step 2).
    pub block_scratch_capacity: usize,
    /// Run the C9 peephole pass after every fresh translation.
    pub enable_peephole: bool,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            cache_slots_log2: 14,
            arena_capacity: 16 * 1024 * 1024,
            hot_threshold: 50,
            max_block_instructions: 64,
            block_scratch_capacity: 64 * 1024,
            enable_peephole: true,
        }
    }
}
