//! `xbt`: an x86_64-guest to ARM64-host dynamic binary translator core.
//!
//! This crate is a thin facade over the four workspace members — the
//! layering mirrors `aero-jit`'s own split between its `aero-jit-x86`
//! frontend and the `aero-jit-proto`/`aero-cpu-decoder` engine it wraps:
//!
//! - [`xbt_types`] — shared value types (register numbering, operand
//!   widths, the decoded-instruction record).
//! - [`xbt_decode`] — the guest decoder and instruction-category
//!   predicates (C1).
//! - [`xbt_codegen`] — the host emitter, register mapper, per-category
//!   translators, and dispatcher (C2-C5).
//! - [`xbt_jit`] — the code arena, translation cache, block optimiser/
//!   linker, block translator, executor, and the orchestrating
//!   [`Engine`] (C6-C10).
//!
//! Construct an [`Engine`] with an [`EngineConfig`], implement
//! [`GuestMemory`] over however the embedder maps guest memory, and call
//! [`Engine::translate`] / [`Engine::run`].

pub use xbt_codegen::emit;
pub use xbt_codegen::regmap;
pub use xbt_codegen::{dispatch, DispatchResult, MappedRegs};
pub use xbt_decode::{classify, decode, Category};
pub use xbt_jit::{
    arena, block, cache, config, engine, exec, opt, ArenaError, BlockError, BlockExit, CacheHit,
    CacheStats, CodeArena, Engine, EngineConfig, FaultKind, GuestMemory, LinkError, Telemetry,
    TranslationCache, TranslationResult,
};
pub use xbt_types::{DecodedInsn, GuestFlags, GuestReg, Gpr, ModRm, Rex, SegmentOverride, Vreg, Width};

/// Translate the block at `pc` and immediately execute it, looping on
/// `BlockExit::RetToCache` until a syscall or fault exit, or `max_blocks`
/// blocks have run — whichever comes first. A thin convenience wrapper;
/// embedders that need to interleave syscall emulation or signal delivery
/// should call [`Engine::translate`] and [`exec::enter`] directly instead.
///
/// [`exec::enter`] is a documented stub (no real aarch64 target exists to
/// jump into in this core): it never actually runs the translation, so it
/// cannot report a branch's real destination. This loop only auto-advances
/// past a block that did NOT end in an explicit guest branch — the
/// synthetic fall-through trampoline `xbt-jit::block` appends when a block
/// exhausts its instruction budget, where the next guest pc is simply
/// `pc + guest_length`. A block that ends in a real `JMP`/`Jcc`/`CALL`/
/// `RET` hands control to a destination only genuine execution can supply,
/// so this wrapper stops and returns there.
pub fn run(
    engine: &mut Engine,
    memory: &dyn GuestMemory,
    state: exec::GuestStatePtr,
    mut pc: u64,
    max_blocks: usize,
) -> Result<BlockExit, BlockError> {
    for _ in 0..max_blocks {
        let translation = engine.translate(memory, pc)?;
        match exec::enter(translation.host_ptr as *const u8, state) {
            BlockExit::RetToCache if !translation.ends_with_branch => {
                pc = pc.wrapping_add(translation.guest_length);
            }
            other => return Ok(other),
        }
    }
    Ok(BlockExit::RetToCache)
}
