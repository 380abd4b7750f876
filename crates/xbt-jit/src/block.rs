//! The block translator (C6, spec.md §4.6): drives C1 -> C3 -> C5 (which
//! calls C2/C4) in a bounded loop over a scratch buffer, then installs the
//! result into the arena and cache.

use thiserror::Error;

use xbt_codegen::emit::{x86_64 as x86, CodeBuffer};
use xbt_codegen::{regmap, MappedRegs};
use xbt_decode::decode;
use xbt_types::DecodedInsn;

use crate::arena::{ArenaError, CodeArena};
use crate::cache::TranslationCache;
use crate::config::EngineConfig;

/// Unverified guest-memory access, out of this core's scope (spec.md §6's
/// "Address translation" collaborator) beyond this narrow read interface.
pub trait GuestMemory {
    /// Return up to `max_len` bytes starting at `pc`. May return fewer if
    /// a mapping boundary is hit; an empty slice signals unreadable
    /// memory and causes the block to terminate immediately.
    fn read(&self, pc: u64, max_len: usize) -> &[u8];
}

/// Names match SPEC_FULL.md §4.A's `xbt_jit::BlockError` list; `Arena` is a
/// supplemented variant for the (rare) OS-level protection-toggle failure,
/// which the spec's own four-variant list does not separately enumerate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("scratch code buffer overflowed during translation")]
    BufferOverflow,
    #[error("guest byte sequence at the current pc could not be decoded")]
    UndecodableInstruction,
    #[error("code arena is exhausted")]
    ArenaExhausted,
    #[error("block translation produced zero instructions")]
    EmptyBlock,
    #[error("arena protection toggle failed: {0}")]
    Arena(String),
}

impl From<ArenaError> for BlockError {
    fn from(e: ArenaError) -> BlockError {
        BlockError::Arena(e.to_string())
    }
}

/// `TranslationResult` (spec.md §3): what C6 hands back to C10, whether by
/// a fresh translation or straight from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationResult {
    pub host_ptr: usize,
    pub size: usize,
    pub guest_entry_pc: u64,
    /// Guest bytes this block actually consumed (`0` for a cache hit, where
    /// the original decode isn't repeated — callers needing it should keep
    /// it from the miss that first produced this entry).
    pub guest_length: u64,
    pub instruction_count: u32,
    pub ends_with_branch: bool,
    pub from_cache: bool,
}

/// Recover which guest register slots (raw `0..=15`, already REX-extended
/// by the decoder) an instruction's destination/source operands name.
/// Instructions with a `ModR/M` byte take `reg`/`rm`; the handful of
/// opcode-embedded forms (`PUSH`/`POP`/`MOV r, imm64`/short `XCHG`) fold
/// their register out of the primary opcode's low 3 bits and `REX.B`. Short
/// `XCHG` (`0x91..=0x97`) also swaps against the implicit accumulator
/// (guest register `0`), which is returned as `src`.
fn guest_operand_regs(insn: &DecodedInsn) -> (Option<u8>, Option<u8>) {
    if let Some(m) = insn.modrm {
        (Some(m.reg), Some(m.rm))
    } else {
        let low3 = insn.primary_opcode & 0x7;
        let embedded = low3 | if insn.rex.b { 0x8 } else { 0 };
        match insn.primary_opcode {
            0x50..=0x57 | 0x58..=0x5F | 0xB8..=0xBF => (Some(embedded), None),
            0x91..=0x97 => (Some(embedded), Some(0)),
            _ => (None, None),
        }
    }
}

fn mapped_regs(insn: &DecodedInsn) -> MappedRegs {
    let (guest_dst, guest_src) = guest_operand_regs(insn);
    MappedRegs {
        dst: guest_dst.map(regmap::map_gpr).unwrap_or(0),
        src: guest_src.map(regmap::map_gpr),
    }
}

/// Translate one guest basic block starting at `pc`, consulting the cache
/// first (spec.md §4.6 step 1).
pub fn translate(
    memory: &dyn GuestMemory,
    pc: u64,
    cache: &mut TranslationCache,
    arena: &mut CodeArena,
    config: &EngineConfig,
) -> Result<TranslationResult, BlockError> {
    if let Some(hit) = cache.lookup(pc) {
        return Ok(TranslationResult {
            host_ptr: hit.host_addr,
            size: hit.size,
            guest_entry_pc: pc,
            guest_length: 0,
            instruction_count: 0,
            ends_with_branch: true,
            from_cache: true,
        });
    }

    let mut scratch = CodeBuffer::with_capacity(config.block_scratch_capacity);
    let mut cur_pc = pc;
    let mut instruction_count: u32 = 0;
    let mut ends_with_branch = false;

    while (instruction_count as usize) < config.max_block_instructions {
        let bytes = memory.read(cur_pc, 15);
        if bytes.is_empty() {
            break;
        }
        let insn = decode(bytes);
        if insn.is_undecodable() {
            // spec.md §7: a zero-length decode is a block-level failure —
            // abandon the whole block rather than returning a partial one.
            tracing::warn!(pc = cur_pc, "undecodable guest byte sequence, abandoning block");
            return Err(BlockError::UndecodableInstruction);
        }

        let regs = mapped_regs(&insn);
        let result = xbt_codegen::dispatch(&mut scratch, &insn, regs);
        if !result.success {
            tracing::warn!(
                pc = cur_pc,
                opcode = insn.effective_opcode(),
                "unrecognised opcode, emitted host NOP"
            );
        }

        instruction_count += 1;
        cur_pc += insn.length as u64;

        if scratch.overflowed() {
            break;
        }
        if result.ends_block {
            ends_with_branch = true;
            break;
        }
    }

    if instruction_count == 0 {
        // Nothing was decoded at all (guest memory was unreadable from
        // the very first byte) — spec.md §7's "abandon the block, return
        // an empty result".
        return Err(BlockError::EmptyBlock);
    }

    if !ends_with_branch {
        // Same padded trampoline shape `xbt-codegen::lower::branch` emits
        // for an explicit guest `RET`, so this fallback exit is equally
        // patchable by the linker (spec.md §4.9).
        x86::ret(&mut scratch);
        for _ in 0..4 {
            x86::nop(&mut scratch);
        }
    }

    if scratch.overflowed() {
        return Err(BlockError::BufferOverflow);
    }

    let size = scratch.len();
    let mut final_bytes = scratch.bytes().to_vec();
    if config.enable_peephole {
        crate::opt::peephole(&mut final_bytes);
    }

    arena.make_writable()?;
    let offset = arena.allocate(size, 4).ok_or(BlockError::ArenaExhausted)?;
    arena.write(offset, &final_bytes);
    arena.make_executable()?;
    let host_ptr = arena.executable_ptr(offset).expect("just made executable") as usize;

    cache.insert(pc, host_ptr, size);

    Ok(TranslationResult {
        host_ptr,
        size,
        guest_entry_pc: pc,
        guest_length: cur_pc - pc,
        instruction_count,
        ends_with_branch,
        from_cache: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMemory(Vec<u8>);
    impl GuestMemory for FixedMemory {
        fn read(&self, pc: u64, max_len: usize) -> &[u8] {
            let start = pc as usize;
            if start >= self.0.len() {
                return &[];
            }
            let end = (start + max_len).min(self.0.len());
            &self.0[start..end]
        }
    }

    #[test]
    fn translate_ret_only_block_terminates_with_branch() {
        let memory = FixedMemory(vec![0xC3]); // RET
        let mut cache = TranslationCache::new(10, 50);
        let mut arena = CodeArena::new(64 * 1024).unwrap();
        let config = EngineConfig::default();
        let result = translate(&memory, 0, &mut cache, &mut arena, &config).unwrap();
        assert!(result.ends_with_branch);
        assert!(!result.from_cache);
        assert_eq!(result.instruction_count, 1);
    }

    #[test]
    fn second_translation_of_same_pc_hits_cache() {
        let memory = FixedMemory(vec![0xC3]);
        let mut cache = TranslationCache::new(10, 50);
        let mut arena = CodeArena::new(64 * 1024).unwrap();
        let config = EngineConfig::default();
        let first = translate(&memory, 0, &mut cache, &mut arena, &config).unwrap();
        let second = translate(&memory, 0, &mut cache, &mut arena, &config).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.host_ptr, second.host_ptr);
    }

    #[test]
    fn undecodable_byte_sequence_abandons_the_block() {
        let memory = FixedMemory(vec![0x0F]); // escape with nothing following
        let mut cache = TranslationCache::new(10, 50);
        let mut arena = CodeArena::new(64 * 1024).unwrap();
        let config = EngineConfig::default();
        let result = translate(&memory, 0, &mut cache, &mut arena, &config);
        assert_eq!(result, Err(BlockError::UndecodableInstruction));
    }

    #[test]
    fn unreadable_memory_from_the_start_reports_an_empty_block() {
        let memory = FixedMemory(vec![]);
        let mut cache = TranslationCache::new(10, 50);
        let mut arena = CodeArena::new(64 * 1024).unwrap();
        let config = EngineConfig::default();
        let result = translate(&memory, 0, &mut cache, &mut arena, &config);
        assert_eq!(result, Err(BlockError::EmptyBlock));
    }

    #[test]
    fn short_xchg_captures_the_accumulator_as_src() {
        let insn = decode(&[0x91, 0xC3]); // XCHG ECX, EAX ; RET
        let (dst, src) = guest_operand_regs(&insn);
        assert_eq!(dst, Some(1)); // embedded register: ECX
        assert_eq!(src, Some(0)); // implicit accumulator: EAX
    }

    #[test]
    fn translate_xchg_followed_by_ret_maps_both_operands() {
        let memory = FixedMemory(vec![0x91, 0xC3]); // XCHG ECX, EAX ; RET
        let mut cache = TranslationCache::new(10, 50);
        let mut arena = CodeArena::new(64 * 1024).unwrap();
        let config = EngineConfig::default();
        let result = translate(&memory, 0, &mut cache, &mut arena, &config).unwrap();
        assert_eq!(result.instruction_count, 2);
    }
}
