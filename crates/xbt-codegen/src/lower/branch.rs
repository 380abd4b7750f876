//! Branch-family lowering (spec.md §4.4 "Branch"): `JMP`/`Jcc`/`CALL`/
//! `RET`, `CMOVcc`/`SETcc`, and the temp-free `XCHG` swap.
//!
//! `JMP`/`Jcc`/`CALL`/`RET` all end the basic block (spec.md's glossary:
//! "a basic block ... ending at the first control-transfer instruction").
//! None of them know their target's host address at translation time (this
//! core translates one block per call, spec.md §4.6), so every one of them
//! exits through the same fixed block-exit trampoline: a host `RET`
//! (`0xC3`) followed by 4 reserved `NOP` bytes, which `xbt-jit::opt::link`
//! (C9) locates and overwrites with a `JMP rel32` once the successor's
//! address is known (see `DESIGN.md`'s design note on this split).
//! `CMOVcc`/`SETcc`/`XCHG` are plain data operations and do not terminate
//! the block.

use xbt_decode::classify;
use xbt_types::DecodedInsn;

use crate::emit::cond::{self, Cond};
use crate::emit::{arm64, x86_64 as x86};
use crate::emit::CodeBuffer;
use crate::lower::{LowerOutcome, MappedRegs};

const SCRATCH: u8 = 17;

/// Recover the ARM64 condition for a `Jcc`/`CMOVcc`/`SETcc` instruction
/// from its low-nibble x86 condition code.
fn decoded_cond(insn: &DecodedInsn) -> Cond {
    let cc = insn.effective_opcode() & 0x0F;
    cond::from_x86_short_jcc(0x70 | cc).unwrap_or(Cond::Al)
}

/// Append the shared block-exit trampoline: a host `RET` plus 4 reserved
/// `NOP` bytes, giving the linker (`xbt-jit::opt::link`) a full 5 bytes to
/// overwrite in place with a `JMP rel32` once the successor is known.
fn emit_exit_trampoline(buf: &mut CodeBuffer) {
    x86::ret(buf);
    for _ in 0..4 {
        x86::nop(buf);
    }
}

pub fn lower(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> LowerOutcome {
    let dst = regs.dst;

    if classify::is_jmp(insn) {
        emit_exit_trampoline(buf);
        return LowerOutcome::terminates();
    }
    if classify::is_jcc(insn) {
        let taken = decoded_cond(insn);
        // The conditional ARM64 branch guards the exit trampoline:
        // `B.cond +8` skips it entirely when the condition doesn't hold,
        // falling through into the next translated block instead.
        buf.push_u32(arm64::b_cond(taken, 2));
        emit_exit_trampoline(buf);
        return LowerOutcome::terminates();
    }
    if classify::is_call(insn) {
        emit_exit_trampoline(buf);
        return LowerOutcome::terminates();
    }
    if classify::is_ret(insn) {
        emit_exit_trampoline(buf);
        return LowerOutcome::terminates();
    }
    if classify::is_cmovcc(insn) {
        let cond = decoded_cond(insn);
        let src = regs.src.unwrap_or(dst);
        buf.push_u32(arm64::csel(dst, src, dst, cond));
        return LowerOutcome::continues();
    }
    if classify::is_setcc(insn) {
        let cond = decoded_cond(insn);
        buf.push_u32(arm64::cset(dst, cond));
        return LowerOutcome::continues();
    }
    if classify::is_xchg(insn) {
        // `a ^= b; b ^= a; a ^= b` — no scratch register needed.
        let src = regs.src.unwrap_or(SCRATCH);
        buf.push_u32(arm64::eor_reg(dst, dst, src));
        buf.push_u32(arm64::eor_reg(src, src, dst));
        buf.push_u32(arm64::eor_reg(dst, dst, src));
        return LowerOutcome::continues();
    }

    LowerOutcome::continues()
}
