//! Memory-family lowering (spec.md §4.4 "Memory"): `MOV` in its register,
//! displacement, and 64-bit-immediate encodings; `MOVZX`/`MOVSX`/`MOVSXD`;
//! `LEA`; `PUSH`/`POP`. Guest addresses are used directly (identity
//! address space — spec.md §4.4's explicit non-goal for this layer).

use xbt_decode::classify;
use xbt_types::DecodedInsn;

use crate::emit::arm64;
use crate::emit::CodeBuffer;
use crate::lower::{LowerOutcome, MappedRegs};

const SCRATCH: u8 = 17;
/// Host stack pointer, mapped from the guest `RSP` by the caller but named
/// here because `PUSH`/`POP` address it directly regardless of which
/// guest register decoded to it.
const SP: u8 = 31;

fn materialize_imm(buf: &mut CodeBuffer, reg: u8, imm: i64) {
    for word in arm64::movz_movk_sequence(reg, imm as u64) {
        buf.push_u32(word);
    }
}

pub fn lower(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> LowerOutcome {
    let dst = regs.dst;

    if classify::is_mov_imm64(insn) {
        materialize_imm(buf, dst, insn.imm);
    } else if classify::is_mov(insn) {
        match insn.modrm {
            Some(m) if m.mode == 3 => {
                // register/register: a copy is `ORR Xd, XZR, Xn`.
                let src = regs.src.unwrap_or(dst);
                buf.push_u32(arm64::orr_reg(dst, 31, src));
            }
            Some(_) => {
                // register/memory: displacement off the mapped base
                // register (`src`), loaded through the scratch-offset form.
                let base = regs.src.unwrap_or(dst);
                if insn.disp != 0 {
                    materialize_imm(buf, SCRATCH, insn.disp);
                    buf.push_u32(arm64::add_reg(SCRATCH, base, SCRATCH));
                    buf.push_u32(arm64::ldr_imm(dst, SCRATCH, 0));
                } else {
                    buf.push_u32(arm64::ldr_imm(dst, base, 0));
                }
            }
            None => {
                // register/immediate (non-64-bit `C6`/`C7` forms).
                materialize_imm(buf, dst, insn.imm);
            }
        }
    } else if classify::is_movzx(insn) || classify::is_movsx(insn) {
        // Narrow-to-wide extension: the source width comes from the
        // opcode itself, not from REX.W/the operand-size prefix (those
        // describe the destination, which is always the full 64-bit
        // mapped register here) — `0xB6`/`0xBE` read an 8-bit source,
        // `0xB7`/`0xBF` a 16-bit source, and `MOVSXD` (`0x63`) a 32-bit one.
        let src = regs.src.unwrap_or(dst);
        if classify::is_movzx(insn) {
            let width = if insn.secondary_opcode == Some(0xB6) { 8 } else { 16 };
            buf.push_u32(arm64::ubfx(dst, src, 0, width));
        } else {
            let width = match insn.secondary_opcode {
                Some(0xBE) => 8,
                Some(0xBF) => 16,
                _ => 32, // MOVSXD
            };
            buf.push_u32(arm64::sbfx(dst, src, 0, width));
        }
    } else if classify::is_lea(insn) {
        // `base + index<<scale + disp`; this core does not track a
        // separate index register in `MappedRegs`, so the displacement is
        // folded onto the base (spec.md §4.4's "large displacements widen
        // into a movz/movk sequence ... then an add").
        let base = regs.src.unwrap_or(dst);
        if insn.disp == 0 {
            buf.push_u32(arm64::orr_reg(dst, 31, base));
        } else if (0..=0xFFF).contains(&insn.disp) {
            buf.push_u32(arm64::add_imm(dst, base, insn.disp as u16));
        } else {
            materialize_imm(buf, SCRATCH, insn.disp);
            buf.push_u32(arm64::add_reg(dst, base, SCRATCH));
        }
    } else if classify::is_push(insn) {
        buf.push_u32(arm64::str_pre_index(dst, SP, -8));
    } else if classify::is_pop(insn) {
        buf.push_u32(arm64::ldr_post_index(dst, SP, 8));
    }

    LowerOutcome::continues()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbt_decode::decode;

    #[test]
    fn mov_reg_reg_emits_orr_with_zero_register() {
        let insn = decode(&[0x48, 0x89, 0xC8]); // MOV RAX, RCX
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.bytes(), &arm64::orr_reg(0, 31, 1).to_le_bytes());
    }

    #[test]
    fn mov_imm64_materialises_full_width() {
        let insn = decode(&[0x48, 0xB8, 0xEF, 0xBE, 0xAD, 0xDE, 0x00, 0x00, 0x00, 0x00]);
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert!(buf.len() >= 4);
    }

    #[test]
    fn push_uses_pre_indexed_store() {
        let insn = decode(&[0x50]); // PUSH RAX
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert_eq!(buf.bytes(), &arm64::str_pre_index(0, SP, -8).to_le_bytes());
    }

    #[test]
    fn movzx_byte_source_extracts_an_8_bit_field() {
        let insn = decode(&[0x0F, 0xB6, 0xC1]); // MOVZX EAX, CL
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.bytes(), &arm64::ubfx(0, 1, 0, 8).to_le_bytes());
    }

    #[test]
    fn movzx_word_source_extracts_a_16_bit_field() {
        let insn = decode(&[0x0F, 0xB7, 0xC1]); // MOVZX EAX, CX
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.bytes(), &arm64::ubfx(0, 1, 0, 16).to_le_bytes());
    }

    #[test]
    fn movsx_byte_source_sign_extends_an_8_bit_field() {
        let insn = decode(&[0x0F, 0xBE, 0xC1]); // MOVSX EAX, CL
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.bytes(), &arm64::sbfx(0, 1, 0, 8).to_le_bytes());
    }

    #[test]
    fn movsxd_sign_extends_a_32_bit_field() {
        let insn = decode(&[0x48, 0x63, 0xC1]); // MOVSXD RAX, ECX
        let mut buf = CodeBuffer::with_capacity(8);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.bytes(), &arm64::sbfx(0, 1, 0, 32).to_le_bytes());
    }
}
