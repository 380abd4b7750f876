//! x86_64 helper-path encoders (spec.md §4.2, the reverse ARM64-guest →
//! x86_64-host direction). Complete and independent of the [`super::arm64`]
//! templates — see this crate's root doc comment and `DESIGN.md`'s Open
//! Question #3 for why only the emitter layer carries this direction.
//!
//! Grounded on the BPF-JIT `Emitter`'s REX/ModR/M byte helpers and
//! Neurlang's offset-returning branch encoders (`DESIGN.md`).

use super::buffer::CodeBuffer;
use super::patch::PatchSite;

/// Raw x86_64 register encodings 0-15 (`RAX`..`R15`), used only as plain
/// `u8` indices here — this module is deliberately independent of
/// `xbt_types::Gpr` so it can be reused by a future ARM64-guest decoder
/// without a dependency back onto the x86_64-guest side.
pub type Reg = u8;

fn rex(w: bool, r: Reg, x: bool, b: Reg) -> u8 {
    0x40 | ((w as u8) << 3) | (((r >> 3) & 1) << 2) | ((x as u8) << 1) | ((b >> 3) & 1)
}

fn modrm(mode: u8, reg: Reg, rm: Reg) -> u8 {
    ((mode & 0b11) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
}

/// `MOV r64, r64` (dst <- src).
pub fn mov_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.push_u8(rex(true, src, false, dst));
    buf.push_u8(0x89);
    buf.push_u8(modrm(0b11, src, dst));
}

/// `MOV r64, imm64` (the only x86_64 form that takes a full 64-bit
/// immediate).
pub fn mov_reg_imm64(buf: &mut CodeBuffer, dst: Reg, imm: u64) {
    buf.push_u8(rex(true, 0, false, dst));
    buf.push_u8(0xB8 + (dst & 0x7));
    buf.push_u64(imm);
}

/// One of the group-1 ALU opcodes, keyed by its ModR/M `/reg` sub-opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    fn group1_reg(self) -> u8 {
        match self {
            AluOp::Add => 0,
            AluOp::Or => 1,
            AluOp::Adc => 2,
            AluOp::Sbb => 3,
            AluOp::And => 4,
            AluOp::Sub => 5,
            AluOp::Xor => 6,
            AluOp::Cmp => 7,
        }
    }
}

/// `<op> r64, r64` (dst <- dst OP src).
pub fn alu_reg_reg(buf: &mut CodeBuffer, op: AluOp, dst: Reg, src: Reg) {
    let opcode = match op {
        AluOp::Add => 0x01,
        AluOp::Or => 0x09,
        AluOp::Adc => 0x11,
        AluOp::Sbb => 0x19,
        AluOp::And => 0x21,
        AluOp::Sub => 0x29,
        AluOp::Xor => 0x31,
        AluOp::Cmp => 0x39,
    };
    buf.push_u8(rex(true, src, false, dst));
    buf.push_u8(opcode);
    buf.push_u8(modrm(0b11, src, dst));
}

/// `<op> r64, imm32` (sign-extended to 64 bits), group-1 opcode `0x81`.
pub fn alu_reg_imm32(buf: &mut CodeBuffer, op: AluOp, dst: Reg, imm: i32) {
    buf.push_u8(rex(true, 0, false, dst));
    buf.push_u8(0x81);
    buf.push_u8(modrm(0b11, op.group1_reg(), dst));
    buf.push_u32(imm as u32);
}

/// `CMP r64, r64`.
pub fn cmp_reg_reg(buf: &mut CodeBuffer, lhs: Reg, rhs: Reg) {
    alu_reg_reg(buf, AluOp::Cmp, lhs, rhs);
}

/// `TEST r64, r64`.
pub fn test_reg_reg(buf: &mut CodeBuffer, lhs: Reg, rhs: Reg) {
    buf.push_u8(rex(true, rhs, false, lhs));
    buf.push_u8(0x85);
    buf.push_u8(modrm(0b11, rhs, lhs));
}

/// `LEA r64, [base + disp32]`.
pub fn lea_base_disp32(buf: &mut CodeBuffer, dst: Reg, base: Reg, disp: i32) {
    buf.push_u8(rex(true, dst, false, base));
    buf.push_u8(0x8D);
    buf.push_u8(modrm(0b10, dst, base));
    if base & 0x7 == 0b100 {
        // RSP/R12 need a SIB byte with no index.
        buf.push_u8(0x24);
    }
    buf.push_u32(disp as u32);
}

/// `PUSH r64`.
pub fn push_reg(buf: &mut CodeBuffer, reg: Reg) {
    if reg >= 8 {
        buf.push_u8(rex(false, 0, false, reg));
    }
    buf.push_u8(0x50 + (reg & 0x7));
}

/// `POP r64`.
pub fn pop_reg(buf: &mut CodeBuffer, reg: Reg) {
    if reg >= 8 {
        buf.push_u8(rex(false, 0, false, reg));
    }
    buf.push_u8(0x58 + (reg & 0x7));
}

/// One of the 16 x86 condition codes used by `Jcc`/`SETcc`/`CMOVcc`
/// (`0x0..=0xF`, matching the low nibble of the corresponding opcode
/// family).
pub type X86Cond = u8;

/// `Jcc rel32` (near form, `0x0F 0x80+cc`), emitted with a zero
/// placeholder. Returns the [`PatchSite`] of the 4-byte displacement for a
/// later [`super::patch::apply`] call.
pub fn jcc_rel32(buf: &mut CodeBuffer, cond: X86Cond) -> PatchSite {
    buf.push_u8(0x0F);
    buf.push_u8(0x80 + (cond & 0xF));
    let site = PatchSite { offset: buf.len() };
    buf.push_u32(0);
    site
}

/// `JMP rel32`, zero placeholder.
pub fn jmp_rel32(buf: &mut CodeBuffer) -> PatchSite {
    buf.push_u8(0xE9);
    let site = PatchSite { offset: buf.len() };
    buf.push_u32(0);
    site
}

/// `CALL rel32`, zero placeholder.
pub fn call_rel32(buf: &mut CodeBuffer) -> PatchSite {
    buf.push_u8(0xE8);
    let site = PatchSite { offset: buf.len() };
    buf.push_u32(0);
    site
}

/// `RET` (near return, no stack adjustment).
pub fn ret(buf: &mut CodeBuffer) {
    buf.push_u8(0xC3);
}

/// `NOP` (single-byte form).
pub fn nop(buf: &mut CodeBuffer) {
    buf.push_u8(0x90);
}

/// `UD2` — the trap sequence used to surface illegal-guest-instruction
/// faults to the executor (spec.md §4.10).
pub fn ud2(buf: &mut CodeBuffer) {
    buf.push_u8(0x0F);
    buf.push_u8(0x0B);
}

/// `MOVQ xmm, xmm` (`0x66 0x0F 0x6E`-family move between SSE2 registers,
/// using the `MOVDQA` opcode since these helpers move full 128-bit guest
/// vector slots rather than scalar doubles).
pub fn movdqa_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.push_u8(0x66);
    if dst >= 8 || src >= 8 {
        buf.push_u8(rex(false, dst, false, src));
    }
    buf.push_u8(0x0F);
    buf.push_u8(0x6F);
    buf.push_u8(modrm(0b11, dst, src));
}

/// `ADDSS xmm, xmm` (scalar single-precision FP add).
pub fn addss_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.push_u8(0xF3);
    if dst >= 8 || src >= 8 {
        buf.push_u8(rex(false, dst, false, src));
    }
    buf.push_u8(0x0F);
    buf.push_u8(0x58);
    buf.push_u8(modrm(0b11, dst, src));
}

/// `ADDSD xmm, xmm` (scalar double-precision FP add).
pub fn addsd_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.push_u8(0xF2);
    if dst >= 8 || src >= 8 {
        buf.push_u8(rex(false, dst, false, src));
    }
    buf.push_u8(0x0F);
    buf.push_u8(0x58);
    buf.push_u8(modrm(0b11, dst, src));
}

/// `PADDQ xmm, xmm` (128-bit packed quadword add, the SSE2 analogue of
/// ARM64's `ADD Vd.2D, Vn.2D, Vm.2D`).
pub fn paddq_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.push_u8(0x66);
    if dst >= 8 || src >= 8 {
        buf.push_u8(rex(false, dst, false, src));
    }
    buf.push_u8(0x0F);
    buf.push_u8(0xD4);
    buf.push_u8(modrm(0b11, dst, src));
}

/// `PSLLQ xmm, imm8` (128-bit packed quadword shift-left).
pub fn psllq_reg_imm8(buf: &mut CodeBuffer, dst: Reg, shift: u8) {
    buf.push_u8(0x66);
    if dst >= 8 {
        buf.push_u8(rex(false, 0, false, dst));
    }
    buf.push_u8(0x0F);
    buf.push_u8(0x73);
    buf.push_u8(modrm(0b11, 6, dst)); // /6 selects PSLLQ in the 0x73 group.
    buf.push_u8(shift);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_reg_reg_has_rex_w() {
        let mut buf = CodeBuffer::with_capacity(8);
        mov_reg_reg(&mut buf, 0, 1);
        assert_eq!(buf.bytes(), &[0x48, 0x89, 0xC8]);
    }

    #[test]
    fn mov_reg_imm64_emits_ten_bytes() {
        let mut buf = CodeBuffer::with_capacity(16);
        mov_reg_imm64(&mut buf, 0, 0xDEAD_BEEF);
        assert_eq!(buf.len(), 10);
        assert_eq!(&buf.bytes()[..2], &[0x48, 0xB8]);
    }

    #[test]
    fn jcc_rel32_returns_patch_site_after_opcode() {
        let mut buf = CodeBuffer::with_capacity(16);
        let site = jcc_rel32(&mut buf, 0x4); // JE
        assert_eq!(site.offset, 2);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn extended_registers_get_rex_prefix_in_push() {
        let mut buf = CodeBuffer::with_capacity(4);
        push_reg(&mut buf, 8); // R8
        assert_eq!(buf.bytes(), &[0x41, 0x50]);
    }
}
