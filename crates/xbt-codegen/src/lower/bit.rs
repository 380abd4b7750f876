//! Bit-family lowering (spec.md §4.4 "Bit"): `BSF`, `BSR`, `POPCNT`, the
//! `BT`/`BTS`/`BTR`/`BTC` family, and `SHLD`/`SHRD`.

use xbt_decode::classify;
use xbt_types::DecodedInsn;

use crate::emit::arm64;
use crate::emit::CodeBuffer;
use crate::lower::{LowerOutcome, MappedRegs};

const SCRATCH: u8 = 17;
/// `V16`/`X16` — a caller-scratch register: the SIMD view for the
/// `POPCNT` stencil, the GPR view as the bit-mask scratch for `BTS`/
/// `BTR`/`BTC` (the two never run in the same instruction).
const VSCRATCH: u8 = 16;

pub fn lower(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> LowerOutcome {
    let dst = regs.dst;
    let src = regs.src.unwrap_or(dst);

    if classify::is_bsf(insn) {
        // Count trailing zeros: `CLZ(RBIT(x))`.
        buf.push_u32(arm64::rbit(SCRATCH, src));
        buf.push_u32(arm64::clz(dst, SCRATCH));
    } else if classify::is_bsr(insn) {
        // `BSR` wants the index of the highest set bit; `CLZ` gives the
        // count from the top, so the exact index is `63 - CLZ(x)`.
        buf.push_u32(arm64::clz(dst, src));
        buf.push_u32(arm64::movz(SCRATCH, 63, 0));
        buf.push_u32(arm64::sub_reg(dst, SCRATCH, dst));
    } else if classify::is_popcnt(insn) {
        buf.push_u32(arm64::fmov_gpr_to_vector(VSCRATCH, src));
        buf.push_u32(arm64::cnt_8b(VSCRATCH, VSCRATCH));
        buf.push_u32(arm64::uaddlv_8b(VSCRATCH, VSCRATCH));
        buf.push_u32(arm64::fmov_vector_to_gpr(dst, VSCRATCH));
    } else if classify::is_bt_family(insn) {
        lower_bt_family(buf, insn, dst, regs);
    } else if classify::is_shld(insn) {
        let lsb = (64 - (insn.imm as u8 & 0x3F)) & 0x3F;
        buf.push_u32(arm64::extr(dst, dst, src, lsb));
    } else if classify::is_shrd(insn) {
        let lsb = insn.imm as u8 & 0x3F;
        buf.push_u32(arm64::extr(dst, src, dst, lsb));
    }

    LowerOutcome::continues()
}

fn lower_bt_family(buf: &mut CodeBuffer, insn: &DecodedInsn, dst: u8, regs: MappedRegs) {
    let bit = if insn.imm_size > 0 {
        insn.imm as u8 & 0x3F
    } else {
        0
    };
    // Extracts the tested bit into the scratch register; the caller reads
    // it back as the carry-flag surrogate. `BT` (reg field `4`) only tests;
    // `BTS`/`BTR`/`BTC` (reg fields `5`/`6`/`7`) additionally write back a
    // modified bit, via a materialised `1 << bit` mask register.
    buf.push_u32(arm64::ubfx(SCRATCH, dst, bit, 1));
    if let Some(sub) = insn.modrm.map(|m| m.reg & 0x7) {
        let mask = 1u64 << bit;
        match sub {
            5 => {
                // BTS: dst |= 1 << bit
                for word in arm64::movz_movk_sequence(VSCRATCH, mask) {
                    buf.push_u32(word);
                }
                buf.push_u32(arm64::orr_reg(dst, dst, VSCRATCH));
            }
            6 => {
                // BTR: dst &= !(1 << bit)
                for word in arm64::movz_movk_sequence(VSCRATCH, !mask) {
                    buf.push_u32(word);
                }
                buf.push_u32(arm64::and_reg(dst, dst, VSCRATCH));
            }
            7 => {
                // BTC: dst ^= 1 << bit
                for word in arm64::movz_movk_sequence(VSCRATCH, mask) {
                    buf.push_u32(word);
                }
                buf.push_u32(arm64::eor_reg(dst, dst, VSCRATCH));
            }
            _ => {}
        }
    }
    let _ = regs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbt_decode::decode;

    #[test]
    fn bsf_emits_rbit_then_clz() {
        let insn = decode(&[0x0F, 0xBC, 0xC1]); // BSF EAX, ECX
        let mut buf = CodeBuffer::with_capacity(16);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn popcnt_emits_four_word_stencil() {
        let insn = decode(&[0xF3, 0x0F, 0xB8, 0xC1]); // POPCNT EAX, ECX
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn bsr_loads_63_before_subtracting_clz() {
        let insn = decode(&[0x0F, 0xBD, 0xC1]); // BSR EAX, ECX
        let mut buf = CodeBuffer::with_capacity(16);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert_eq!(buf.len(), 12);
        assert_eq!(
            &buf.bytes()[4..8],
            &arm64::movz(SCRATCH, 63, 0).to_le_bytes()
        );
    }

    #[test]
    fn bts_ors_in_a_materialised_single_bit_mask() {
        let insn = decode(&[0x0F, 0xBA, 0xE8, 0x03]); // BTS EAX, 3
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        let last = buf.bytes().len();
        assert_eq!(&buf.bytes()[last - 4..], &arm64::orr_reg(0, 0, VSCRATCH).to_le_bytes());
    }

    #[test]
    fn btr_ands_in_an_inverted_single_bit_mask() {
        let insn = decode(&[0x0F, 0xBA, 0xF0, 0x03]); // BTR EAX, 3
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        let last = buf.bytes().len();
        assert_eq!(&buf.bytes()[last - 4..], &arm64::and_reg(0, 0, VSCRATCH).to_le_bytes());
    }

    #[test]
    fn btc_eors_in_a_materialised_single_bit_mask() {
        let insn = decode(&[0x0F, 0xBA, 0xF8, 0x03]); // BTC EAX, 3
        let mut buf = CodeBuffer::with_capacity(32);
        lower(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        let last = buf.bytes().len();
        assert_eq!(&buf.bytes()[last - 4..], &arm64::eor_reg(0, 0, VSCRATCH).to_le_bytes());
    }
}
