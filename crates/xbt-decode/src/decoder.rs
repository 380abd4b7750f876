use xbt_types::{DecodedInsn, ModRm, Rex, SegmentOverride, StringRep};

use crate::opcode;

/// Decode one x86_64 instruction starting at `bytes[0]`.
///
/// `bytes` is the unverified guest byte window already clipped to whatever
/// upper bound the caller is willing to read from (spec.md §4.1: "a pointer
/// to unverified bytes and an upper length"). A returned instruction with
/// `length == 0` means the prefix/opcode sequence was not recognised; the
/// block translator must terminate the block on that signal rather than
/// advance the guest PC.
pub fn decode(bytes: &[u8]) -> DecodedInsn {
    // x86_64 instructions are architecturally capped at 15 bytes; clipping
    // here keeps the cursor arithmetic below infallible on `as u8`.
    let window = &bytes[..bytes.len().min(15)];
    try_decode(window).unwrap_or_else(DecodedInsn::undecodable)
}

fn try_decode(bytes: &[u8]) -> Option<DecodedInsn> {
    let mut pos = 0usize;

    let mut segment = None;
    let mut opsize_override = false;
    let mut addrsize_override = false;
    let mut lock = false;
    let mut rep_raw: Option<u8> = None;

    loop {
        let b = *bytes.get(pos)?;
        match b {
            0x2E | 0x36 | 0x3E | 0x26 | 0x64 | 0x65 => segment = Some(SegmentOverride(b)),
            0x66 => opsize_override = true,
            0x67 => addrsize_override = true,
            0xF0 => lock = true,
            0xF2 | 0xF3 => rep_raw = Some(b),
            _ => break,
        }
        pos += 1;
    }

    let mut rex = Rex::default();
    if let Some(&b) = bytes.get(pos) {
        if (0x40..=0x4F).contains(&b) {
            rex = Rex {
                w: b & 0x08 != 0,
                r: b & 0x04 != 0,
                x: b & 0x02 != 0,
                b: b & 0x01 != 0,
            };
            pos += 1;
        }
    }

    let primary = *bytes.get(pos)?;
    pos += 1;
    let secondary = if primary == 0x0F {
        let sec = *bytes.get(pos)?;
        pos += 1;
        Some(sec)
    } else {
        None
    };

    let mut modrm = None;
    let mut disp: i64 = 0;
    let mut disp_size: u8 = 0;
    let mut group_reg = None;

    if opcode::needs_modrm(primary, secondary) {
        let b = *bytes.get(pos)?;
        pos += 1;
        let mode = (b >> 6) & 0x3;
        let reg_raw = (b >> 3) & 0x7;
        let rm_raw = b & 0x7;
        group_reg = Some(reg_raw);

        let reg = reg_raw | if rex.r { 0x8 } else { 0 };
        let mut rm = rm_raw | if rex.b { 0x8 } else { 0 };
        let mut rm_is_sib = false;
        let mut rip_relative = false;

        if mode != 3 && rm_raw == 4 {
            // A SIB byte follows. Its index/scale fields address memory the
            // translator dereferences directly (spec.md §4.4: identity
            // address space), so only `base` and the disp32-no-base special
            // case need to be recovered here.
            let sib = *bytes.get(pos)?;
            pos += 1;
            rm_is_sib = true;
            let base_raw = sib & 0x7;
            rm = base_raw | if rex.b { 0x8 } else { 0 };
            if base_raw == 5 && mode == 0 {
                disp_size = 4;
            }
        } else if mode == 0 && rm_raw == 5 {
            rip_relative = true;
            disp_size = 4;
        }

        if disp_size == 0 {
            disp_size = match mode {
                1 => 1,
                2 => 4,
                _ => 0,
            };
        }

        if disp_size > 0 {
            disp = read_signed(bytes, &mut pos, disp_size)?;
        }

        modrm = Some(ModRm {
            mode,
            reg,
            rm,
            rm_is_sib,
            rip_relative,
        });
    }

    let imm_size = opcode::immediate_size(primary, secondary, group_reg, rex.w, opsize_override);
    let imm = if imm_size > 0 {
        read_signed(bytes, &mut pos, imm_size)?
    } else {
        0
    };

    let rep = classify_rep(rep_raw, primary);

    Some(DecodedInsn {
        primary_opcode: primary,
        secondary_opcode: secondary,
        rex,
        modrm,
        disp,
        disp_size,
        imm,
        imm_size,
        length: pos as u8,
        operand64: rex.w,
        opsize_override,
        addrsize_override,
        lock,
        rep,
        segment,
    })
}

/// `0xF3` means `REPE` on `CMPS`/`SCAS` but plain `REP` on `MOVS`/`STOS`/
/// `LODS`; `0xF2` (`REPNE`) is only meaningful on `CMPS`/`SCAS`.
fn classify_rep(rep_raw: Option<u8>, primary: u8) -> StringRep {
    let is_compare_family = matches!(primary, 0xA6 | 0xA7 | 0xAE | 0xAF);
    match rep_raw {
        None => StringRep::None,
        Some(0xF3) if is_compare_family => StringRep::RepE,
        Some(0xF2) if is_compare_family => StringRep::RepNe,
        // `REPNE` has no defined meaning outside the compare family.
        Some(0xF2) => StringRep::None,
        Some(_) => StringRep::Rep,
    }
}

fn read_signed(bytes: &[u8], pos: &mut usize, size: u8) -> Option<i64> {
    let start = *pos;
    let end = start + size as usize;
    let slice = bytes.get(start..end)?;
    let value = match size {
        1 => slice[0] as i8 as i64,
        2 => i16::from_le_bytes(slice.try_into().ok()?) as i64,
        4 => i32::from_le_bytes(slice.try_into().ok()?) as i64,
        8 => i64::from_le_bytes(slice.try_into().ok()?),
        _ => return None,
    };
    *pos = end;
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_reg_reg_with_rex_w() {
        // `48 89 C8` = MOV RAX, RCX (REX.W, 0x89 /r, mod=3 reg=1 rm=0).
        let insn = decode(&[0x48, 0x89, 0xC8]);
        assert_eq!(insn.primary_opcode, 0x89);
        assert!(insn.rex.w);
        let modrm = insn.modrm.expect("modrm");
        assert_eq!(modrm.mode, 3);
        assert_eq!(modrm.reg, 1);
        assert_eq!(modrm.rm, 0);
        assert_eq!(insn.length, 3);
    }

    #[test]
    fn mov_eax_imm32_no_rex() {
        // `B8 2A 00 00 00` = MOV EAX, 42
        let insn = decode(&[0xB8, 0x2A, 0x00, 0x00, 0x00]);
        assert_eq!(insn.primary_opcode, 0xB8);
        assert_eq!(insn.imm, 42);
        assert_eq!(insn.imm_size, 4);
        assert_eq!(insn.length, 5);
    }

    #[test]
    fn mov_rax_imm64() {
        // `48 B8 EF BE AD DE 00 00 00 00` = MOV RAX, 0xDEADBEEF
        let insn = decode(&[0x48, 0xB8, 0xEF, 0xBE, 0xAD, 0xDE, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(insn.primary_opcode, 0xB8);
        assert!(insn.rex.w);
        assert_eq!(insn.imm, 0xDEADBEEFu32 as i64);
        assert_eq!(insn.imm_size, 8);
        assert_eq!(insn.length, 10);
    }

    #[test]
    fn group1_imm8_sign_extends() {
        // `83 C0 FF` = ADD EAX, -1 (0x83 /0, imm8 = 0xFF = -1)
        let insn = decode(&[0x83, 0xC0, 0xFF]);
        assert_eq!(insn.imm, -1);
        assert_eq!(insn.imm_size, 1);
        assert_eq!(insn.length, 3);
    }

    #[test]
    fn disp32_rip_relative_mov() {
        // `8B 05 10 00 00 00` = MOV EAX, [RIP + 0x10]
        let insn = decode(&[0x8B, 0x05, 0x10, 0x00, 0x00, 0x00]);
        let modrm = insn.modrm.expect("modrm");
        assert!(modrm.rip_relative);
        assert_eq!(insn.disp, 0x10);
        assert_eq!(insn.length, 6);
    }

    #[test]
    fn sib_disp32_no_base() {
        // `8B 04 25 00 10 00 00` = MOV EAX, [0x1000] (SIB, base=5/mode=0 => disp32 only)
        let insn = decode(&[0x8B, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]);
        let modrm = insn.modrm.expect("modrm");
        assert!(modrm.rm_is_sib);
        assert_eq!(insn.disp, 0x1000);
        assert_eq!(insn.length, 7);
    }

    #[test]
    fn two_byte_escape_jcc_rel32() {
        // `0F 84 00 01 00 00` = JE rel32
        let insn = decode(&[0x0F, 0x84, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(insn.secondary_opcode, Some(0x84));
        assert_eq!(insn.modrm, None);
        assert_eq!(insn.imm, 0x100); // Jcc rel32 is carried as an immediate, not a ModR/M disp
        assert_eq!(insn.length, 6);
    }

    #[test]
    fn truncated_stream_is_undecodable() {
        // `48 89` — REX.W + 0x89 but no ModR/M byte follows.
        let insn = decode(&[0x48, 0x89]);
        assert!(insn.is_undecodable());
    }

    #[test]
    fn empty_stream_is_undecodable() {
        assert!(decode(&[]).is_undecodable());
    }

    #[test]
    fn ret_has_no_modrm() {
        let insn = decode(&[0xC3]);
        assert_eq!(insn.primary_opcode, 0xC3);
        assert_eq!(insn.length, 1);
    }

    #[test]
    fn movs_byte_uses_rep_not_repe() {
        // `F3 A4` = REP MOVSB
        let insn = decode(&[0xF3, 0xA4]);
        assert_eq!(insn.rep, StringRep::Rep);
        assert_eq!(insn.length, 2);
    }

    #[test]
    fn scas_f3_is_repe() {
        // `F3 AE` = REPE SCASB
        let insn = decode(&[0xF3, 0xAE]);
        assert_eq!(insn.rep, StringRep::RepE);
    }

    #[test]
    fn scas_f2_is_repne() {
        // `F2 AE` = REPNE SCASB
        let insn = decode(&[0xF2, 0xAE]);
        assert_eq!(insn.rep, StringRep::RepNe);
    }
}
