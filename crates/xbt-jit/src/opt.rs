//! The block optimiser / linker (C9, spec.md §4.9).
//!
//! Both passes operate on the literal byte patterns spec.md §4.9 and §8
//! (testable properties 7-8) pin down verbatim — `0x48 0x89` + ModR/M for
//! `MOV r, r`, `0xC3` for the exit trampoline's `RET`, `0xE9` + `rel32` for
//! the patched `JMP`. This core's per-category lowering (`xbt-codegen::lower`)
//! emits an ARM64 body, but every block's *exit* is written through the
//! x86_64 helper encoder (`xbt_codegen::emit::x86_64`) specifically so this
//! module's byte-level contract holds exactly as specified — see
//! `DESIGN.md`'s design note on this split.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link target is not reachable from a 32-bit relative jump")]
    OutOfReach,
    #[error("no RET (0xC3) trampoline found in the last 16 bytes of the source region")]
    NoTrampoline,
    #[error("arena protection toggle failed: {0}")]
    Arena(String),
}

impl From<crate::arena::ArenaError> for LinkError {
    fn from(e: crate::arena::ArenaError) -> LinkError {
        LinkError::Arena(e.to_string())
    }
}

/// Single forward peephole pass over `code`, rewriting two patterns
/// (spec.md §4.9):
///
/// 1. `MOV r, r` with identical source/destination (`0x48 0x89` followed by
///    a ModR/M byte `0xC0 + src*8 + dst` where `src == dst`) becomes three
///    `NOP` (`0x90`) bytes.
/// 2. An all-zeroing `XOR r, r` immediately followed by `MOV r, imm` to the
///    same destination has the `XOR` blanked to `NOP`s.
///
/// Both rewrites preserve length (spec.md §8 testable property 7).
pub fn peephole(code: &mut [u8]) {
    let mut i = 0;
    while i + 3 <= code.len() {
        if code[i] == 0x48 && code[i + 1] == 0x89 {
            let modrm = code[i + 2];
            let mode = modrm >> 6;
            let reg = (modrm >> 3) & 0x7;
            let rm = modrm & 0x7;
            if mode == 0b11 && reg == rm {
                code[i] = 0x90;
                code[i + 1] = 0x90;
                code[i + 2] = 0x90;
                i += 3;
                continue;
            }
        }
        if is_xor_reg_reg_same(code, i) {
            let dst = code[i + 2] & 0x7;
            let mov_start = i + 3;
            if is_mov_reg_imm_same_dst(code, mov_start, dst) {
                code[i] = 0x90;
                code[i + 1] = 0x90;
                code[i + 2] = 0x90;
                i = mov_start;
                continue;
            }
        }
        i += 1;
    }
}

fn is_xor_reg_reg_same(code: &[u8], i: usize) -> bool {
    if i + 3 > code.len() {
        return false;
    }
    if code[i] != 0x48 || code[i + 1] != 0x31 {
        return false;
    }
    let modrm = code[i + 2];
    (modrm >> 6) == 0b11 && ((modrm >> 3) & 0x7) == (modrm & 0x7)
}

fn is_mov_reg_imm_same_dst(code: &[u8], i: usize, dst: u8) -> bool {
    if i + 2 > code.len() {
        return false;
    }
    if code[i] != 0x48 {
        return false;
    }
    let opcode = code[i + 1];
    (0xB8..=0xBF).contains(&opcode) && (opcode - 0xB8) == dst
}

/// The window (in bytes, counted back from the end of the region) the
/// linker searches for the exit trampoline, per spec.md §4.9.
const TRAMPOLINE_WINDOW: usize = 16;

/// Locate the last host `RET` in the last [`TRAMPOLINE_WINDOW`] bytes of
/// `source`, and replace it with `JMP rel32` to `to_addr`. `from_base` is
/// the host address of `source[0]`. Fails (and leaves `source` untouched)
/// if the target is unreachable from a 32-bit relative jump, or if no
/// `RET` is found in the window.
pub fn link(source: &mut [u8], from_base: i64, to_addr: i64) -> Result<(), LinkError> {
    let window_start = source.len().saturating_sub(TRAMPOLINE_WINDOW);
    let ret_offset = source[window_start..]
        .iter()
        .rposition(|&b| b == 0xC3)
        .map(|pos| window_start + pos)
        .ok_or(LinkError::NoTrampoline)?;

    let jump_instruction_end = from_base + (ret_offset as i64) + 5;
    let displacement = to_addr - jump_instruction_end;
    if displacement < i32::MIN as i64 || displacement > i32::MAX as i64 {
        return Err(LinkError::OutOfReach);
    }

    source[ret_offset] = 0xE9;
    let bytes = (displacement as i32).to_le_bytes();
    source[ret_offset + 1..ret_offset + 5].copy_from_slice(&bytes);
    for b in &mut source[ret_offset + 5..] {
        *b = 0x90;
    }
    Ok(())
}

/// Whether `link` would succeed for this `(from_end, to_addr)` pair,
/// without mutating anything — spec.md §8 testable property 8's
/// reachability precondition, exposed standalone for tests and for the
/// engine to decide whether to attempt a link at all.
pub fn reachable(from_end: i64, to_addr: i64) -> bool {
    let displacement = to_addr - from_end;
    displacement >= i32::MIN as i64 && displacement <= i32::MAX as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peephole_folds_self_mov_to_nops() {
        let mut code = [0x48, 0x89, 0xC0]; // MOV RAX, RAX
        peephole(&mut code);
        assert_eq!(code, [0x90, 0x90, 0x90]);
    }

    #[test]
    fn peephole_leaves_distinct_reg_mov_alone() {
        let mut code = [0x48, 0x89, 0xC8]; // MOV RAX, RCX
        peephole(&mut code);
        assert_eq!(code, [0x48, 0x89, 0xC8]);
    }

    #[test]
    fn peephole_blanks_xor_before_mov_same_dst() {
        // XOR RAX, RAX ; MOV RAX, imm64
        let mut code = [0x48, 0x31, 0xC0, 0x48, 0xB8];
        peephole(&mut code);
        assert_eq!(&code[..3], &[0x90, 0x90, 0x90]);
        assert_eq!(&code[3..], &[0x48, 0xB8]);
    }

    #[test]
    fn link_patches_ret_into_jmp_rel32() {
        let mut region = [0x90, 0x90, 0xC3, 0x90, 0x90, 0x90, 0x90, 0x90];
        let from_base = 0x1000i64;
        let to_addr = 0x2000i64;
        link(&mut region, from_base, to_addr).unwrap();
        assert_eq!(region[2], 0xE9);
        let disp = i32::from_le_bytes([region[3], region[4], region[5], region[6]]);
        let jump_end = from_base + 2 + 5;
        assert_eq!(disp as i64, to_addr - jump_end);
    }

    #[test]
    fn link_fails_when_no_ret_present() {
        let mut region = [0x90; 8];
        assert_eq!(link(&mut region, 0, 0x1000), Err(LinkError::NoTrampoline));
    }

    #[test]
    fn reachable_matches_signed_32_bit_range() {
        assert!(reachable(0, i32::MAX as i64));
        assert!(!reachable(0, i32::MAX as i64 + 1));
    }
}
