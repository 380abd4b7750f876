//! Opcode-family tables used only at decode time, to answer "does this
//! opcode carry a ModR/M byte" and "how big is its immediate". Classifying
//! an already-decoded instruction into a translator category is a separate,
//! independent concern — see `classify.rs`.

/// `mod`/`reg`/`rm`-bearing opcode groups (`0x80`, `0x81`, `0x83`, `0xC0`,
/// `0xC1`, `0xD0`-`0xD3`, `0xF6`, `0xF7`, `0xFE`, `0xFF`) use the ModR/M
/// `reg` field as a sub-opcode selector rather than a register operand.
/// `immediate_size` needs to know which group member it is for `0xF6`/
/// `0xF7` (`TEST` takes an immediate, the rest of the group doesn't).
pub fn group3_has_immediate(reg: u8) -> bool {
    matches!(reg, 0 | 1) // TEST r/m, imm
}

/// Whether the primary (and, for two-byte escapes, secondary) opcode byte
/// is followed by a ModR/M byte, per the standard x86_64 opcode map.
pub fn needs_modrm(primary: u8, secondary: Option<u8>) -> bool {
    if let Some(sec) = secondary {
        return match sec {
            0x1F => true, // multi-byte NOP
            0x40..=0x4F => true, // CMOVcc
            0x80..=0x8F => false, // Jcc rel32 (no ModR/M)
            0x90..=0x9F => true, // SETcc
            0xA3 | 0xAB | 0xB3 | 0xBB => true, // BT/BTS/BTR/BTC, register form
            0xA4 | 0xA5 | 0xAC | 0xAD => true, // SHLD/SHRD
            0xAF => true, // IMUL r, r/m
            0xB6 | 0xB7 | 0xBE | 0xBF => true, // MOVZX/MOVSX
            0xBA => true, // group8: BT/BTS/BTR/BTC r/m, imm8
            0xBC | 0xBD => true, // BSF/BSR
            0xB8 => true, // POPCNT
            0xA2 => false, // CPUID
            0x31 => false, // RDTSC
            _ => false,
        };
    }
    match primary {
        0x00..=0x03
        | 0x08..=0x0B
        | 0x10..=0x13
        | 0x18..=0x1B
        | 0x20..=0x23
        | 0x28..=0x2B
        | 0x30..=0x33
        | 0x38..=0x3B => true, // ALU r/m,r and r,r/m forms
        0x63 => true, // MOVSXD
        0x69 | 0x6B => true, // IMUL r, r/m, imm
        0x80 | 0x81 | 0x83 => true, // group1 ALU r/m, imm
        0x84 | 0x85 => true, // TEST r/m, r
        0x88..=0x8B => true, // MOV r/m,r and r,r/m
        0x8D => true, // LEA
        0x8F => true, // POP r/m (group1a)
        0xC0 | 0xC1 => true, // shift/rotate r/m, imm8
        0xC6 | 0xC7 => true, // MOV r/m, imm
        0xD0..=0xD3 => true, // shift/rotate r/m, 1 or CL
        0xF6 | 0xF7 => true, // group3 TEST/NOT/NEG/MUL/IMUL/DIV/IDIV
        0xFE | 0xFF => true, // group4/group5 INC/DEC/CALL/JMP/PUSH
        _ => false,
    }
}

/// Immediate size in bytes (0 = no immediate), selected per spec.md §4.1
/// (`0x81` -> 32-bit, `0x83` -> 8-bit sign-extended, `0xB8..0xBF` with
/// `REX.W` -> 64-bit, and so on for the remaining families).
pub fn immediate_size(
    primary: u8,
    secondary: Option<u8>,
    modrm_reg: Option<u8>,
    rex_w: bool,
    opsize_override: bool,
) -> u8 {
    if let Some(sec) = secondary {
        return match sec {
            0x80..=0x8F => 4, // Jcc rel32
            0xA4 | 0xAC => 1, // SHLD/SHRD r/m, reg, imm8
            0xBA => 1,        // group8 BT/BTS/BTR/BTC r/m, imm8
            _ => 0,
        };
    }
    match primary {
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C | 0xA8 => 1, // AL, imm8 forms
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D | 0xA9 => {
            if opsize_override {
                2
            } else {
                4
            }
        }
        0x6A | 0x6B | 0x80 | 0x83 => 1,
        0x69 | 0x81 => {
            if opsize_override {
                2
            } else {
                4
            }
        }
        0x68 => 4,
        0xB0..=0xB7 => 1,
        0xB8..=0xBF => {
            if rex_w {
                8
            } else if opsize_override {
                2
            } else {
                4
            }
        }
        0xC0 | 0xC1 => 1,
        0xC2 => 2,
        0xC6 => 1,
        0xC7 => {
            if opsize_override {
                2
            } else {
                4
            }
        }
        0xE8 | 0xE9 => 4,
        0xEB => 1,
        0x70..=0x7F => 1,
        0xF6 => {
            if matches!(modrm_reg, Some(r) if group3_has_immediate(r)) {
                1
            } else {
                0
            }
        }
        0xF7 => {
            if matches!(modrm_reg, Some(r) if group3_has_immediate(r)) {
                if opsize_override {
                    2
                } else {
                    4
                }
            } else {
                0
            }
        }
        _ => 0,
    }
}
