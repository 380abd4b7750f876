//! Instruction-category predicates (spec.md §4.1). Each predicate inspects
//! only `primary_opcode`, `secondary_opcode`, and (for opcode groups)
//! `modrm`'s `reg` sub-opcode field — never the operand values — and the
//! set is total and mutually exclusive: [`classify`] always returns exactly
//! one category, never two (spec.md §8 testable property 2).

use xbt_types::DecodedInsn;

/// The six translator categories the dispatcher (`xbt-codegen::dispatch`)
/// routes on, in the evaluation order spec.md §4.5 fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Alu,
    Memory,
    Branch,
    Bit,
    String,
    Special,
}

/// Raw ModR/M `reg` sub-opcode, unextended by `REX.R` — groups only ever
/// have 8 members.
fn group_reg(insn: &DecodedInsn) -> Option<u8> {
    insn.modrm.map(|m| m.reg & 0x7)
}

pub fn is_add(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x00..=0x05)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(0))
}

pub fn is_or(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x08..=0x0D)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(1))
}

pub fn is_and(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x20..=0x25)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(4))
}

pub fn is_sub(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x28..=0x2D)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(5))
}

pub fn is_xor(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x30..=0x35)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(6))
}

pub fn is_cmp(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x38..=0x3D)
        || (matches!(i.primary_opcode, 0x80 | 0x81 | 0x83) && group_reg(i) == Some(7))
}

pub fn is_test(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x84 | 0x85 | 0xA8 | 0xA9)
        || (matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(0))
}

pub fn is_mul(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(4)
}

pub fn is_imul(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x69 | 0x6B)
        || (matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(5))
        || (i.secondary_opcode == Some(0xAF))
}

pub fn is_div(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(6)
}

pub fn is_idiv(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(7)
}

pub fn is_inc(i: &DecodedInsn) -> bool {
    (i.primary_opcode == 0xFE && group_reg(i) == Some(0))
        || (i.primary_opcode == 0xFF && group_reg(i) == Some(0))
}

pub fn is_dec(i: &DecodedInsn) -> bool {
    (i.primary_opcode == 0xFE && group_reg(i) == Some(1))
        || (i.primary_opcode == 0xFF && group_reg(i) == Some(1))
}

pub fn is_neg(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(3)
}

pub fn is_not(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xF6 | 0xF7) && group_reg(i) == Some(2)
}

/// `SHL`/`SHR`/`SAR`/`ROL`/`ROR` (and `RCL`/`RCR`, routed the same way as
/// the rest of the shift/rotate group — spec.md names the common ones).
pub fn is_shift_rotate(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xC0 | 0xC1 | 0xD0..=0xD3)
}

fn is_alu_group(i: &DecodedInsn) -> bool {
    is_add(i)
        || is_or(i)
        || is_and(i)
        || is_sub(i)
        || is_xor(i)
        || is_cmp(i)
        || is_test(i)
        || is_mul(i)
        || is_imul(i)
        || is_div(i)
        || is_idiv(i)
        || is_inc(i)
        || is_dec(i)
        || is_neg(i)
        || is_not(i)
        || is_shift_rotate(i)
}

pub fn is_mov(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x88..=0x8B | 0xB0..=0xBF | 0xC6 | 0xC7)
}

pub fn is_mov_imm64(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xB8..=0xBF) && i.rex.w
}

pub fn is_movzx(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0xB6) | Some(0xB7))
}

pub fn is_movsx(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0xBE) | Some(0xBF)) || i.primary_opcode == 0x63
}

pub fn is_lea(i: &DecodedInsn) -> bool {
    i.primary_opcode == 0x8D
}

pub fn is_push(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x50..=0x57 | 0x68 | 0x6A)
        || (i.primary_opcode == 0xFF && group_reg(i) == Some(6))
}

pub fn is_pop(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x58..=0x5F) || (i.primary_opcode == 0x8F && group_reg(i) == Some(0))
}

fn is_memory_group(i: &DecodedInsn) -> bool {
    is_mov(i) || is_movzx(i) || is_movsx(i) || is_lea(i) || is_push(i) || is_pop(i)
}

pub fn is_jmp(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xE9 | 0xEB) || (i.primary_opcode == 0xFF && group_reg(i) == Some(4))
}

pub fn is_jcc(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x70..=0x7F) || matches!(i.secondary_opcode, Some(0x80..=0x8F))
}

pub fn is_call(i: &DecodedInsn) -> bool {
    i.primary_opcode == 0xE8 || (i.primary_opcode == 0xFF && group_reg(i) == Some(2))
}

pub fn is_ret(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xC2 | 0xC3)
}

pub fn is_cmovcc(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0x40..=0x4F))
}

pub fn is_setcc(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0x90..=0x9F))
}

pub fn is_xchg(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0x86 | 0x87 | 0x91..=0x97)
}

fn is_branch_group(i: &DecodedInsn) -> bool {
    is_jmp(i) || is_jcc(i) || is_call(i) || is_ret(i) || is_cmovcc(i) || is_setcc(i) || is_xchg(i)
}

pub fn is_bsf(i: &DecodedInsn) -> bool {
    i.secondary_opcode == Some(0xBC)
}

pub fn is_bsr(i: &DecodedInsn) -> bool {
    i.secondary_opcode == Some(0xBD)
}

pub fn is_popcnt(i: &DecodedInsn) -> bool {
    i.secondary_opcode == Some(0xB8)
}

pub fn is_bt_family(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0xA3) | Some(0xAB) | Some(0xB3) | Some(0xBB) | Some(0xBA))
}

pub fn is_shld(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0xA4) | Some(0xA5))
}

pub fn is_shrd(i: &DecodedInsn) -> bool {
    matches!(i.secondary_opcode, Some(0xAC) | Some(0xAD))
}

fn is_bit_group(i: &DecodedInsn) -> bool {
    is_bsf(i) || is_bsr(i) || is_popcnt(i) || is_bt_family(i) || is_shld(i) || is_shrd(i)
}

pub fn is_movs(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xA4 | 0xA5)
}

pub fn is_stos(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xAA | 0xAB)
}

pub fn is_lods(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xAC | 0xAD)
}

pub fn is_cmps(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xA6 | 0xA7)
}

pub fn is_scas(i: &DecodedInsn) -> bool {
    matches!(i.primary_opcode, 0xAE | 0xAF)
}

fn is_string_group(i: &DecodedInsn) -> bool {
    is_movs(i) || is_stos(i) || is_lods(i) || is_cmps(i) || is_scas(i)
}

pub fn is_cpuid(i: &DecodedInsn) -> bool {
    i.secondary_opcode == Some(0xA2)
}

pub fn is_rdtsc(i: &DecodedInsn) -> bool {
    i.secondary_opcode == Some(0x31)
}

pub fn is_cqo_cwd_cdq(i: &DecodedInsn) -> bool {
    i.primary_opcode == 0x99
}

pub fn is_nop(i: &DecodedInsn) -> bool {
    (i.primary_opcode == 0x90 && i.rex == xbt_types::Rex::default())
        || i.secondary_opcode == Some(0x1F)
}

pub fn is_cli(i: &DecodedInsn) -> bool {
    i.primary_opcode == 0xFA
}

pub fn is_sti(i: &DecodedInsn) -> bool {
    i.primary_opcode == 0xFB
}

fn is_special_group(i: &DecodedInsn) -> bool {
    is_cpuid(i) || is_rdtsc(i) || is_cqo_cwd_cdq(i) || is_nop(i) || is_cli(i) || is_sti(i)
}

/// Classify a decoded instruction into exactly one category, evaluating the
/// predicates in the fixed order `{ALU, MEMORY, BRANCH, BIT, STRING,
/// SPECIAL}` spec.md §4.5 specifies. `None` means no category recognised
/// the instruction; the dispatcher falls back to an emitted host `NOP`.
pub fn classify(insn: &DecodedInsn) -> Option<Category> {
    if insn.is_undecodable() {
        return None;
    }
    if is_alu_group(insn) {
        Some(Category::Alu)
    } else if is_memory_group(insn) {
        Some(Category::Memory)
    } else if is_branch_group(insn) {
        Some(Category::Branch)
    } else if is_bit_group(insn) {
        Some(Category::Bit)
    } else if is_string_group(insn) {
        Some(Category::String)
    } else if is_special_group(insn) {
        Some(Category::Special)
    } else {
        None
    }
}
