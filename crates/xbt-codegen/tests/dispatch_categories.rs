//! Black-box coverage of the dispatcher routing every category to a
//! non-trivial host sequence, and reporting failure (not a panic) on an
//! unrecognised opcode.

use xbt_codegen::emit::CodeBuffer;
use xbt_codegen::{dispatch, MappedRegs};
use xbt_decode::decode;

fn regs() -> MappedRegs {
    MappedRegs { dst: 0, src: Some(1) }
}

#[test]
fn alu_add_reg_reg_dispatches_and_continues() {
    let insn = decode(&[0x48, 0x01, 0xC8]); // ADD RAX, RCX
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
    assert!(!result.ends_block);
    assert!(!buf.is_empty());
}

#[test]
fn memory_mov_reg_reg_dispatches() {
    let insn = decode(&[0x48, 0x89, 0xC8]); // MOV RAX, RCX
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
    assert!(!result.ends_block);
}

#[test]
fn branch_ret_dispatches_and_ends_block() {
    let insn = decode(&[0xC3]);
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
    assert!(result.ends_block);
}

#[test]
fn bit_bsf_dispatches() {
    let insn = decode(&[0x0F, 0xBC, 0xC8]); // BSF ECX, EAX
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
}

#[test]
fn string_movsb_dispatches() {
    let insn = decode(&[0xF3, 0xA4]); // REP MOVSB
    let mut buf = CodeBuffer::with_capacity(64);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
}

#[test]
fn special_rdtsc_dispatches() {
    let insn = decode(&[0x0F, 0x31]); // RDTSC
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(result.success);
}

#[test]
fn unrecognised_opcode_fails_without_panicking() {
    let insn = decode(&[0x0F, 0x0B]); // UD2: unclaimed by any category here
    let mut buf = CodeBuffer::with_capacity(32);
    let result = dispatch(&mut buf, &insn, regs());
    assert!(!result.success);
    assert_eq!(buf.len(), 4); // a single host NOP word was still emitted
}
