//! The dispatcher (C5, spec.md §4.5): classify then route to the matching
//! C4 entry, in the fixed category order `{ALU, MEMORY, BRANCH, BIT,
//! STRING, SPECIAL}` that `xbt_decode::classify` already evaluates in.

use xbt_decode::{classify, Category};
use xbt_types::DecodedInsn;

use crate::emit::{arm64, CodeBuffer};
use crate::lower::{self, MappedRegs};

/// The dispatcher's three-field result (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    /// The translator recognised and emitted something for this instruction.
    pub success: bool,
    /// The emitted instruction is a block terminator.
    pub ends_block: bool,
    /// Bytes consumed from the guest stream (i.e. `insn.length`, echoed
    /// back here so callers don't need to hold onto the decoded record).
    pub length: u8,
}

/// Route one decoded instruction to its category's lowering entry.
///
/// If no category claims the instruction, a host `NOP` is emitted and
/// `success = false` is returned — the caller (the block translator)
/// decides whether to continue past it or terminate the block.
pub fn dispatch(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> DispatchResult {
    let length = insn.length;

    let category = classify::classify(insn);
    let outcome = match category {
        Some(Category::Alu) => Some(lower::alu::lower(buf, insn, regs)),
        Some(Category::Memory) => Some(lower::mem::lower(buf, insn, regs)),
        Some(Category::Branch) => Some(lower::branch::lower(buf, insn, regs)),
        Some(Category::Bit) => Some(lower::bit::lower(buf, insn, regs)),
        Some(Category::String) => Some(lower::string::lower(buf, insn, regs)),
        Some(Category::Special) => Some(lower::special::lower(buf, insn, regs)),
        None => None,
    };

    match outcome {
        Some(outcome) => DispatchResult {
            success: true,
            ends_block: outcome.ends_block,
            length,
        },
        None => {
            buf.push_u32(arm64::nop());
            DispatchResult {
                success: false,
                ends_block: false,
                length,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbt_decode::decode;

    #[test]
    fn unrecognised_opcode_emits_nop_and_reports_failure() {
        // `0F 0F` (3DNow! prefix, unhandled here) decodes a primary/
        // secondary pair no predicate claims.
        let insn = decode(&[0x0F, 0x04]);
        let mut buf = CodeBuffer::with_capacity(8);
        let result = dispatch(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert!(!result.success);
        assert_eq!(buf.bytes(), &arm64::nop().to_le_bytes());
    }

    #[test]
    fn mov_reg_reg_dispatches_to_memory_and_continues() {
        let insn = decode(&[0x48, 0x89, 0xC8]);
        let mut buf = CodeBuffer::with_capacity(8);
        let result = dispatch(&mut buf, &insn, MappedRegs { dst: 0, src: Some(1) });
        assert!(result.success);
        assert!(!result.ends_block);
        assert_eq!(result.length, 3);
    }

    #[test]
    fn ret_dispatches_to_branch_and_ends_block() {
        let insn = decode(&[0xC3]);
        let mut buf = CodeBuffer::with_capacity(8);
        let result = dispatch(&mut buf, &insn, MappedRegs { dst: 0, src: None });
        assert!(result.success);
        assert!(result.ends_block);
    }
}
