//! Special-family lowering (spec.md §4.4 "Special"): `CPUID`, `RDTSC`,
//! `CQO`/`CWD`/`CDQ`, `NOP`, `CLI`/`STI`.

use xbt_decode::classify;
use xbt_types::DecodedInsn;

use crate::emit::arm64;
use crate::emit::CodeBuffer;
use crate::lower::{LowerOutcome, MappedRegs};

/// Guest GPR host slots under the identity map (spec.md §4.3).
const EAX: u8 = 0;
const ECX: u8 = 1;
const EDX: u8 = 2;
const EBX: u8 = 3;
const SCRATCH: u8 = 17;

/// A fixed, stable-across-calls CPUID leaf-0 vendor/feature stencil
/// (spec.md §4.4: "the exact constants are implementation-defined but must
/// be stable across calls for the same leaf/subleaf"). Leaf/subleaf
/// dispatch by `EAX`/`ECX` input is a collaborator concern out of this
/// core's scope; this entry always emits the same canonical values.
const CPUID_EBX: u64 = 0x6974_6E65; // "Genu" little-endian half, reused as a stable placeholder
const CPUID_EDX: u64 = 0x494C_6E65;
const CPUID_ECX: u64 = 0x6C65_746E;
const CPUID_EAX: u64 = 0x0000_0001;

pub fn lower(buf: &mut CodeBuffer, insn: &DecodedInsn, regs: MappedRegs) -> LowerOutcome {
    let _ = regs;

    if classify::is_cpuid(insn) {
        for word in arm64::movz_movk_sequence(EAX, CPUID_EAX) {
            buf.push_u32(word);
        }
        for word in arm64::movz_movk_sequence(EBX, CPUID_EBX) {
            buf.push_u32(word);
        }
        for word in arm64::movz_movk_sequence(ECX, CPUID_ECX) {
            buf.push_u32(word);
        }
        for word in arm64::movz_movk_sequence(EDX, CPUID_EDX) {
            buf.push_u32(word);
        }
    } else if classify::is_rdtsc(insn) {
        // Read the full 64-bit counter once into scratch, then split it
        // low32:high32 across EAX:EDX per spec.md §4.4's `RDTSC` contract.
        buf.push_u32(arm64::mrs_cntvct(SCRATCH));
        buf.push_u32(arm64::ubfx(EAX, SCRATCH, 0, 32));
        buf.push_u32(arm64::ubfx(EDX, SCRATCH, 32, 32));
    } else if classify::is_cqo_cwd_cdq(insn) {
        // Sign-extend the top bit of AX/EAX/RAX across EDX/RDX: the shift
        // amount depends on the operand width this single `0x99` opcode
        // carries under REX.W (`CQO`, 64-bit) / the `0x66` prefix (`CWD`,
        // 16-bit) / neither (`CDQ`, 32-bit).
        let shift = if insn.rex.w {
            63
        } else if insn.opsize_override {
            15
        } else {
            31
        };
        buf.push_u32(arm64::asr_imm(EDX, EAX, shift));
    } else if classify::is_nop(insn) {
        buf.push_u32(arm64::nop());
    } else if classify::is_cli(insn) || classify::is_sti(insn) {
        // Stubs with no observable effect in user-mode translation
        // (spec.md §4.4).
        buf.push_u32(arm64::nop());
    }

    LowerOutcome::continues()
}
