/// One of x86_64's 16 architectural general-purpose registers.
///
/// REX.R/REX.B extension bits are folded into the `ModRm`/`Sib` fields
/// before a `Gpr` is ever constructed, so this type only ever needs to
/// represent the 16 encodings — callers never see a raw 3-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Panics on `encoding > 15`; callers are expected to have already
    /// masked a REX-extended field down to 4 bits.
    pub const fn from_u8(encoding: u8) -> Gpr {
        match encoding & 0x0F {
            0 => Gpr::Rax,
            1 => Gpr::Rcx,
            2 => Gpr::Rdx,
            3 => Gpr::Rbx,
            4 => Gpr::Rsp,
            5 => Gpr::Rbp,
            6 => Gpr::Rsi,
            7 => Gpr::Rdi,
            8 => Gpr::R8,
            9 => Gpr::R9,
            10 => Gpr::R10,
            11 => Gpr::R11,
            12 => Gpr::R12,
            13 => Gpr::R13,
            14 => Gpr::R14,
            15 => Gpr::R15,
            _ => unreachable!(),
        }
    }
}

/// One of x86_64 SSE's 16 `xmm` registers, or (as a guest register) one of
/// ARM64's 32 `v` registers. The wider guest domain is what forces the
/// modulo-16 wrap in the register mapper (`xbt-codegen::regmap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vreg(pub u8);

impl Vreg {
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// A guest register slot as named by a decoded instruction: either a GPR
/// or a vector register, each carrying the width the access was made at.
///
/// The `high8` flag distinguishes the legacy `AH/CH/DH/BH` byte encodings
/// (no REX prefix, `reg`/`rm` in `4..=7`) from the REX-prefixed low-byte
/// registers `SPL/BPL/SIL/DIL`, which share the same 3-bit encoding but
/// name a different architectural byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestReg {
    Gpr {
        reg: Gpr,
        width: crate::Width,
        high8: bool,
    },
    Vector(Vreg),
}
