/// REX prefix bits (x86_64 §2.2.1). `None` if no REX byte was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rex {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

/// Decoded and REX-extended ModR/M byte. `reg` and `rm` are already folded
/// with `REX.R`/`REX.B` into 4-bit values; when `mode != 3` and the raw
/// 3-bit `rm` was `4`, `rm_is_sib` records that a SIB byte followed and
/// `rm` itself carries `SIB.base` (REX.B-extended) instead of a register
/// operand. See spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
    pub rm_is_sib: bool,
    /// `true` for the `mod=00, rm=101` RIP-relative addressing form.
    pub rip_relative: bool,
}

/// Which `REP`-family prefix (if any) preceded the primary opcode. Only
/// meaningful for the string family (`MOVS`/`STOS`/`LODS`/`CMPS`/`SCAS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRep {
    None,
    /// `0xF3` on `MOVS`/`STOS`/`LODS`: repeat `RCX` times, unconditionally.
    Rep,
    /// `0xF3` on `CMPS`/`SCAS`: repeat while equal (and `RCX != 0`).
    RepE,
    /// `0xF2` on `CMPS`/`SCAS`: repeat while not equal (and `RCX != 0`).
    RepNe,
}

/// A legacy segment-override prefix. Stored only because spec.md §4.1
/// requires it to be walked; its value is never interpreted further (the
/// core assumes an identity address space — spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOverride(pub u8);

/// One fully decoded x86_64 instruction, per spec.md §3's "Decoded
/// instruction" data model. `length == 0` signals an undecodable prefix
/// sequence and the block translator must terminate on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInsn {
    pub primary_opcode: u8,
    pub secondary_opcode: Option<u8>,
    pub rex: Rex,
    pub modrm: Option<ModRm>,
    /// Sign-extended to 64 bits, per spec.md §4.1's "all sign extensions
    /// MUST target 64-bit widths before storing".
    pub disp: i64,
    pub disp_size: u8,
    /// Sign-extended to 64 bits.
    pub imm: i64,
    pub imm_size: u8,
    pub length: u8,
    pub operand64: bool,
    pub opsize_override: bool,
    pub addrsize_override: bool,
    pub lock: bool,
    pub rep: StringRep,
    pub segment: Option<SegmentOverride>,
}

impl DecodedInsn {
    /// The spec's "undecodable prefix sequence" sentinel: zero length.
    pub fn undecodable() -> DecodedInsn {
        DecodedInsn {
            primary_opcode: 0,
            secondary_opcode: None,
            rex: Rex::default(),
            modrm: None,
            disp: 0,
            disp_size: 0,
            imm: 0,
            imm_size: 0,
            length: 0,
            operand64: false,
            opsize_override: false,
            addrsize_override: false,
            lock: false,
            rep: StringRep::None,
            segment: None,
        }
    }

    pub fn is_undecodable(&self) -> bool {
        self.length == 0
    }

    /// Is this a two-byte-escape (`0x0F xx`) opcode?
    pub fn is_escaped(&self) -> bool {
        self.secondary_opcode.is_some()
    }

    /// The effective opcode used for family classification: the secondary
    /// byte if this is a `0x0F` escape, else the primary byte.
    pub fn effective_opcode(&self) -> u8 {
        self.secondary_opcode.unwrap_or(self.primary_opcode)
    }
}
