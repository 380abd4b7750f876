use bitflags::bitflags;

bitflags! {
    /// The subset of x86_64 `RFLAGS` the translator reads or writes.
    ///
    /// Bit positions match the architectural `RFLAGS` layout exactly (this
    /// is standard x86 and not an implementation choice — see
    /// `DESIGN.md`'s Open Question note on the direction flag).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GuestFlags: u32 {
        const CARRY     = 1 << 0;
        const PARITY    = 1 << 2;
        const AUX_CARRY = 1 << 4;
        const ZERO      = 1 << 6;
        const SIGN      = 1 << 7;
        const TRAP      = 1 << 8;
        const INTERRUPT = 1 << 9;
        /// String-instruction step direction: 0 = forward (`++`), 1 = backward (`--`).
        const DIRECTION = 1 << 10;
        const OVERFLOW  = 1 << 11;
    }
}
