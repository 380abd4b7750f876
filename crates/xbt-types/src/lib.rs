//! Shared value types for the translator: register numbering, operand
//! widths, the decoded-instruction record, and guest condition-flag bits.
//!
//! Nothing here is fallible; decode failure and translation failure are
//! modeled in `xbt-decode` / `xbt-jit` respectively, not as error variants
//! on these plain data types.

mod flags;
mod insn;
mod reg;
mod width;

pub use flags::GuestFlags;
pub use insn::{DecodedInsn, ModRm, Rex, SegmentOverride, StringRep};
pub use reg::{GuestReg, Gpr, Vreg};
pub use width::Width;
