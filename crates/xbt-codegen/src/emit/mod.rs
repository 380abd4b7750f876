//! The host emitter (C2): append primitives at three levels (raw byte,
//! 32-bit word, 64-bit word — see [`buffer::CodeBuffer`]), ARM64
//! instruction-word templates for the headline guest->host direction, the
//! x86_64 helper-path encoders for the reverse direction, the canonical
//! condition-code tables, and jump-patch support.

pub mod arm64;
pub mod buffer;
pub mod cond;
pub mod patch;
pub mod x86_64;

pub use buffer::CodeBuffer;
pub use cond::Cond;
pub use patch::PatchSite;
