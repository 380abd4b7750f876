//! Host code generation: the byte/word emitter (C2), register mapper (C3),
//! per-category lowering (C4), and category dispatcher (C5).
//!
//! The headline direction is x86_64-guest → ARM64-host, so [`dispatch`] and
//! [`lower`] are written against that pipeline (see `DESIGN.md`'s Open
//! Question #3). [`emit::x86_64`] is a complete, independent set of
//! encoders for the reverse (ARM64-guest → x86_64-host) helper paths spec.md
//! §4.2 names, for a future mirrored translator to call into.

pub mod emit;
pub mod regmap;

mod dispatch;
mod lower;

pub use dispatch::{dispatch, DispatchResult};
pub use lower::MappedRegs;
