//! The guest instruction decoder (spec.md §4.1, component C1).
//!
//! `decode` walks raw x86_64 bytes and recovers legacy prefixes, at most one
//! `REX` byte, the primary (and optional two-byte-escape secondary) opcode,
//! `ModR/M`/`SIB`, displacement and immediate. A returned `length == 0`
//! means the prefix/opcode sequence could not be recognised and the caller
//! (the block translator, `xbt-jit::block`) must terminate the block.
//!
//! Classification of a decoded instruction into one of the six translator
//! categories lives in [`classify`] as a set of total, mutually exclusive
//! predicates — they are the only discriminators `xbt-codegen`'s dispatcher
//! is allowed to use (spec.md §4.1).

pub mod classify;
mod decoder;
mod opcode;

pub use classify::{classify, Category};
pub use decoder::decode;
