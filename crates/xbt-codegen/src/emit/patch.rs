//! Jump patching (spec.md §4.2 "Jump patching"). Forward branches are
//! emitted with a zero 32-bit displacement placeholder; the offset of that
//! placeholder is recorded and resolved once the target address is known.

use super::buffer::CodeBuffer;

/// The byte offset, inside a [`CodeBuffer`], of a 32-bit displacement
/// placeholder emitted by a not-yet-resolved branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSite {
    pub offset: usize,
}

/// Resolve a placeholder: writes `target - (offset + 4)` at `site.offset`,
/// matching the rel32 convention (displacement is relative to the byte
/// *after* the 4-byte field). Returns `false` if the write falls outside
/// the buffer's already-written bytes.
pub fn apply(buffer: &mut CodeBuffer, site: PatchSite, target: i64) -> bool {
    let instruction_end = (site.offset as i64) + 4;
    let displacement = target - instruction_end;
    buffer.patch_u32(site.offset, displacement as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_computes_relative_displacement() {
        let mut buf = CodeBuffer::with_capacity(16);
        buf.push_u8(0xE9); // JMP rel32
        let site = PatchSite { offset: buf.len() };
        buf.push_u32(0); // placeholder
        assert!(apply(&mut buf, site, 100));
        let bytes = buf.bytes();
        let disp = i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        assert_eq!(disp, 100 - 5);
    }
}
