//! The code arena (C7, spec.md §4.7): a single executable mapping acquired
//! writable, filled by the block translator, then re-permissioned
//! executable — the W^X discipline spec.md §9's "Design Notes" calls for.
//! Bump allocation with optional power-of-two alignment is the sole
//! placement policy; there is no free-list, and reset only rewinds the
//! cursor (spec.md §3: "does NOT zero bytes").
//!
//! Grounded on `jeremyhahn-neurlang`'s `memmap2`-backed executable buffer
//! (`DESIGN.md`), adapted to the writable/executable toggle `memmap2`
//! exposes through `MmapMut::make_exec`/`Mmap::make_mut`.

use memmap2::{Mmap, MmapMut};

/// Errors the arena can report. None of these are guest-visible; they
/// surface to `xbt-jit::block`, which turns an allocation failure into a
/// flush-and-retry (spec.md §4.7).
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("failed to map {0} bytes of anonymous memory: {1}")]
    Map(usize, std::io::Error),
    #[error("failed to toggle page protection: {0}")]
    Protect(std::io::Error),
    #[error("arena region is not in the state this operation requires")]
    WrongState,
}

enum Region {
    /// Writable view: the block translator copies finished translations in.
    Writable(MmapMut),
    /// Executable view: the executor (C10) enters code through this one.
    Executable(Mmap),
    /// Transient placeholder used only while swapping between the two
    /// (never observable outside a single method call).
    Empty,
}

/// A single W^X code arena region of fixed byte capacity `S`.
pub struct CodeArena {
    region: Region,
    capacity: usize,
    cursor: usize,
}

impl CodeArena {
    /// Acquire a fresh writable mapping of exactly `capacity` bytes.
    pub fn new(capacity: usize) -> Result<CodeArena, ArenaError> {
        let map = MmapMut::map_anon(capacity).map_err(|e| ArenaError::Map(capacity, e))?;
        Ok(CodeArena {
            region: Region::Writable(map),
            capacity,
            cursor: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Round `offset` up to the next multiple of `align` (`align` must be
    /// a power of two; the caller's request, per spec.md §3, "produces the
    /// next offset satisfying the requested power-of-two alignment").
    fn align_up(offset: usize, align: usize) -> usize {
        debug_assert!(align.is_power_of_two());
        (offset + align - 1) & !(align - 1)
    }

    /// Bump-allocate `size` bytes at `align`-byte alignment. Returns the
    /// byte offset of the region, or `None` on exhaustion (spec.md §4.7).
    /// Must be called while the arena is writable.
    pub fn allocate(&mut self, size: usize, align: usize) -> Option<usize> {
        let aligned = Self::align_up(self.cursor, align.max(1));
        if aligned.checked_add(size)? > self.capacity {
            return None;
        }
        self.cursor = aligned + size;
        Some(aligned)
    }

    /// Copy `bytes` into the writable view at `offset`. Panics if the
    /// region isn't writable or the range is out of bounds — callers only
    /// ever write into a range they just got from [`CodeArena::allocate`].
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        match &mut self.region {
            Region::Writable(map) => {
                map[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
            _ => panic!("xbt-jit: arena write requires the writable view"),
        }
    }

    /// A pointer into the currently executable view, for installation into
    /// the translation cache. `None` while the arena is in its writable
    /// phase — callers must `make_executable` first.
    pub fn executable_ptr(&self, offset: usize) -> Option<*const u8> {
        match &self.region {
            Region::Executable(map) => Some(unsafe { map.as_ptr().add(offset) }),
            _ => None,
        }
    }

    /// Transition writable -> executable, and synchronise the instruction
    /// cache over the whole written range. Per spec.md §4.7 this MUST
    /// happen before any host control flow can reach the region. A no-op
    /// if the arena is already executable — callers ensure this before
    /// every block entry rather than tracking state themselves.
    pub fn make_executable(&mut self) -> Result<(), ArenaError> {
        let region = std::mem::replace(&mut self.region, Region::Empty);
        let writable = match region {
            Region::Writable(map) => map,
            exec @ Region::Executable(_) => {
                self.region = exec;
                return Ok(());
            }
            Region::Empty => return Err(ArenaError::WrongState),
        };
        let exec = writable.make_exec().map_err(ArenaError::Protect)?;
        sync_icache(exec.as_ptr(), self.cursor);
        self.region = Region::Executable(exec);
        Ok(())
    }

    /// Transition back to writable (needed before the next block's
    /// `write`). A no-op if already writable.
    pub fn make_writable(&mut self) -> Result<(), ArenaError> {
        let region = std::mem::replace(&mut self.region, Region::Empty);
        let exec = match region {
            Region::Executable(map) => map,
            writable @ Region::Writable(_) => {
                self.region = writable;
                return Ok(());
            }
            Region::Empty => return Err(ArenaError::WrongState),
        };
        let map = exec.make_mut().map_err(ArenaError::Protect)?;
        self.region = Region::Writable(map);
        Ok(())
    }

    /// Rewind the cursor to zero. Per spec.md §3: "does NOT zero bytes —
    /// callers must ensure no host pointer into the reset region is
    /// reachable." Used by the cache's `flush()`.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Range-invalidate the instruction cache over `[ptr, ptr + len)`. On
/// aarch64 this is the `dc cvau` / `ic ivau` cache-maintenance sequence;
/// elsewhere (x86_64 development hosts, where the emitted ARM64 bytes are
/// never actually executed) it is a no-op.
fn sync_icache(ptr: *const u8, len: usize) {
    #[cfg(target_arch = "aarch64")]
    {
        // Real aarch64 hosts need a per-cache-line `dc cvau` followed by a
        // `dsb ish`, then `ic ivau` per line and `isb`. The line size is
        // read from `ctr_el0`; a conservative 64-byte stride is assumed
        // here rather than reading it, since this core's arena never spans
        // more than one architecture's cache-line granularity in practice.
        const LINE: usize = 64;
        let start = ptr as usize;
        let end = start + len;
        let mut addr = start & !(LINE - 1);
        unsafe {
            while addr < end {
                std::arch::asm!("dc cvau, {0}", in(reg) addr);
                addr += LINE;
            }
            std::arch::asm!("dsb ish");
            addr = start & !(LINE - 1);
            while addr < end {
                std::arch::asm!("ic ivau, {0}", in(reg) addr);
                addr += LINE;
            }
            std::arch::asm!("dsb ish");
            std::arch::asm!("isb");
        }
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        let _ = (ptr, len);
    }
}
