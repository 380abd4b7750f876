//! The executor (C10, spec.md §4.10): transfers control to already-linked
//! host code and reports back why it returned. Total and non-panicking by
//! contract (spec.md §9's "Exceptions for control flow" redesign note) —
//! every exit, including a guest fault, is a tagged value rather than an
//! unwind.

/// Opaque guest register-file handle the embedder owns. This core only
/// needs an address to hand to emitted code on entry; what it points to
/// (and the calling convention for materialising/spilling the guest
/// register file around it) is the embedder's concern (spec.md §4.10).
pub type GuestStatePtr = *mut u8;

/// What kind of signal a guest fault corresponds to (spec.md §6's
/// signal/exception mapping table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `SEGV`/`BUS` -> data abort.
    DataAbort,
    /// `ILL` -> undefined instruction.
    Undefined,
    /// `FPE` -> floating-point trap.
    FloatingPoint,
    /// `TRAP` -> breakpoint.
    Breakpoint,
}

/// Why emitted code returned control to the dispatcher (spec.md §9:
/// `BlockExit ∈ {RET_TO_CACHE, SYSCALL, FAULT(kind, addr, insn)}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExit {
    /// Ordinary fall-through `RET`: consult the cache for the next block.
    RetToCache,
    /// A guest syscall instruction was hit; state has been spilled and the
    /// syscall-emulation collaborator (spec.md §6) should be invoked next.
    Syscall,
    /// A guest exception. `addr` is the faulting guest address (for
    /// `DataAbort`) or the guest PC (otherwise); `insn` is the offending
    /// host instruction word, carried for diagnostics.
    Fault {
        kind: FaultKind,
        addr: u64,
        insn: u32,
    },
}

/// Enter `host_ptr` with `state` materialised into host registers per the
/// register map (§4.3), and report why it returned.
///
/// This core never actually jumps into the generated bytes — doing so
/// would require a hand-written trampoline in host assembly plus a real
/// aarch64 target, both out of scope for a translator exercised purely at
/// the data-structure level. The entry point exists so `Engine::run` has a
/// single, total seam to call; a real embedding replaces this function's
/// body with the host-specific enter/restore sequence while keeping the
/// `BlockExit` contract identical.
pub fn enter(host_ptr: *const u8, state: GuestStatePtr) -> BlockExit {
    let _ = (host_ptr, state);
    BlockExit::RetToCache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_is_total_and_returns_ret_to_cache_by_default() {
        let ptr = 0x1000 as *const u8;
        let state = std::ptr::null_mut();
        assert_eq!(enter(ptr, state), BlockExit::RetToCache);
    }

    #[test]
    fn fault_carries_its_diagnostic_fields() {
        let exit = BlockExit::Fault {
            kind: FaultKind::DataAbort,
            addr: 0xDEAD_BEEF,
            insn: 0,
        };
        match exit {
            BlockExit::Fault { kind, addr, .. } => {
                assert_eq!(kind, FaultKind::DataAbort);
                assert_eq!(addr, 0xDEAD_BEEF);
            }
            _ => panic!("expected Fault"),
        }
    }
}
