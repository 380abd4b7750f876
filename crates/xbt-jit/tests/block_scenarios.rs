//! Block-level concrete scenarios from spec.md §8.

use xbt_jit::{block, cache::TranslationCache, config::EngineConfig, engine::Engine, CodeArena, GuestMemory};

struct FixedMemory(Vec<u8>);

impl GuestMemory for FixedMemory {
    fn read(&self, pc: u64, max_len: usize) -> &[u8] {
        let start = pc as usize;
        if start >= self.0.len() {
            return &[];
        }
        let end = (start + max_len).min(self.0.len());
        &self.0[start..end]
    }
}

#[test]
fn cache_collision_evicts_the_older_slot() {
    let mut cache = TranslationCache::new(8, 50); // 256 slots
    let pc1 = 0x401000u64;
    cache.insert(pc1, 0xBEEF_0000, 16);
    // `16 * N` steps the hash by a multiple of the low-8-bit index stride
    // only if the multiplier happens to preserve it; walk forward for a
    // genuine same-slot collision instead of assuming the stride.
    let mut pc2 = pc1 + 1;
    loop {
        cache.insert(pc2, 0xCAFE_0000, 16);
        if cache.lookup(pc1).is_none() {
            break;
        }
        pc2 += 1;
    }
    assert!(cache.lookup(pc1).is_none());
    assert_eq!(cache.lookup(pc2).unwrap().host_addr, 0xCAFE_0000);
}

#[test]
fn block_terminating_in_ret_reports_ends_with_branch() {
    let memory = FixedMemory(vec![0x48, 0x01, 0xC8, 0xC3]); // ADD RAX, RCX; RET
    let mut cache = TranslationCache::new(10, 50);
    let mut arena = CodeArena::new(64 * 1024).unwrap();
    let config = EngineConfig::default();
    let result = block::translate(&memory, 0, &mut cache, &mut arena, &config).unwrap();
    assert!(result.ends_with_branch);
    assert_eq!(result.instruction_count, 2);
}

#[test]
fn linking_two_sequential_blocks_patches_a_jmp_rel32_into_the_first() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let memory = FixedMemory(vec![0xC3, 0xC3]); // two one-byte RET blocks at pc 0 and pc 1
    let a = engine.translate(&memory, 0).unwrap();
    let b = engine.translate(&memory, 1).unwrap();

    engine.link(0, 1, 0).unwrap();

    let region = unsafe { std::slice::from_raw_parts(a.host_ptr as *const u8, a.size) };
    assert_eq!(region[region.len() - 5], 0xE9);
    let disp = i32::from_le_bytes([
        region[region.len() - 4],
        region[region.len() - 3],
        region[region.len() - 2],
        region[region.len() - 1],
    ]);
    let jump_end = a.host_ptr as i64 + a.size as i64;
    assert_eq!(disp as i64, b.host_ptr as i64 - jump_end);
}
