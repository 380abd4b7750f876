//! The JIT core: code arena (C7), translation cache (C8), block optimiser
//! / linker (C9), block translator (C6), and executor (C10), orchestrated
//! by [`engine::Engine`].

pub mod arena;
pub mod block;
pub mod cache;
pub mod config;
pub mod engine;
pub mod exec;
pub mod opt;

pub use arena::{ArenaError, CodeArena};
pub use block::{BlockError, GuestMemory, TranslationResult};
pub use cache::{CacheHit, CacheStats, TranslationCache};
pub use config::EngineConfig;
pub use engine::{Engine, Telemetry};
pub use exec::{BlockExit, FaultKind};
pub use opt::LinkError;
