//! Magazine-based slab allocator (spec §3/§4.A): per-type object caches with
//! per-CPU magazines over a backing [`arena::Arena`].

pub mod arena;
pub mod cache;
pub mod magazine;

pub use arena::{Arena, HeapArena};
pub use cache::{Cache, CacheStats, Registry};
pub use magazine::MAGAZINE_CAPACITY;
