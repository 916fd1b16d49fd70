use std::sync::atomic::{AtomicU32, Ordering};

bitflags::bitflags! {
    /// Status word carried by every [`LightCache`](crate::LightCache).
    ///
    /// The `NEEDS_*` flags request work from the baker; the `*_READY` flags
    /// tell viewport readers which channels hold complete data. `BAKED` is
    /// only set once a full bake ran to completion, so a cancelled bake is
    /// distinguishable from a finished one while remaining usable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u32 {
        const NEEDS_WORLD_UPDATE = 1 << 0;
        const NEEDS_CUBE_UPDATE  = 1 << 1;
        const NEEDS_GRID_UPDATE  = 1 << 2;
        const BAKING             = 1 << 3;
        const CUBE_READY         = 1 << 4;
        const GRID_READY         = 1 << 5;
        const BAKED              = 1 << 6;
    }
}

impl CacheFlags {
    /// Initial state of a freshly created cache: everything needs baking.
    pub fn needs_all() -> Self {
        Self::NEEDS_WORLD_UPDATE | Self::NEEDS_CUBE_UPDATE | Self::NEEDS_GRID_UPDATE
    }
}

/// Lock-free flag word shared between the bake worker and viewport readers.
///
/// Stores use `Release` ordering and loads `Acquire`, so a reader that
/// observes a ready flag also observes every texture write committed before
/// the flip.
#[derive(Debug)]
pub struct AtomicCacheFlags(AtomicU32);

impl AtomicCacheFlags {
    pub fn new(flags: CacheFlags) -> Self {
        Self(AtomicU32::new(flags.bits()))
    }

    pub fn load(&self) -> CacheFlags {
        CacheFlags::from_bits_truncate(self.0.load(Ordering::Acquire))
    }

    pub fn contains(&self, flags: CacheFlags) -> bool {
        self.load().contains(flags)
    }

    pub fn insert(&self, flags: CacheFlags) {
        self.0.fetch_or(flags.bits(), Ordering::Release);
    }

    pub fn remove(&self, flags: CacheFlags) {
        self.0.fetch_and(!flags.bits(), Ordering::Release);
    }
}

impl Default for AtomicCacheFlags {
    fn default() -> Self {
        Self::new(CacheFlags::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_requests_every_channel() {
        let flags = AtomicCacheFlags::new(CacheFlags::needs_all());
        assert!(flags.contains(CacheFlags::NEEDS_WORLD_UPDATE));
        assert!(flags.contains(CacheFlags::NEEDS_CUBE_UPDATE));
        assert!(flags.contains(CacheFlags::NEEDS_GRID_UPDATE));
        assert!(!flags.contains(CacheFlags::BAKED));
    }

    #[test]
    fn insert_and_remove_are_independent_per_bit() {
        let flags = AtomicCacheFlags::default();
        flags.insert(CacheFlags::BAKING | CacheFlags::CUBE_READY);
        flags.remove(CacheFlags::BAKING);
        assert_eq!(flags.load(), CacheFlags::CUBE_READY);
    }
}
