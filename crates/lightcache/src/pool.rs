//! Sizing and slot arithmetic for the shared irradiance atlas.
//!
//! Every diffuse sample occupies a 4x2 texel block (HL2 basis, rounded to
//! powers of two) on layer 0 plus one `vis x vis` visibility block on one of
//! the remaining layers. The pool is sized so both packings hold the total
//! sample count of the current probe set.

/// Texel footprint of one irradiance sample.
pub const IRRADIANCE_SAMPLE_SIZE_X: u32 = 4;
pub const IRRADIANCE_SAMPLE_SIZE_Y: u32 = 2;

/// GL 3.3 core guarantees 256 array layers; plenty already.
pub const IRRADIANCE_MAX_POOL_LAYER: u32 = 256;
pub const IRRADIANCE_MAX_POOL_SIZE: u32 = 1024;

/// Upper bound on the number of irradiance samples a cache can hold.
pub const fn max_irradiance_samples() -> u32 {
    (IRRADIANCE_MAX_POOL_SIZE / IRRADIANCE_SAMPLE_SIZE_X)
        * (IRRADIANCE_MAX_POOL_SIZE / IRRADIANCE_SAMPLE_SIZE_Y)
}

/// Computes the `[width, height, layers]` of the irradiance pool for a probe
/// set totalling `total_samples`, with `visibility_size` texels per side of
/// each visibility block.
///
/// One layer stores the packed irradiance; the remaining layers store the
/// visibility blocks. `visibility_size` must be a power of two between 4 and
/// [`IRRADIANCE_MAX_POOL_SIZE`]; anything else panics instead of producing a
/// degenerate pool. The result is monotonically non-decreasing
/// in `total_samples` and never exceeds the pool bounds as long as
/// `total_samples <= max_irradiance_samples()`.
pub fn irradiance_pool_size(visibility_size: u32, total_samples: u32) -> [u32; 3] {
    assert!(
        visibility_size.is_power_of_two()
            && (IRRADIANCE_SAMPLE_SIZE_X..=IRRADIANCE_MAX_POOL_SIZE).contains(&visibility_size),
        "visibility size must be a power of two between {IRRADIANCE_SAMPLE_SIZE_X} and \
         {IRRADIANCE_MAX_POOL_SIZE}, got {visibility_size}"
    );

    // How many irradiance samples fit in the area of one visibility block.
    let irr_per_vis = (visibility_size / IRRADIANCE_SAMPLE_SIZE_X)
        * (visibility_size / IRRADIANCE_SAMPLE_SIZE_Y);

    // The irradiance itself takes one layer, hence the +1.
    let layer_count = (irr_per_vis + 1).min(IRRADIANCE_MAX_POOL_LAYER);

    let total_samples = total_samples.max(1);
    let block_count = total_samples.div_ceil(layer_count - 1);
    let blocks_per_row = IRRADIANCE_MAX_POOL_SIZE / visibility_size;

    let width = visibility_size * block_count.clamp(1, blocks_per_row);
    let height = visibility_size * block_count.div_ceil(blocks_per_row).clamp(1, blocks_per_row);

    [width, height, layer_count]
}

/// Atlas coordinates assigned to one linear sample index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSlot {
    /// Texel origin of the 4x2 irradiance block on layer 0.
    pub irradiance: [u32; 2],
    /// Texel origin and layer of the `vis x vis` visibility block.
    pub visibility: [u32; 3],
}

/// Maps a linear sample index into its atlas slot.
///
/// `pool` must come from [`irradiance_pool_size`] with the same
/// `visibility_size`; indices at or past the pool capacity panic in debug
/// builds and wrap in release, so callers are expected to stay within the
/// gathered sample total.
pub fn sample_slot(pool: [u32; 3], visibility_size: u32, sample: u32) -> SampleSlot {
    let [width, height, layers] = pool;

    let irr_per_row = width / IRRADIANCE_SAMPLE_SIZE_X;
    let irradiance = [
        (sample % irr_per_row) * IRRADIANCE_SAMPLE_SIZE_X,
        (sample / irr_per_row) * IRRADIANCE_SAMPLE_SIZE_Y,
    ];
    debug_assert!(irradiance[1] + IRRADIANCE_SAMPLE_SIZE_Y <= height);

    let blocks_per_row = width / visibility_size;
    let blocks_per_layer = blocks_per_row * (height / visibility_size);
    let layer = 1 + sample / blocks_per_layer;
    let block = sample % blocks_per_layer;
    debug_assert!(layer < layers);
    let visibility = [
        (block % blocks_per_row) * visibility_size,
        (block / blocks_per_row) * visibility_size,
        layer,
    ];

    SampleSlot {
        irradiance,
        visibility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_is_monotonic_in_total_samples() {
        for vis in [4u32, 8, 16, 32, 64] {
            let mut previous = 0u64;
            for total in [1u32, 2, 7, 64, 65, 1000, 4096, 65536] {
                let [w, h, l] = irradiance_pool_size(vis, total);
                let area = u64::from(w) * u64::from(h) * u64::from(l);
                assert!(
                    area >= previous,
                    "pool shrank for vis={vis} total={total}: {area} < {previous}"
                );
                previous = area;
            }
        }
    }

    #[test]
    fn pool_never_exceeds_bounds_at_max_samples() {
        for vis in [4u32, 8, 16, 32, 64] {
            let [w, h, l] = irradiance_pool_size(vis, max_irradiance_samples());
            assert!(w <= IRRADIANCE_MAX_POOL_SIZE);
            assert!(h <= IRRADIANCE_MAX_POOL_SIZE);
            assert!(l <= IRRADIANCE_MAX_POOL_LAYER);
        }
    }

    #[test]
    fn pool_capacity_holds_every_sample() {
        for vis in [4u32, 8, 16] {
            for total in [1u32, 9, 65, 513, 10000] {
                let pool = irradiance_pool_size(vis, total);
                let [w, h, l] = pool;
                let irr_capacity =
                    (w / IRRADIANCE_SAMPLE_SIZE_X) * (h / IRRADIANCE_SAMPLE_SIZE_Y);
                let vis_capacity = (w / vis) * (h / vis) * (l - 1);
                assert!(irr_capacity >= total, "irradiance layer too small");
                assert!(vis_capacity >= total, "visibility layers too small");
            }
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn undersized_visibility_blocks_are_rejected_up_front() {
        // Below the 4x2 sample footprint there would be zero visibility
        // layers; the precondition must fire before any layer arithmetic.
        irradiance_pool_size(2, 10);
    }

    #[test]
    fn slots_stay_in_bounds_and_do_not_collide() {
        let vis = 8u32;
        let total = 513u32;
        let pool = irradiance_pool_size(vis, total);
        let mut irr_seen = std::collections::HashSet::new();
        let mut vis_seen = std::collections::HashSet::new();
        for sample in 0..total {
            let slot = sample_slot(pool, vis, sample);
            assert!(slot.irradiance[0] + IRRADIANCE_SAMPLE_SIZE_X <= pool[0]);
            assert!(slot.irradiance[1] + IRRADIANCE_SAMPLE_SIZE_Y <= pool[1]);
            assert!(slot.visibility[0] + vis <= pool[0]);
            assert!(slot.visibility[1] + vis <= pool[1]);
            assert!(slot.visibility[2] >= 1 && slot.visibility[2] < pool[2]);
            assert!(irr_seen.insert(slot.irradiance), "irradiance slot reused");
            assert!(vis_seen.insert(slot.visibility), "visibility slot reused");
        }
    }
}
