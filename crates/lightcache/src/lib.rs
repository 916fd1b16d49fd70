//! Persistent light-probe cache shared between a baking job and an
//! interactive viewport.
//!
//! The cache owns two GPU texture atlases (diffuse irradiance samples and
//! filtered reflection cubemaps) plus flat per-probe metadata arrays. It is
//! handed around as `Arc<LightCache>`: during a bake the original scene and
//! its evaluated copy both hold a reference so the viewport sees progress
//! live. Readiness is communicated through an atomic flag word per cache;
//! channel data is fully written before its ready flag flips.
//!
//! Layout of the irradiance atlas (`W x H x L`, sized by
//! [`irradiance_pool_size`]):
//! - layer 0 packs every irradiance sample as a 4x2 texel block;
//! - layers `1..L` pack one `vis x vis` visibility block per sample.

mod cell;
mod flags;
mod pool;
mod store;
mod texture;

pub use cell::{CellOrder, CellSample};
pub use flags::{AtomicCacheFlags, CacheFlags};
pub use pool::{
    irradiance_pool_size, max_irradiance_samples, sample_slot, SampleSlot,
    IRRADIANCE_MAX_POOL_LAYER, IRRADIANCE_MAX_POOL_SIZE, IRRADIANCE_SAMPLE_SIZE_X,
    IRRADIANCE_SAMPLE_SIZE_Y,
};
pub use store::{
    reflection_mip_count, CacheShape, CacheSlot, CubeRecord, CubeRecordRaw, GridRecord,
    GridRecordRaw, LightCache, IRRADIANCE_FORMAT, REFLECTION_FORMAT,
};
pub use texture::{
    bytes_per_pixel, create_texture_2d_array, create_texture_cube, read_texture_2d_array,
    write_texture_2d_array,
};

/// Errors surfaced by cache resource management.
///
/// Allocation failures are fatal to the job that triggered them; a shape
/// mismatch is recovered locally by discarding and recreating the cache and
/// therefore has no variant here.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("GPU allocation failed for '{label}': {source}")]
    Allocation {
        label: String,
        #[source]
        source: wgpu::Error,
    },
    #[error("texture read-back failed: {0}")]
    Readback(String),
}
