//! The cache object itself: two texture atlases plus per-probe metadata.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

use crate::flags::{AtomicCacheFlags, CacheFlags};
use crate::texture::create_texture_2d_array;
use crate::CacheError;

/// HL2 irradiance encoding fits in four unsigned normalised channels.
pub const IRRADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Filtered reflections are stored octahedrally remapped per layer.
pub const REFLECTION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Mip levels of the reflection atlas; each level holds one roughness step.
pub fn reflection_mip_count(cube_resolution: u32) -> u32 {
    cube_resolution.max(1).ilog2().min(4) + 1
}

/// Texture-array dimensions implied by one probe set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheShape {
    /// Grid probes including the implicit world grid at slot 0.
    pub grid_count: u32,
    /// Cube probes including the implicit world reflection at layer 0.
    pub cube_count: u32,
    /// Edge length of one reflection atlas layer.
    pub cube_resolution: u32,
    /// Irradiance pool `[width, height, layers]`.
    pub irradiance_size: [u32; 3],
    /// Side length of one visibility block inside the pool.
    pub visibility_size: u32,
}

/// Per-grid-probe metadata mirrored into shader storage by the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridRecord {
    pub resolution: UVec3,
    /// World-space centre of cell (0, 0, 0).
    pub corner: Vec3,
    /// World-space step between neighbouring cells, per axis.
    pub increment: [Vec3; 3],
    /// First linear index of this grid inside the shared sample space.
    pub offset: u32,
    pub visibility_range: f32,
    pub visibility_blur: f32,
    pub intensity: f32,
    /// Cubemap LOD bias of the coarsest refinement level already baked.
    /// Mutated per sample while the viewport reads, hence the lock around
    /// the record array.
    pub level_bias: f32,
}

impl GridRecord {
    pub fn sample_count(&self) -> u32 {
        self.resolution.x * self.resolution.y * self.resolution.z
    }

    /// World position of one cell of the sample lattice.
    pub fn cell_position(&self, cell: UVec3) -> Vec3 {
        self.corner
            + self.increment[0] * cell.x as f32
            + self.increment[1] * cell.y as f32
            + self.increment[2] * cell.z as f32
    }
}

/// Per-cube-probe metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CubeRecord {
    pub position: Vec3,
    pub clip_near: f32,
    pub clip_far: f32,
    pub intensity: f32,
}

/// std430 layout of [`GridRecord`] for storage-buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridRecordRaw {
    pub corner: [f32; 3],
    pub offset: u32,
    pub increment_x: [f32; 3],
    pub visibility_range: f32,
    pub increment_y: [f32; 3],
    pub visibility_blur: f32,
    pub increment_z: [f32; 3],
    pub intensity: f32,
    pub resolution: [u32; 3],
    pub level_bias: f32,
}

impl From<GridRecord> for GridRecordRaw {
    fn from(record: GridRecord) -> Self {
        Self {
            corner: record.corner.to_array(),
            offset: record.offset,
            increment_x: record.increment[0].to_array(),
            visibility_range: record.visibility_range,
            increment_y: record.increment[1].to_array(),
            visibility_blur: record.visibility_blur,
            increment_z: record.increment[2].to_array(),
            intensity: record.intensity,
            resolution: record.resolution.to_array(),
            level_bias: record.level_bias,
        }
    }
}

/// std430 layout of [`CubeRecord`] for storage-buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CubeRecordRaw {
    pub position: [f32; 3],
    pub clip_near: f32,
    pub clip_far: f32,
    pub intensity: f32,
    pub _pad: [f32; 2],
}

impl From<CubeRecord> for CubeRecordRaw {
    fn from(record: CubeRecord) -> Self {
        Self {
            position: record.position.to_array(),
            clip_near: record.clip_near,
            clip_far: record.clip_far,
            intensity: record.intensity,
            _pad: [0.0; 2],
        }
    }
}

/// Reference-counted light cache; clone the surrounding `Arc` to share it
/// between the original and the evaluated scene. GPU resources are freed
/// when the last reference drops.
pub struct LightCache {
    shape: CacheShape,
    flags: AtomicCacheFlags,
    grid_tx: wgpu::Texture,
    cube_tx: wgpu::Texture,
    grid_data: RwLock<Vec<GridRecord>>,
    cube_data: RwLock<Vec<CubeRecord>>,
}

impl LightCache {
    /// Allocates a cache for `shape`, with zeroed metadata arrays and every
    /// `NEEDS_*` flag raised. Must run under an acquired execution context.
    pub fn create(device: &wgpu::Device, shape: CacheShape) -> Result<Self, CacheError> {
        let grid_tx = create_texture_2d_array(
            device,
            "lightcache irradiance atlas",
            shape.irradiance_size,
            IRRADIANCE_FORMAT,
            1,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        )?;
        let cube_tx = create_texture_2d_array(
            device,
            "lightcache reflection atlas",
            [shape.cube_resolution, shape.cube_resolution, shape.cube_count],
            REFLECTION_FORMAT,
            reflection_mip_count(shape.cube_resolution),
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST,
        )?;

        tracing::debug!(
            grids = shape.grid_count,
            cubes = shape.cube_count,
            pool = ?shape.irradiance_size,
            cube_resolution = shape.cube_resolution,
            "created light cache"
        );

        Ok(Self {
            shape,
            flags: AtomicCacheFlags::new(CacheFlags::needs_all()),
            grid_tx,
            cube_tx,
            grid_data: RwLock::new(vec![GridRecord::default(); shape.grid_count as usize]),
            cube_data: RwLock::new(vec![CubeRecord::default(); shape.cube_count as usize]),
        })
    }

    /// True iff the existing atlases exactly match the requested shape. Any
    /// single mismatched dimension forces a rebuild.
    pub fn validate(
        &self,
        cube_count: u32,
        cube_resolution: u32,
        irradiance_size: [u32; 3],
    ) -> bool {
        self.shape.cube_count == cube_count
            && self.shape.cube_resolution == cube_resolution
            && self.shape.irradiance_size == irradiance_size
    }

    pub fn shape(&self) -> CacheShape {
        self.shape
    }

    pub fn flags(&self) -> &AtomicCacheFlags {
        &self.flags
    }

    pub fn irradiance_texture(&self) -> &wgpu::Texture {
        &self.grid_tx
    }

    pub fn reflection_texture(&self) -> &wgpu::Texture {
        &self.cube_tx
    }

    pub fn grid_records(&self) -> RwLockReadGuard<'_, Vec<GridRecord>> {
        self.grid_data.read().unwrap_or_else(|err| err.into_inner())
    }

    pub fn cube_records(&self) -> RwLockReadGuard<'_, Vec<CubeRecord>> {
        self.cube_data.read().unwrap_or_else(|err| err.into_inner())
    }

    /// Snapshot of the grid metadata in storage-buffer layout; the viewport
    /// uploads this with `queue.write_buffer` each time the update flag flips.
    pub fn grid_records_raw(&self) -> Vec<GridRecordRaw> {
        self.grid_records().iter().copied().map(Into::into).collect()
    }

    pub fn cube_records_raw(&self) -> Vec<CubeRecordRaw> {
        self.cube_records().iter().copied().map(Into::into).collect()
    }

    /// Replaces the grid metadata; written by the gather pass only.
    pub fn set_grid_records(&self, records: Vec<GridRecord>) {
        debug_assert_eq!(records.len(), self.shape.grid_count as usize);
        *self.grid_data.write().unwrap_or_else(|err| err.into_inner()) = records;
    }

    pub fn set_cube_records(&self, records: Vec<CubeRecord>) {
        debug_assert_eq!(records.len(), self.shape.cube_count as usize);
        *self.cube_data.write().unwrap_or_else(|err| err.into_inner()) = records;
    }

    /// Lowers one grid's LOD bias as its refinement proceeds.
    pub fn set_grid_level_bias(&self, grid: usize, level_bias: f32) {
        let mut records = self.grid_data.write().unwrap_or_else(|err| err.into_inner());
        if let Some(record) = records.get_mut(grid) {
            record.level_bias = level_bias;
        }
    }
}

impl std::fmt::Debug for LightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightCache")
            .field("shape", &self.shape)
            .field("flags", &self.flags.load())
            .finish_non_exhaustive()
    }
}

/// The scene's live cache reference.
///
/// Readers take cheap snapshots; the baker installs a rebuilt cache with a
/// single pointer swap so a viewport never observes a half-valid shape.
#[derive(Debug, Default)]
pub struct CacheSlot {
    current: Mutex<Option<Arc<LightCache>>>,
}

impl CacheSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones the current cache reference, if any.
    pub fn snapshot(&self) -> Option<Arc<LightCache>> {
        self.current
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Atomically replaces the live cache.
    pub fn install(&self, cache: Arc<LightCache>) {
        *self.current.lock().unwrap_or_else(|err| err.into_inner()) = Some(cache);
    }

    /// Drops the slot's reference; the cache dies with its last holder.
    pub fn clear(&self) {
        self.current
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take();
    }

    /// Returns the current cache when it matches `shape`, otherwise creates
    /// a fresh one, installs it, and returns that. Shape mismatch is
    /// recovered here, never reported upward.
    pub fn validate_or_create(
        &self,
        device: &wgpu::Device,
        shape: CacheShape,
    ) -> Result<Arc<LightCache>, CacheError> {
        if let Some(cache) = self.snapshot() {
            if cache.validate(shape.cube_count, shape.cube_resolution, shape.irradiance_size) {
                return Ok(cache);
            }
            tracing::info!(
                old = ?cache.shape(),
                new = ?shape,
                "light cache shape mismatch; rebuilding"
            );
        }
        let cache = Arc::new(LightCache::create(device, shape)?);
        self.install(cache.clone());
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_records_match_std430_strides() {
        assert_eq!(std::mem::size_of::<GridRecordRaw>(), 80);
        assert_eq!(std::mem::size_of::<CubeRecordRaw>(), 32);
    }

    #[test]
    fn raw_conversion_preserves_fields() {
        let record = GridRecord {
            resolution: UVec3::new(4, 2, 4),
            corner: Vec3::new(-1.0, 0.5, -1.0),
            increment: [Vec3::X, Vec3::Y, Vec3::Z],
            offset: 9,
            visibility_range: 1.5,
            visibility_blur: 0.25,
            intensity: 2.0,
            level_bias: 4.0,
        };
        let raw = GridRecordRaw::from(record);
        assert_eq!(raw.corner, [-1.0, 0.5, -1.0]);
        assert_eq!(raw.offset, 9);
        assert_eq!(raw.increment_y, [0.0, 1.0, 0.0]);
        assert_eq!(raw.resolution, [4, 2, 4]);
        assert_eq!(raw.level_bias, 4.0);
    }

    #[test]
    fn mip_count_caps_at_five_levels() {
        assert_eq!(reflection_mip_count(1), 1);
        assert_eq!(reflection_mip_count(8), 4);
        assert_eq!(reflection_mip_count(128), 5);
        assert_eq!(reflection_mip_count(512), 5);
    }
}
