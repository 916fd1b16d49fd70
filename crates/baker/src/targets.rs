//! Job-owned GPU targets: the cube render target every sample renders into
//! and the previous-bounce snapshot of the irradiance atlas.

use lightcache::{
    create_texture_2d_array, create_texture_cube, read_texture_2d_array, write_texture_2d_array,
    CacheError, LightCache, IRRADIANCE_FORMAT,
};

/// Colour format of the temporary capture target; HDR until filtering
/// compresses it into the cache formats.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const CAPTURE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Cube capture target with one colour/depth attachment pair per face.
///
/// Owned by the job and dropped with it, success or failure; one target is
/// reused for every sample of the bake.
pub struct CubeRenderTarget {
    resolution: u32,
    color: wgpu::Texture,
    depth: wgpu::Texture,
    color_faces: [wgpu::TextureView; 6],
    depth_faces: [wgpu::TextureView; 6],
    cube_view: wgpu::TextureView,
}

impl CubeRenderTarget {
    pub fn new(device: &wgpu::Device, resolution: u32) -> Result<Self, CacheError> {
        let mip_level_count = resolution.max(1).ilog2() + 1;
        let color = create_texture_cube(
            device,
            "bake capture color",
            resolution,
            CAPTURE_FORMAT,
            mip_level_count,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )?;
        let depth = create_texture_cube(
            device,
            "bake capture depth",
            resolution,
            CAPTURE_DEPTH_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )?;

        let face_view = |texture: &wgpu::Texture, face: u32| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("bake capture face"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: face,
                array_layer_count: Some(1),
                base_mip_level: 0,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };
        let color_faces = std::array::from_fn(|face| face_view(&color, face as u32));
        let depth_faces = std::array::from_fn(|face| face_view(&depth, face as u32));
        let cube_view = color.create_view(&wgpu::TextureViewDescriptor {
            label: Some("bake capture cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Ok(Self {
            resolution,
            color,
            depth,
            color_faces,
            depth_faces,
            cube_view,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn depth_texture(&self) -> &wgpu::Texture {
        &self.depth
    }

    /// Per-face render attachment views, mip 0.
    pub fn color_face(&self, face: usize) -> &wgpu::TextureView {
        &self.color_faces[face]
    }

    pub fn depth_face(&self, face: usize) -> &wgpu::TextureView {
        &self.depth_faces[face]
    }

    /// Cube-sampled view over all six faces, for the filter passes.
    pub fn cube_view(&self) -> &wgpu::TextureView {
        &self.cube_view
    }
}

/// Snapshot of the irradiance atlas taken at each bounce transition.
///
/// Bounce N+1 reads this copy instead of the live atlas, so a bounce always
/// sees a stable, fully written bounce-N result. The copy goes through a
/// read-back and re-upload on purpose: the blocking map is the explicit
/// synchronization point between bounces.
pub struct PreviousBounce {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl PreviousBounce {
    pub fn new(device: &wgpu::Device, irradiance_size: [u32; 3]) -> Result<Self, CacheError> {
        let texture = create_texture_2d_array(
            device,
            "bake previous bounce",
            irradiance_size,
            IRRADIANCE_FORMAT,
            1,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("bake previous bounce"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        Ok(Self { texture, view })
    }

    /// Copies the cache's current irradiance atlas into the snapshot,
    /// blocking until the data is on the CPU and re-uploaded.
    pub fn capture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cache: &LightCache,
    ) -> Result<(), CacheError> {
        let data = read_texture_2d_array(device, queue, cache.irradiance_texture())?;
        write_texture_2d_array(queue, &self.texture, &data);
        tracing::trace!(bytes = data.len(), "captured previous-bounce snapshot");
        Ok(())
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
