//! Reference renderer for headless bakes and tests.
//!
//! Treats the scene as empty under a constant-colour world environment. For
//! that input the analytic results of the convolution passes are known (the
//! environment colour itself, full visibility), so the filters reduce to
//! block uploads into the atlas slots. This makes a full pipeline run cheap
//! and lets tests assert exact texel values.

use anyhow::Result;
use lightcache::{
    bytes_per_pixel, LightCache, SampleSlot, IRRADIANCE_FORMAT, IRRADIANCE_SAMPLE_SIZE_X,
    IRRADIANCE_SAMPLE_SIZE_Y,
};

use crate::render::{ProbeRenderer, ProbeView};
use crate::scene::WorldEnvironment;
use crate::targets::{CubeRenderTarget, PreviousBounce};

pub struct FlatEnvironmentRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    world: WorldEnvironment,
    indirect_specular: bool,
}

impl FlatEnvironmentRenderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, world: WorldEnvironment) -> Self {
        Self {
            device,
            queue,
            world,
            indirect_specular: true,
        }
    }

    /// The texel every irradiance and reflection slot converges to for a
    /// constant environment, after intensity scaling and 8-bit encoding.
    pub fn expected_texel(world: &WorldEnvironment, intensity: f32) -> [u8; 4] {
        let scale = world.intensity * intensity;
        let encode = |channel: f32| ((channel * scale).clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            encode(world.color.x),
            encode(world.color.y),
            encode(world.color.z),
            255,
        ]
    }

    fn clear_faces(&self, target: &CubeRenderTarget) {
        let color = wgpu::Color {
            r: f64::from(self.world.color.x) * f64::from(self.world.intensity),
            g: f64::from(self.world.color.y) * f64::from(self.world.intensity),
            b: f64::from(self.world.color.z) * f64::from(self.world.intensity),
            a: 1.0,
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("flat env capture"),
            });
        for face in 0..6 {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("flat env face"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_face(face),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth_face(face),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Fills a texel block of `texture` at `origin`/`mip` with one value.
    fn write_block(
        &self,
        texture: &wgpu::Texture,
        origin: wgpu::Origin3d,
        mip_level: u32,
        width: u32,
        height: u32,
        texel: [u8; 4],
    ) {
        debug_assert_eq!(bytes_per_pixel(texture.format()), 4);
        let data: Vec<u8> = texel
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level,
                origin,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl ProbeRenderer for FlatEnvironmentRenderer {
    fn set_indirect_specular(&mut self, enabled: bool) {
        self.indirect_specular = enabled;
    }

    fn render_world(&mut self, target: &CubeRenderTarget) -> Result<()> {
        self.clear_faces(target);
        Ok(())
    }

    fn render_probe(
        &mut self,
        _view: ProbeView,
        _previous_bounce: &PreviousBounce,
        _bounce: u32,
        target: &CubeRenderTarget,
    ) -> Result<()> {
        // An empty scene shows the environment from everywhere.
        self.clear_faces(target);
        Ok(())
    }

    fn filter_glossy(
        &mut self,
        _target: &CubeRenderTarget,
        cache: &LightCache,
        layer: u32,
        intensity: f32,
    ) -> Result<()> {
        let texel = Self::expected_texel(&self.world, intensity);
        let texture = cache.reflection_texture();
        let resolution = cache.shape().cube_resolution;
        for mip in 0..texture.mip_level_count() {
            let edge = (resolution >> mip).max(1);
            self.write_block(
                texture,
                wgpu::Origin3d { x: 0, y: 0, z: layer },
                mip,
                edge,
                edge,
                texel,
            );
        }
        Ok(())
    }

    fn filter_diffuse(
        &mut self,
        _target: &CubeRenderTarget,
        cache: &LightCache,
        slot: SampleSlot,
        intensity: f32,
    ) -> Result<()> {
        debug_assert_eq!(cache.irradiance_texture().format(), IRRADIANCE_FORMAT);
        let texel = Self::expected_texel(&self.world, intensity);
        self.write_block(
            cache.irradiance_texture(),
            wgpu::Origin3d {
                x: slot.irradiance[0],
                y: slot.irradiance[1],
                z: 0,
            },
            0,
            IRRADIANCE_SAMPLE_SIZE_X,
            IRRADIANCE_SAMPLE_SIZE_Y,
            texel,
        );
        Ok(())
    }

    fn filter_visibility(
        &mut self,
        _target: &CubeRenderTarget,
        cache: &LightCache,
        slot: SampleSlot,
        _range: f32,
        _blur: f32,
    ) -> Result<()> {
        // Nothing occludes an empty scene; store maximum visibility.
        let visibility_size = cache.shape().visibility_size;
        self.write_block(
            cache.irradiance_texture(),
            wgpu::Origin3d {
                x: slot.visibility[0],
                y: slot.visibility[1],
                z: slot.visibility[2],
            },
            0,
            visibility_size,
            visibility_size,
            [255; 4],
        );
        Ok(())
    }
}
