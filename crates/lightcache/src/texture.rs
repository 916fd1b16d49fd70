//! Thin wrappers over wgpu texture creation and full-surface transfers.
//!
//! Creation runs inside an out-of-memory error scope so allocation failures
//! surface as [`CacheError::Allocation`] instead of a device loss later.
//! Read-back copies through a mapped staging buffer and strips the row
//! padding wgpu requires, returning tightly packed texels.

use std::sync::mpsc;

use crate::CacheError;

const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Bytes per texel for the formats the cache uses.
pub fn bytes_per_pixel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => 4,
        wgpu::TextureFormat::Rgba16Float => 8,
        wgpu::TextureFormat::Rgba32Float => 16,
        other => unreachable!("unsupported cache format {other:?}"),
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn checked_create(
    device: &wgpu::Device,
    desc: &wgpu::TextureDescriptor<'_>,
) -> Result<wgpu::Texture, CacheError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let texture = device.create_texture(desc);
    if let Some(source) = pollster::block_on(device.pop_error_scope()) {
        let label = desc.label.unwrap_or("unnamed texture").to_string();
        tracing::error!(label = %label, error = %source, "GPU texture allocation failed");
        return Err(CacheError::Allocation { label, source });
    }
    Ok(texture)
}

/// Creates a 2D-array texture of `[width, height, layers]`.
pub fn create_texture_2d_array(
    device: &wgpu::Device,
    label: &'static str,
    size: [u32; 3],
    format: wgpu::TextureFormat,
    mip_level_count: u32,
    usage: wgpu::TextureUsages,
) -> Result<wgpu::Texture, CacheError> {
    checked_create(
        device,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: size[2],
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        },
    )
}

/// Creates a cubemap texture (six layers) of `resolution` texels per face.
pub fn create_texture_cube(
    device: &wgpu::Device,
    label: &'static str,
    resolution: u32,
    format: wgpu::TextureFormat,
    mip_level_count: u32,
    usage: wgpu::TextureUsages,
) -> Result<wgpu::Texture, CacheError> {
    checked_create(
        device,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        },
    )
}

/// Reads back mip 0 of every layer of a 2D-array texture, blocking until the
/// copy completes. The returned bytes are tightly packed, layer-major.
pub fn read_texture_2d_array(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>, CacheError> {
    let size = texture.size();
    let bpp = bytes_per_pixel(texture.format());
    let tight_bpr = size.width * bpp;
    let padded_bpr = align_to(tight_bpr, COPY_ALIGNMENT);
    let staging_size =
        u64::from(padded_bpr) * u64::from(size.height) * u64::from(size.depth_or_array_layers);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lightcache readback staging"),
        size: staging_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lightcache readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(size.height),
            },
        },
        size,
    );
    queue.submit(Some(encoder.finish()));

    let (sender, receiver) = mpsc::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| CacheError::Readback(format!("device poll failed: {err}")))?;
    receiver
        .recv()
        .map_err(|_| CacheError::Readback("map callback dropped".into()))?
        .map_err(|err| CacheError::Readback(format!("buffer map failed: {err}")))?;

    let mapped = staging.slice(..).get_mapped_range();
    let mut tight =
        Vec::with_capacity((tight_bpr * size.height * size.depth_or_array_layers) as usize);
    for row in 0..(size.height * size.depth_or_array_layers) {
        let offset = (row * padded_bpr) as usize;
        tight.extend_from_slice(&mapped[offset..offset + tight_bpr as usize]);
    }
    drop(mapped);
    staging.unmap();

    Ok(tight)
}

/// Uploads tightly packed, layer-major texels into mip 0 of every layer of a
/// 2D-array texture.
pub fn write_texture_2d_array(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8]) {
    let size = texture.size();
    let bpp = bytes_per_pixel(texture.format());
    debug_assert_eq!(
        data.len() as u64,
        u64::from(size.width) * u64::from(size.height) * u64::from(size.depth_or_array_layers)
            * u64::from(bpp)
    );
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bpp),
            rows_per_image: Some(size.height),
        },
        size,
    );
}
