use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use baker::{
    BakeEvent, BakeOutcome, BakeParams, BakeSignals, ExclusiveContext, FlatEnvironmentRenderer,
    LightBake, SceneGraph,
};
use lightcache::{read_texture_2d_array, CacheSlot, LightCache};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::scene_file::FileScene;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let scene = FileScene::load(&cli.scene)?;
    let world = scene.world();
    let params = BakeParams {
        frame: cli.frame,
        bounce_count: cli.bounces.max(1),
        cube_resolution: cli.cube_resolution,
        visibility_size: cli.visibility_size,
    };

    let (device, queue) = request_device()?;
    let slot = Arc::new(CacheSlot::new());
    let renderer = FlatEnvironmentRenderer::new(device.clone(), queue.clone(), world);

    let mut job = LightBake::new(
        Box::new(scene),
        Box::new(renderer),
        Arc::new(ExclusiveContext),
        slot.clone(),
        device.clone(),
        queue.clone(),
        params,
    )
    .context("allocating bake job")?;
    let counts = job.counts();
    tracing::info!(
        grids = counts.grid_count,
        cubes = counts.cube_count,
        samples = counts.total_irradiance_samples,
        bounces = params.bounce_count,
        "scene gathered"
    );

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    // The worker owns the signals; the event channel closes when it is done,
    // which ends the progress loop below.
    let signals = BakeSignals::new().with_events(events_tx);
    let worker = thread::Builder::new()
        .name("probebake-worker".into())
        .spawn(move || job.run(&signals))
        .context("spawning bake worker")?;

    let mut last_percent = 0u64;
    for BakeEvent::Sample { done, total } in events_rx {
        if total == 0 {
            continue;
        }
        let percent = done * 100 / total;
        if percent / 10 > last_percent / 10 || done == total {
            tracing::info!(done, total, percent, "baking");
            last_percent = percent;
        }
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow!("bake worker panicked"))?
        .context("bake failed")?;
    match outcome {
        BakeOutcome::Completed => tracing::info!("bake complete"),
        BakeOutcome::Cancelled => tracing::warn!("bake cancelled"),
    }

    if let Some(path) = &cli.export_irradiance {
        let cache = slot
            .snapshot()
            .ok_or_else(|| anyhow!("no cache was produced"))?;
        export_irradiance(&device, &queue, &cache, path)?;
        tracing::info!(path = %path.display(), "irradiance atlas exported");
    }
    Ok(())
}

/// Writes layer 0 of the irradiance atlas (the packed sample blocks) as an
/// RGBA PNG.
fn export_irradiance(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    cache: &LightCache,
    path: &Path,
) -> Result<()> {
    let [width, height, _] = cache.shape().irradiance_size;
    let data = read_texture_2d_array(device, queue, cache.irradiance_texture())
        .context("reading irradiance atlas")?;
    let layer = data[..(width * height * 4) as usize].to_vec();
    let image = image::RgbaImage::from_raw(width, height, layer)
        .ok_or_else(|| anyhow!("atlas dimensions do not match read-back size"))?;
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn request_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("no compatible GPU adapter found")?;
    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "acquired adapter");
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("probebake device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to acquire GPU device")?;
    Ok((device, queue))
}
